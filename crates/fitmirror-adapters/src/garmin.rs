//! Garmin Connect payloads and the HTTP feed that serves them.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use fitmirror_core::{DailySleep, DailySteps, Measurements, PersonalRecord, SourceRecord};
use fitmirror_storage::{PacingConfig, RequestPacer};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, Instrument};

use crate::{FeedError, SourceFeed};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivityType {
    pub type_key: Option<String>,
}

/// One entry of the activity search endpoint. Every field is optional; the
/// feed omits whatever the device did not record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    pub activity_id: Option<i64>,
    #[serde(rename = "startTimeGMT")]
    pub start_time_gmt: Option<String>,
    pub activity_type: Option<RawActivityType>,
    pub activity_name: Option<String>,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub calories: Option<f64>,
    pub average_speed: Option<f64>,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    pub aerobic_training_effect: Option<f64>,
    pub anaerobic_training_effect: Option<f64>,
    pub aerobic_training_effect_message: Option<String>,
    pub anaerobic_training_effect_message: Option<String>,
    pub training_effect_label: Option<String>,
    pub pr: Option<bool>,
    pub favorite: Option<bool>,
}

impl RawActivity {
    pub fn into_record(self) -> SourceRecord {
        SourceRecord {
            external_id: self.activity_id,
            start_time_gmt: self.start_time_gmt.unwrap_or_default(),
            type_key: self
                .activity_type
                .and_then(|t| t.type_key)
                .unwrap_or_default(),
            label: self.activity_name.unwrap_or_default(),
            metrics: Measurements {
                distance: self.distance,
                duration: self.duration,
                calories: self.calories,
                average_speed: self.average_speed,
                avg_power: self.avg_power,
                max_power: self.max_power,
                aerobic_effect: self.aerobic_training_effect,
                anaerobic_effect: self.anaerobic_training_effect,
                aerobic_message: self.aerobic_training_effect_message,
                anaerobic_message: self.anaerobic_training_effect_message,
                training_effect_label: self.training_effect_label,
                personal_record: self.pr.unwrap_or(false),
                favorite: self.favorite.unwrap_or(false),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDailySummary {
    pub total_steps: Option<i64>,
    pub total_distance_meters: Option<f64>,
    pub daily_step_goal: Option<i64>,
}

impl RawDailySummary {
    pub fn into_steps(self, date: NaiveDate) -> DailySteps {
        DailySteps {
            date,
            total_steps: self.total_steps.unwrap_or(0),
            total_distance_meters: self.total_distance_meters.unwrap_or(0.0),
            daily_step_goal: self.daily_step_goal.unwrap_or(0),
        }
    }
}

/// Local sleep timestamps arrive either as epoch milliseconds of the local
/// wall clock or as ISO strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Millis(ms) => DateTime::from_timestamp_millis(*ms).map(|dt| dt.naive_utc()),
            Self::Text(raw) => {
                let trimmed = raw.trim().trim_end_matches('Z');
                ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSleepDto {
    pub deep_sleep_seconds: Option<f64>,
    pub light_sleep_seconds: Option<f64>,
    pub rem_sleep_seconds: Option<f64>,
    pub awake_sleep_seconds: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub sleep_start_timestamp_local: Option<RawTimestamp>,
    pub sleep_end_timestamp_local: Option<RawTimestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSleepData {
    #[serde(rename = "dailySleepDTO")]
    pub daily_sleep: Option<RawSleepDto>,
    pub resting_heart_rate: Option<f64>,
}

impl RawSleepData {
    /// `None` when the payload carries no sleep block at all.
    pub fn into_sleep(self, date: NaiveDate) -> Option<DailySleep> {
        let dto = self.daily_sleep?;
        Some(DailySleep {
            date,
            deep_seconds: dto.deep_sleep_seconds.unwrap_or(0.0),
            light_seconds: dto.light_sleep_seconds.unwrap_or(0.0),
            rem_seconds: dto.rem_sleep_seconds.unwrap_or(0.0),
            awake_seconds: dto.awake_sleep_seconds.unwrap_or(0.0),
            resting_heart_rate: dto.resting_heart_rate.or(self.resting_heart_rate),
            start_local: dto.sleep_start_timestamp_local.as_ref().and_then(RawTimestamp::to_naive),
            end_local: dto.sleep_end_timestamp_local.as_ref().and_then(RawTimestamp::to_naive),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPersonalRecord {
    pub type_id: i64,
    pub activity_type: Option<String>,
    pub value: Option<f64>,
    pub pr_start_time_gmt_formatted: Option<String>,
}

impl RawPersonalRecord {
    pub fn into_record(self) -> PersonalRecord {
        PersonalRecord {
            type_id: self.type_id,
            activity_type: self.activity_type,
            value: self.value.unwrap_or(0.0),
            start_time_formatted: self.pr_start_time_gmt_formatted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GarminFeedConfig {
    pub base_url: String,
    /// Pre-issued OAuth bearer token; this crate never logs in.
    pub access_token: String,
    pub display_name: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub pacing: Option<PacingConfig>,
}

impl GarminFeedConfig {
    pub fn new(access_token: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            base_url: "https://connectapi.garmin.com".to_string(),
            access_token: access_token.into(),
            display_name: display_name.into(),
            timeout: Duration::from_secs(20),
            user_agent: None,
            pacing: None,
        }
    }
}

#[derive(Debug)]
pub struct GarminHttpFeed {
    client: reqwest::Client,
    config: GarminFeedConfig,
    pacer: Option<RequestPacer>,
}

impl GarminHttpFeed {
    pub fn new(config: GarminFeedConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().gzip(true).timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            pacer: config.pacing.map(RequestPacer::new),
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// `Ok(None)` for 204/404 and `null` bodies, which Garmin uses for empty days.
    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<Option<T>, FeedError> {
        if let Some(pacer) = &self.pacer {
            pacer.acquire().await;
        }

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let text = resp.text().await?;
        if text.trim().is_empty() || text.trim() == "null" {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| FeedError::Decode(format!("{url}: {err}")))
    }
}

#[async_trait]
impl SourceFeed for GarminHttpFeed {
    fn feed_id(&self) -> &'static str {
        "garmin-connect"
    }

    async fn fetch_page(&self, offset: usize, page_size: usize) -> Result<Vec<SourceRecord>, FeedError> {
        let url = self.url(&format!(
            "activitylist-service/activities/search/activities?start={offset}&limit={page_size}"
        ));
        let raw: Option<Vec<RawActivity>> = self
            .get_json(url)
            .instrument(debug_span!("garmin_activities", offset, page_size))
            .await?;
        let records: Vec<SourceRecord> = raw
            .unwrap_or_default()
            .into_iter()
            .map(RawActivity::into_record)
            .collect();
        debug!(offset, fetched = records.len(), "activity page fetched");
        Ok(records)
    }

    async fn fetch_steps(&self, date: NaiveDate) -> Result<DailySteps, FeedError> {
        let url = self.url(&format!(
            "usersummary-service/usersummary/daily/{}?calendarDate={date}",
            self.config.display_name
        ));
        let raw: Option<RawDailySummary> = self
            .get_json(url)
            .instrument(debug_span!("garmin_steps", %date))
            .await?;
        raw.map(|summary| summary.into_steps(date))
            .ok_or(FeedError::NotFound(date))
    }

    async fn fetch_sleep(&self, date: NaiveDate) -> Result<DailySleep, FeedError> {
        let url = self.url(&format!(
            "wellness-service/wellness/dailySleepData/{}?date={date}&nonSleepBufferMinutes=60",
            self.config.display_name
        ));
        let raw: Option<RawSleepData> = self
            .get_json(url)
            .instrument(debug_span!("garmin_sleep", %date))
            .await?;
        raw.and_then(|data| data.into_sleep(date))
            .ok_or(FeedError::NotFound(date))
    }

    async fn fetch_personal_records(&self) -> Result<Vec<PersonalRecord>, FeedError> {
        let url = self.url(&format!(
            "personalrecord-service/personalrecord/prs/{}",
            self.config.display_name
        ));
        let raw: Option<Vec<RawPersonalRecord>> = self
            .get_json(url)
            .instrument(debug_span!("garmin_personal_records"))
            .await?;
        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .map(RawPersonalRecord::into_record)
            .collect())
    }
}
