//! Offline feed backed by a captured JSON payload.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use fitmirror_core::{DailySleep, DailySteps, PersonalRecord, SourceRecord};
use serde::{Deserialize, Serialize};

use crate::garmin::{RawActivity, RawDailySummary, RawPersonalRecord, RawSleepData};
use crate::{read_json_file, FeedError, SourceFeed};

/// The raw Garmin payloads of one capture. Activities are newest first, as the
/// search endpoint returns them; daily sections are keyed by calendar date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixturePayload {
    #[serde(default)]
    pub activities: Vec<RawActivity>,
    #[serde(default)]
    pub steps: BTreeMap<NaiveDate, RawDailySummary>,
    #[serde(default)]
    pub sleep: BTreeMap<NaiveDate, RawSleepData>,
    #[serde(default)]
    pub personal_records: Vec<RawPersonalRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureFeed {
    payload: FixturePayload,
}

impl FixtureFeed {
    pub fn new(payload: FixturePayload) -> Self {
        Self { payload }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(read_json_file(path)?))
    }

    pub fn payload(&self) -> &FixturePayload {
        &self.payload
    }
}

#[async_trait]
impl SourceFeed for FixtureFeed {
    fn feed_id(&self) -> &'static str {
        "fixture"
    }

    async fn fetch_page(&self, offset: usize, page_size: usize) -> Result<Vec<SourceRecord>, FeedError> {
        Ok(self
            .payload
            .activities
            .iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .map(RawActivity::into_record)
            .collect())
    }

    async fn fetch_steps(&self, date: NaiveDate) -> Result<DailySteps, FeedError> {
        self.payload
            .steps
            .get(&date)
            .cloned()
            .map(|raw| raw.into_steps(date))
            .ok_or(FeedError::NotFound(date))
    }

    async fn fetch_sleep(&self, date: NaiveDate) -> Result<DailySleep, FeedError> {
        self.payload
            .sleep
            .get(&date)
            .cloned()
            .and_then(|raw| raw.into_sleep(date))
            .ok_or(FeedError::NotFound(date))
    }

    async fn fetch_personal_records(&self) -> Result<Vec<PersonalRecord>, FeedError> {
        Ok(self
            .payload
            .personal_records
            .iter()
            .cloned()
            .map(RawPersonalRecord::into_record)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(id: i64) -> RawActivity {
        RawActivity {
            activity_id: Some(id),
            start_time_gmt: Some(format!("2026-01-{:02} 07:00:00", id)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn pages_slice_the_activity_list() {
        let feed = FixtureFeed::new(FixturePayload {
            activities: (1..=5).map(activity).collect(),
            ..Default::default()
        });

        let first = feed.fetch_page(0, 2).await.unwrap();
        assert_eq!(first.iter().map(|r| r.external_id).collect::<Vec<_>>(), vec![Some(1), Some(2)]);
        let last = feed.fetch_page(4, 2).await.unwrap();
        assert_eq!(last.len(), 1);
        assert!(feed.fetch_page(5, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_days_are_not_found() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 28).unwrap();
        let feed = FixtureFeed::default();
        assert!(feed.fetch_steps(date).await.unwrap_err().is_not_found());
        assert!(feed.fetch_sleep(date).await.unwrap_err().is_not_found());
        assert!(feed.fetch_personal_records().await.unwrap().is_empty());
    }

    #[test]
    fn load_reads_partial_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, r#"{ "steps": { "2026-01-28": { "totalSteps": 4200 } } }"#).unwrap();

        let feed = FixtureFeed::load(&path).unwrap();
        assert!(feed.payload().activities.is_empty());
        let date = NaiveDate::from_ymd_opt(2026, 1, 28).unwrap();
        assert_eq!(feed.payload().steps[&date].total_steps, Some(4200));

        assert!(FixtureFeed::load(dir.path().join("missing.json")).is_err());
    }
}
