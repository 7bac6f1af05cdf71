//! One document per calendar day for steps and sleep. Existing days are never
//! rewritten.

use chrono::{Duration, NaiveDate};
use fitmirror_adapters::{FeedError, SourceFeed};
use fitmirror_core::format::{format_duration, format_sleep_times, meters_to_km, seconds_to_hours};
use fitmirror_core::schema::{sleep, steps};
use fitmirror_core::{
    Condition, DailySleep, DailySteps, Filter, Properties, PropertyValue, ReconciliationCounters,
};
use fitmirror_storage::DocumentStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, Instrument};

use crate::upsert::{UpsertExecutor, WriteTarget};

/// Days looked back in full mode.
pub const FULL_HISTORY_DAYS: i64 = 730;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyKind {
    Steps,
    Sleep,
}

impl DailyKind {
    pub fn date_property(self) -> &'static str {
        match self {
            Self::Steps => steps::DATE,
            Self::Sleep => sleep::DATE,
        }
    }

    /// `Ok(None)` when the feed answered but the day holds no data.
    async fn fetch_properties(self, feed: &dyn SourceFeed, date: NaiveDate) -> Result<Option<Properties>, FeedError> {
        match self {
            Self::Steps => {
                let day = feed.fetch_steps(date).await?;
                Ok((day.total_steps > 0).then(|| steps_properties(&day)))
            }
            Self::Sleep => {
                let night = feed.fetch_sleep(date).await?;
                Ok((night.total_seconds() > 0.0).then(|| sleep_properties(&night)))
            }
        }
    }
}

pub fn steps_properties(day: &DailySteps) -> Properties {
    let date = day.date.format("%Y-%m-%d").to_string();
    Properties::from([
        (steps::TITLE.to_string(), PropertyValue::Title(steps::TITLE_VALUE.to_string())),
        (steps::DATE.to_string(), PropertyValue::Date(Some(date))),
        (steps::TOTAL_STEPS.to_string(), PropertyValue::Number(Some(day.total_steps as f64))),
        (
            steps::TOTAL_DISTANCE_KM.to_string(),
            PropertyValue::Number(Some(meters_to_km(Some(day.total_distance_meters)))),
        ),
        (steps::STEP_GOAL.to_string(), PropertyValue::Number(Some(day.daily_step_goal as f64))),
    ])
}

pub fn sleep_properties(night: &DailySleep) -> Properties {
    let date = night.date.format("%Y-%m-%d").to_string();
    let total = night.total_seconds();
    let mut props = Properties::from([
        (sleep::TITLE.to_string(), PropertyValue::Title(date.clone())),
        (sleep::DATE.to_string(), PropertyValue::Date(Some(date))),
        (sleep::TIMES.to_string(), PropertyValue::RichText(format_sleep_times(night))),
        (
            sleep::RESTING_HR.to_string(),
            PropertyValue::Number(Some(night.resting_heart_rate.unwrap_or(0.0))),
        ),
        (sleep::GOAL_MET.to_string(), PropertyValue::Checkbox(total >= sleep::GOAL_SECONDS)),
    ]);
    for (text, hours, seconds) in [
        (sleep::TOTAL, sleep::TOTAL_HOURS, total),
        (sleep::DEEP, sleep::DEEP_HOURS, night.deep_seconds),
        (sleep::LIGHT, sleep::LIGHT_HOURS, night.light_seconds),
        (sleep::REM, sleep::REM_HOURS, night.rem_seconds),
        (sleep::AWAKE, sleep::AWAKE_HOURS, night.awake_seconds),
    ] {
        props.insert(text.to_string(), PropertyValue::RichText(format_duration(Some(seconds))));
        props.insert(hours.to_string(), PropertyValue::Number(Some(seconds_to_hours(seconds))));
    }
    props
}

/// `today` first, then each earlier day, `days` in total. Stops early at the
/// earliest representable date.
pub fn days_back(today: NaiveDate, days: i64) -> impl Iterator<Item = NaiveDate> {
    (0..days.max(0)).map_while(move |offset| {
        Duration::try_days(offset).and_then(|span| today.checked_sub_signed(span))
    })
}

pub struct DailySync<'a> {
    store: &'a dyn DocumentStore,
    executor: UpsertExecutor<'a>,
    collection: &'a str,
    kind: DailyKind,
}

impl<'a> DailySync<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        executor: UpsertExecutor<'a>,
        collection: &'a str,
        kind: DailyKind,
    ) -> Self {
        Self {
            store,
            executor,
            collection,
            kind,
        }
    }

    pub async fn run(&self, feed: &dyn SourceFeed, today: NaiveDate, days: i64) -> ReconciliationCounters {
        let mut counters = ReconciliationCounters::default();
        for date in days_back(today, days) {
            let span = info_span!("daily_sync", kind = ?self.kind, %date);
            self.sync_day(feed, date, &mut counters).instrument(span).await;
        }
        info!(kind = ?self.kind, ?counters, "daily sync finished");
        counters
    }

    async fn sync_day(&self, feed: &dyn SourceFeed, date: NaiveDate, counters: &mut ReconciliationCounters) {
        let filter = Filter::property(
            self.kind.date_property(),
            Condition::DateEquals(date.format("%Y-%m-%d").to_string()),
        );
        match self.store.query(self.collection, &filter).await {
            Ok(existing) if !existing.is_empty() => {
                debug!("already stored");
                counters.unchanged += 1;
                return;
            }
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, "existence check failed");
                counters.errors += 1;
                return;
            }
        }

        let properties = match self.kind.fetch_properties(feed, date).await {
            Ok(Some(properties)) => properties,
            Ok(None) => {
                debug!("no data recorded");
                counters.skipped_no_data += 1;
                return;
            }
            Err(err) if err.is_not_found() => {
                debug!("feed has no entry");
                counters.skipped_no_data += 1;
                return;
            }
            Err(err) => {
                error!(error = %err, "feed fetch failed");
                counters.errors += 1;
                return;
            }
        };

        let target = WriteTarget::Create {
            collection: self.collection,
        };
        match self.executor.write(target, &properties, None).await {
            Ok(_) => {
                info!("created");
                counters.created += 1;
            }
            Err(err) => {
                error!(error = %err, "create failed");
                counters.errors += 1;
            }
        }
    }
}
