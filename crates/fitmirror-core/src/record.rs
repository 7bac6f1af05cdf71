//! Records as they arrive from the source feed.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One activity observation from the feed.
///
/// `start_time_gmt` is kept as the raw string the feed reported so that the
/// date-only fallback can still slice it when it does not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SourceRecord {
    pub external_id: Option<i64>,
    pub start_time_gmt: String,
    pub type_key: String,
    pub label: String,
    pub metrics: Measurements,
}

/// Raw measurement fields. Absent values format as zero / empty / false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Measurements {
    /// Meters.
    pub distance: Option<f64>,
    /// Seconds.
    pub duration: Option<f64>,
    pub calories: Option<f64>,
    /// Meters per second.
    pub average_speed: Option<f64>,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    pub aerobic_effect: Option<f64>,
    pub anaerobic_effect: Option<f64>,
    pub aerobic_message: Option<String>,
    pub anaerobic_message: Option<String>,
    pub training_effect_label: Option<String>,
    pub personal_record: bool,
    pub favorite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySteps {
    pub date: NaiveDate,
    pub total_steps: i64,
    pub total_distance_meters: f64,
    pub daily_step_goal: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySleep {
    pub date: NaiveDate,
    pub deep_seconds: f64,
    pub light_seconds: f64,
    pub rem_seconds: f64,
    pub awake_seconds: f64,
    pub resting_heart_rate: Option<f64>,
    pub start_local: Option<NaiveDateTime>,
    pub end_local: Option<NaiveDateTime>,
}

impl DailySleep {
    /// Awake time is not counted as sleep.
    pub fn total_seconds(&self) -> f64 {
        self.deep_seconds + self.light_seconds + self.rem_seconds
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub type_id: i64,
    pub activity_type: Option<String>,
    pub value: f64,
    /// GMT start of the record-setting activity, as formatted by the feed.
    pub start_time_formatted: Option<String>,
}
