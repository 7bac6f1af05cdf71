//! Pure formatting from raw feed fields to destination display values.
//!
//! Every function here is total: missing or unknown input falls back to a
//! fixed value instead of failing.

use serde::{Deserialize, Serialize};

use crate::record::{DailySleep, SourceRecord};
use crate::tables::MappingTables;

pub const UNKNOWN: &str = "Unknown";
pub const UNNAMED_ACTIVITY: &str = "Unnamed Activity";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCategory {
    pub category: String,
    pub subcategory: String,
}

/// Upper-cases every letter that follows a non-letter and lower-cases the rest.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut previous_is_letter = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

/// Label overrides take precedence over anything the type key says.
pub fn derive_category(type_key: &str, label: &str, tables: &MappingTables) -> ActivityCategory {
    let lowered = label.to_lowercase();
    if let Some(hit) = tables
        .label_overrides
        .iter()
        .find(|o| !o.needle.is_empty() && lowered.contains(&o.needle.to_lowercase()))
    {
        return ActivityCategory {
            category: hit.category.clone(),
            subcategory: hit.subcategory.clone(),
        };
    }

    let formatted = if type_key.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        title_case(&type_key.replace('_', " "))
    };
    let category = tables
        .category_remap
        .get(&formatted)
        .cloned()
        .unwrap_or_else(|| formatted.clone());
    ActivityCategory {
        category,
        subcategory: formatted,
    }
}

pub fn display_name(label: &str) -> String {
    if label.trim().is_empty() {
        return UNNAMED_ACTIVITY.to_string();
    }
    label.replace("ENTERTAINMENT", "Netflix")
}

/// Minutes per kilometer, both parts truncated.
pub fn format_pace(average_speed: Option<f64>) -> String {
    match average_speed {
        Some(speed) if speed > 0.0 && speed.is_finite() => {
            let pace = 1000.0 / (speed * 60.0);
            let minutes = pace.trunc();
            let seconds = ((pace - minutes) * 60.0).trunc();
            format!("{}:{:02} min/km", minutes as i64, seconds as i64)
        }
        _ => String::new(),
    }
}

pub fn format_duration(seconds: Option<f64>) -> String {
    let seconds = match seconds {
        Some(s) if s > 0.0 && s.is_finite() => s,
        _ => return "0h 0m".to_string(),
    };
    let hours = (seconds / 3600.0).floor() as i64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as i64;
    format!("{hours}h {minutes}m")
}

/// Longest matching prefix wins; unmatched messages pass through unchanged.
pub fn format_training_message(message: Option<&str>, tables: &MappingTables) -> String {
    let message = match message {
        Some(m) if !m.is_empty() => m,
        _ => return UNKNOWN.to_string(),
    };
    tables
        .training_messages
        .iter()
        .filter(|entry| message.starts_with(&entry.prefix))
        .max_by_key(|entry| entry.prefix.len())
        .map(|entry| entry.label.clone())
        .unwrap_or_else(|| message.to_string())
}

pub fn format_training_effect(label: Option<&str>) -> String {
    match label {
        Some(l) if !l.is_empty() => title_case(&l.replace('_', " ")),
        _ => UNKNOWN.to_string(),
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn meters_to_km(meters: Option<f64>) -> f64 {
    round_to(meters.unwrap_or(0.0) / 1000.0, 2)
}

pub fn seconds_to_minutes(seconds: Option<f64>) -> f64 {
    round_to(seconds.unwrap_or(0.0) / 60.0, 2)
}

pub fn seconds_to_hours(seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    round_to(seconds / 3600.0, 2)
}

/// `HH:MM - HH:MM`, or empty when either end is missing.
pub fn format_sleep_times(sleep: &DailySleep) -> String {
    match (sleep.start_local, sleep.end_local) {
        (Some(start), Some(end)) => format!("{} - {}", start.format("%H:%M"), end.format("%H:%M")),
        _ => String::new(),
    }
}

/// Groups an integer with commas: `12345` -> `12,345`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

fn minutes_seconds(total_seconds: i64) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Display value and pace for a personal record, keyed by record type id.
pub fn format_record_value(value: f64, type_id: i64) -> (String, String) {
    let total = value.round() as i64;
    match type_id {
        1 => {
            let formatted = format!("{} /km", minutes_seconds(total));
            (formatted.clone(), formatted)
        }
        2 => {
            let pace = total as f64 / 1.60934;
            let pace = format!("{}:{:02} /km", (pace / 60.0).floor() as i64, (pace % 60.0).floor() as i64);
            (minutes_seconds(total), pace)
        }
        3 => (minutes_seconds(total), format!("{} /km", minutes_seconds(total / 5))),
        4 => {
            let hours = total / 3600;
            let formatted = if hours > 0 {
                format!("{}:{:02}:{:02}", hours, (total % 3600) / 60, total % 60)
            } else {
                minutes_seconds(total)
            };
            (formatted, format!("{} /km", minutes_seconds(total / 10)))
        }
        7 | 8 => (format!("{:.2} km", value / 1000.0), String::new()),
        9 => (format!("{} m", group_thousands(value.trunc() as i64)), String::new()),
        10 => (format!("{total} W"), String::new()),
        12..=14 => (group_thousands(total), String::new()),
        15 => (format!("{total} days"), String::new()),
        _ => (value.to_string(), String::new()),
    }
}

/// The full destination field set for one activity, computed once and shared
/// by change detection and the write path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedActivity {
    pub external_id: Option<i64>,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub distance_km: f64,
    pub duration_min: f64,
    pub calories: i64,
    pub pace: String,
    pub avg_power: f64,
    pub max_power: f64,
    pub training_effect: String,
    pub aerobic: f64,
    pub aerobic_effect: String,
    pub anaerobic: f64,
    pub anaerobic_effect: String,
    pub personal_record: bool,
    pub favorite: bool,
}

impl FormattedActivity {
    pub fn new(record: &SourceRecord, tables: &MappingTables) -> Self {
        let m = &record.metrics;
        let name = display_name(&record.label);
        let ActivityCategory {
            category,
            subcategory,
        } = derive_category(&record.type_key, &name, tables);
        Self {
            external_id: record.external_id,
            name,
            category,
            subcategory,
            distance_km: meters_to_km(m.distance),
            duration_min: seconds_to_minutes(m.duration),
            calories: m.calories.unwrap_or(0.0).round() as i64,
            pace: format_pace(m.average_speed),
            avg_power: round_to(m.avg_power.unwrap_or(0.0), 1),
            max_power: round_to(m.max_power.unwrap_or(0.0), 1),
            training_effect: format_training_effect(m.training_effect_label.as_deref()),
            aerobic: round_to(m.aerobic_effect.unwrap_or(0.0), 1),
            aerobic_effect: format_training_message(m.aerobic_message.as_deref(), tables),
            anaerobic: round_to(m.anaerobic_effect.unwrap_or(0.0), 1),
            anaerobic_effect: format_training_message(m.anaerobic_message.as_deref(), tables),
            personal_record: m.personal_record,
            favorite: m.favorite,
        }
    }

    /// Icons are looked up by subcategory when it is more specific.
    pub fn icon_key(&self) -> &str {
        if self.subcategory != self.category {
            &self.subcategory
        } else {
            &self.category
        }
    }
}
