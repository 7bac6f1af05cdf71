//! Boolean query filters over document properties.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{PropertyValue, StoredDocument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Property { property: String, condition: Condition },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    NumberEquals(f64),
    /// The number property is unset.
    NumberIsEmpty,
    SelectEquals(String),
    TitleEquals(String),
    RichTextEquals(String),
    CheckboxEquals(bool),
    DateEquals(String),
    DateOnOrAfter(String),
    DateBefore(String),
}

impl Filter {
    pub fn property(property: impl Into<String>, condition: Condition) -> Self {
        Self::Property {
            property: property.into(),
            condition,
        }
    }

    /// Evaluates the filter locally, the way the store would.
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        match self {
            Self::And(parts) => parts.iter().all(|f| f.matches(doc)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(doc)),
            Self::Property {
                property,
                condition,
            } => condition_matches(doc.properties.get(property), condition),
        }
    }
}

fn condition_matches(value: Option<&PropertyValue>, condition: &Condition) -> bool {
    match (condition, value) {
        (Condition::NumberEquals(expected), Some(PropertyValue::Number(Some(actual)))) => {
            actual == expected
        }
        (Condition::NumberIsEmpty, None | Some(PropertyValue::Number(None))) => true,
        (Condition::SelectEquals(expected), Some(PropertyValue::Select(Some(actual)))) => {
            actual == expected
        }
        (Condition::TitleEquals(expected), Some(PropertyValue::Title(actual)))
        | (Condition::RichTextEquals(expected), Some(PropertyValue::RichText(actual))) => {
            actual == expected
        }
        (Condition::CheckboxEquals(expected), Some(PropertyValue::Checkbox(actual))) => {
            actual == expected
        }
        (Condition::CheckboxEquals(expected), None) => !expected,
        (Condition::DateEquals(expected), Some(PropertyValue::Date(Some(actual)))) => {
            if expected.len() == 10 {
                actual.get(..10) == Some(expected.as_str())
            } else {
                date_instant(actual).is_some() && date_instant(actual) == date_instant(expected)
            }
        }
        (Condition::DateOnOrAfter(bound), Some(PropertyValue::Date(Some(actual)))) => {
            match (date_instant(actual), date_instant(bound)) {
                (Some(a), Some(b)) => a >= b,
                _ => false,
            }
        }
        (Condition::DateBefore(bound), Some(PropertyValue::Date(Some(actual)))) => {
            match (date_instant(actual), date_instant(bound)) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Date-only strings compare as UTC midnight.
fn date_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Properties;

    fn doc_on(date: &str) -> StoredDocument {
        let mut props = Properties::new();
        props.insert("Date".into(), PropertyValue::Date(Some(date.into())));
        props.insert("Activity Type".into(), PropertyValue::Select(Some("Running".into())));
        StoredDocument::new("p", props)
    }

    #[test]
    fn date_range_is_half_open() {
        let window = Filter::And(vec![
            Filter::property("Date", Condition::DateOnOrAfter("2026-01-28T00:00:00+01:00".into())),
            Filter::property("Date", Condition::DateBefore("2026-01-29T00:00:00+01:00".into())),
        ]);
        assert!(window.matches(&doc_on("2026-01-28T00:00:00+01:00")));
        assert!(window.matches(&doc_on("2026-01-28T22:59:59+00:00")));
        assert!(!window.matches(&doc_on("2026-01-29T00:00:00+01:00")));
        assert!(!window.matches(&doc_on("2026-01-27T22:59:59+00:00")));
    }

    #[test]
    fn date_equals_on_calendar_day() {
        let f = Filter::property("Date", Condition::DateEquals("2026-01-28".into()));
        assert!(f.matches(&doc_on("2026-01-28")));
        assert!(f.matches(&doc_on("2026-01-28T07:00:00+01:00")));
        assert!(!f.matches(&doc_on("2026-01-29")));
    }

    #[test]
    fn or_and_missing_properties() {
        let f = Filter::Or(vec![
            Filter::property("Activity Type", Condition::SelectEquals("Cycling".into())),
            Filter::property("Garmin ID", Condition::NumberEquals(7.0)),
        ]);
        assert!(!f.matches(&doc_on("2026-01-28")));
        let f = Filter::property("Activity Type", Condition::SelectEquals("Running".into()));
        assert!(f.matches(&doc_on("2026-01-28")));
    }

    #[test]
    fn number_is_empty_matches_absent_and_null() {
        let f = Filter::property("Garmin ID", Condition::NumberIsEmpty);
        let mut doc = doc_on("2026-01-28");
        assert!(f.matches(&doc));
        doc.properties.insert("Garmin ID".into(), PropertyValue::Number(None));
        assert!(f.matches(&doc));
        doc.properties.insert("Garmin ID".into(), PropertyValue::Number(Some(7.0)));
        assert!(!f.matches(&doc));
    }
}
