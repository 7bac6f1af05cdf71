//! Timestamp normalization between the feed's UTC strings and the display zone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DISPLAY_ZONE: Tz = chrono_tz::Europe::Brussels;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a feed timestamp into a UTC instant.
///
/// Tried in order: RFC 3339 (with a trailing `Z` rewritten to `+00:00`),
/// explicit-offset layouts, naive layouts (assumed UTC), and finally the
/// leading 19 characters as `%Y-%m-%dT%H:%M:%S`. Returns `None` rather than
/// failing; callers fall back to slicing the calendar date.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let s = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(base) => format!("{base}+00:00"),
        None => trimmed.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(naive.and_utc());
        }
    }
    s.get(..19)
        .and_then(|head| NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S").ok())
        .map(|naive| naive.and_utc())
}

/// `[start, end)` bounds of one local calendar day, ready to drop into date
/// filters. Both bounds are RFC 3339 with offset, or bare `YYYY-MM-DD` dates
/// when the source timestamp could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDayWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalNormalizer {
    zone: Tz,
}

impl Default for TemporalNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_ZONE)
    }
}

impl TemporalNormalizer {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        parse_utc(raw)
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.zone)
    }

    /// RFC 3339 in the display zone; the raw string unchanged if unparsable.
    pub fn to_local_string(&self, raw: &str) -> String {
        match parse_utc(raw) {
            Some(instant) => self.to_local(instant).to_rfc3339(),
            None => raw.to_string(),
        }
    }

    pub fn local_date(&self, raw: &str) -> Option<NaiveDate> {
        match parse_utc(raw) {
            Some(instant) => Some(self.to_local(instant).date_naive()),
            None => leading_date(raw),
        }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.to_local(now).date_naive()
    }

    pub fn local_day_window(&self, raw: &str) -> Option<LocalDayWindow> {
        if let Some(instant) = parse_utc(raw) {
            let day = self.to_local(instant).date_naive();
            let next = day.succ_opt()?;
            if let (Some(start), Some(end)) = (self.local_midnight(day), self.local_midnight(next)) {
                return Some(LocalDayWindow {
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                });
            }
        }
        let day = leading_date(raw)?;
        let next = day.succ_opt()?;
        Some(LocalDayWindow {
            start: day.format("%Y-%m-%d").to_string(),
            end: next.format("%Y-%m-%d").to_string(),
        })
    }

    /// Zones that skip midnight on a DST change start the day at the first
    /// valid local instant after it.
    fn local_midnight(&self, day: NaiveDate) -> Option<DateTime<Tz>> {
        let midnight = day.and_hms_opt(0, 0, 0)?;
        self.zone
            .from_local_datetime(&midnight)
            .earliest()
            .or_else(|| {
                self.zone
                    .from_local_datetime(&(midnight + Duration::hours(1)))
                    .earliest()
            })
    }
}

fn leading_date(raw: &str) -> Option<NaiveDate> {
    raw.trim()
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}
