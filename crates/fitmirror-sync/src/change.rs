//! Staleness check between a stored activity document and a fresh record.

use fitmirror_core::format::UNKNOWN;
use fitmirror_core::schema::activity as prop;
use fitmirror_core::{FormattedActivity, StoredDocument};

pub const DISTANCE_TOLERANCE: f64 = 0.01;
pub const DURATION_TOLERANCE: f64 = 0.01;
pub const POWER_TOLERANCE: f64 = 0.1;
pub const EFFECT_TOLERANCE: f64 = 0.1;

/// True when `a` and `b` differ by more than `tolerance`.
pub fn exceeds(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() > tolerance
}

/// True when the stored document carries the `Unknown`/`Unknown` pair that a
/// degraded write leaves behind for a record with a real category.
pub fn is_degraded_copy(stored: &StoredDocument, incoming: &FormattedActivity) -> bool {
    incoming.category != UNKNOWN
        && stored.select(prop::CATEGORY) == UNKNOWN
        && stored.select(prop::SUBCATEGORY) == UNKNOWN
}

pub fn needs_update(stored: &StoredDocument, incoming: &FormattedActivity) -> bool {
    first_difference(stored, incoming).is_some()
}

/// Name of the first property that makes the stored document stale, checked
/// in a fixed order: id backfill, tolerant numbers, exact values, subcategory.
/// Category and subcategory are not compared against a degraded copy.
pub fn first_difference(stored: &StoredDocument, incoming: &FormattedActivity) -> Option<&'static str> {
    let degraded = is_degraded_copy(stored, incoming);
    if stored.number(prop::EXTERNAL_ID).is_none() && incoming.external_id.is_some() {
        return Some(prop::EXTERNAL_ID);
    }

    let numeric = [
        (prop::DISTANCE_KM, incoming.distance_km, DISTANCE_TOLERANCE),
        (prop::DURATION_MIN, incoming.duration_min, DURATION_TOLERANCE),
        (prop::AVG_POWER, incoming.avg_power, POWER_TOLERANCE),
        (prop::MAX_POWER, incoming.max_power, POWER_TOLERANCE),
        (prop::AEROBIC, incoming.aerobic, EFFECT_TOLERANCE),
        (prop::ANAEROBIC, incoming.anaerobic, EFFECT_TOLERANCE),
    ];
    if let Some((name, _, _)) = numeric
        .iter()
        .find(|(name, value, tolerance)| exceeds(stored.number_or_zero(name), *value, *tolerance))
    {
        return Some(*name);
    }

    if stored.text(prop::AVG_PACE) != incoming.pace {
        return Some(prop::AVG_PACE);
    }
    if stored.number_or_zero(prop::CALORIES).round() as i64 != incoming.calories {
        return Some(prop::CALORIES);
    }

    let selects = [
        (prop::CATEGORY, &incoming.category),
        (prop::TRAINING_EFFECT, &incoming.training_effect),
        (prop::AEROBIC_EFFECT, &incoming.aerobic_effect),
        (prop::ANAEROBIC_EFFECT, &incoming.anaerobic_effect),
    ];
    if let Some((name, _)) = selects
        .iter()
        .filter(|(name, _)| !(degraded && *name == prop::CATEGORY))
        .find(|(name, value)| stored.select(name) != value.as_str())
    {
        return Some(*name);
    }

    if stored.checkbox(prop::PERSONAL_RECORD) != incoming.personal_record {
        return Some(prop::PERSONAL_RECORD);
    }
    if stored.checkbox(prop::FAVORITE) != incoming.favorite {
        return Some(prop::FAVORITE);
    }

    if degraded {
        return None;
    }
    let stored_subcategory = stored.select(prop::SUBCATEGORY);
    let stale_subcategory = if stored_subcategory.is_empty() {
        incoming.subcategory != incoming.category
    } else {
        stored_subcategory != incoming.subcategory
    };
    stale_subcategory.then_some(prop::SUBCATEGORY)
}
