//! Static lookup tables consumed by the formatter.
//!
//! The defaults are declared here; deployments can extend or replace them
//! through [`TableOverrides`] without touching formatting control flow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Formatted type keys that collapse into a broader category. The formatted
/// key itself becomes the subcategory.
const CATEGORY_REMAP: &[(&str, &str)] = &[
    ("Barre", "Strength"),
    ("Indoor Cardio", "Cardio"),
    ("Indoor Cycling", "Cycling"),
    ("Indoor Rowing", "Rowing"),
    ("Speed Walking", "Walking"),
    ("Strength Training", "Strength"),
    ("Treadmill Running", "Running"),
    ("Rowing V2", "Rowing"),
    ("Yoga", "Yoga/Pilates"),
    ("Pilates", "Yoga/Pilates"),
];

const LABEL_OVERRIDES: &[(&str, &str, &str)] = &[
    ("meditation", "Meditation", "Meditation"),
    ("barre", "Strength", "Barre"),
    ("stretch", "Stretching", "Stretching"),
];

const TRAINING_MESSAGES: &[(&str, &str)] = &[
    ("NO_", "No Benefit"),
    ("MINOR_", "Some Benefit"),
    ("RECOVERY_", "Recovery"),
    ("MAINTAINING_", "Maintaining"),
    ("IMPROVING_", "Impacting"),
    ("IMPACTING_", "Impacting"),
    ("HIGHLY_", "Highly Impacting"),
    ("OVERREACHING_", "Overreaching"),
];

const ACTIVITY_ICONS: &[(&str, &str)] = &[
    ("Barre", "66924"),
    ("Breathwork", "9798"),
    ("Cardio", "71221"),
    ("Cycling", "47443"),
    ("Hiking", "9844"),
    ("Indoor Cardio", "62779"),
    ("Indoor Cycling", "47443"),
    ("Indoor Rowing", "71098"),
    ("Pilates", "9774"),
    ("Meditation", "9798"),
    ("Rowing", "71491"),
    ("Running", "k1l1XFkME39t"),
    ("Strength Training", "107640"),
    ("Stretching", "djfOcRn1m_kh"),
    ("Swimming", "9777"),
    ("Treadmill Running", "9794"),
    ("Walking", "9807"),
    ("Yoga", "9783"),
];

const RECORD_NAMES: &[(i64, &str)] = &[
    (1, "1K"),
    (2, "1mi"),
    (3, "5K"),
    (4, "10K"),
    (7, "Longest Run"),
    (8, "Longest Ride"),
    (9, "Total Ascent"),
    (10, "Max Avg Power (20 min)"),
    (12, "Most Steps in a Day"),
    (13, "Most Steps in a Week"),
    (14, "Most Steps in a Month"),
    (15, "Longest Goal Streak"),
];

const RECORD_EMOJI: &[(&str, &str)] = &[
    ("1K", "\u{1f947}"),
    ("1mi", "\u{26a1}"),
    ("5K", "\u{1f45f}"),
    ("10K", "\u{2b50}"),
    ("Longest Run", "\u{1f3c3}"),
    ("Longest Ride", "\u{1f6b4}"),
    ("Total Ascent", "\u{1f6b5}"),
    ("Max Avg Power (20 min)", "\u{1f50b}"),
    ("Most Steps in a Day", "\u{1f463}"),
    ("Most Steps in a Week", "\u{1f6b6}"),
    ("Most Steps in a Month", "\u{1f4c5}"),
    ("Longest Goal Streak", "\u{2714}\u{fe0f}"),
];

/// Record type id the feed reports but that has no destination row.
pub const IGNORED_RECORD_TYPE: i64 = 16;

pub fn record_name(type_id: i64) -> &'static str {
    RECORD_NAMES
        .iter()
        .find(|(id, _)| *id == type_id)
        .map(|(_, name)| *name)
        .unwrap_or(crate::format::UNNAMED_ACTIVITY)
}

pub fn record_emoji(name: &str) -> &'static str {
    RECORD_EMOJI
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, emoji)| *emoji)
        .unwrap_or("\u{1f3c5}")
}

fn icon_url(id: &str) -> String {
    format!("https://img.icons8.com/?size=100&id={id}&format=png&color=000000")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOverride {
    /// Matched case-insensitively as a substring of the activity label.
    pub needle: String,
    pub category: String,
    pub subcategory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixLabel {
    pub prefix: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTables {
    pub category_remap: BTreeMap<String, String>,
    /// Checked in order; the first hit wins.
    pub label_overrides: Vec<LabelOverride>,
    pub training_messages: Vec<PrefixLabel>,
    /// Icon URL keyed by category or subcategory.
    pub icons: BTreeMap<String, String>,
}

impl Default for MappingTables {
    fn default() -> Self {
        Self {
            category_remap: CATEGORY_REMAP
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            label_overrides: LABEL_OVERRIDES
                .iter()
                .map(|(needle, category, subcategory)| LabelOverride {
                    needle: needle.to_string(),
                    category: category.to_string(),
                    subcategory: subcategory.to_string(),
                })
                .collect(),
            training_messages: TRAINING_MESSAGES
                .iter()
                .map(|(prefix, label)| PrefixLabel {
                    prefix: prefix.to_string(),
                    label: label.to_string(),
                })
                .collect(),
            icons: ACTIVITY_ICONS
                .iter()
                .map(|(key, id)| (key.to_string(), icon_url(id)))
                .collect(),
        }
    }
}

/// Deserializable overlay. Map sections extend the defaults key by key; list
/// sections replace the defaults when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableOverrides {
    #[serde(default)]
    pub category_remap: BTreeMap<String, String>,
    #[serde(default)]
    pub label_overrides: Option<Vec<LabelOverride>>,
    #[serde(default)]
    pub training_messages: Option<Vec<PrefixLabel>>,
    #[serde(default)]
    pub icons: BTreeMap<String, String>,
}

impl MappingTables {
    pub fn with_overrides(mut self, overrides: TableOverrides) -> Self {
        self.category_remap.extend(overrides.category_remap);
        self.icons.extend(overrides.icons);
        if let Some(label_overrides) = overrides.label_overrides {
            self.label_overrides = label_overrides;
        }
        if let Some(training_messages) = overrides.training_messages {
            self.training_messages = training_messages;
        }
        self
    }

    pub fn icon(&self, key: &str) -> Option<&str> {
        self.icons.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_declared_entry() {
        let tables = MappingTables::default();
        assert_eq!(tables.category_remap.len(), CATEGORY_REMAP.len());
        assert_eq!(tables.category_remap["Treadmill Running"], "Running");
        assert_eq!(tables.label_overrides[0].needle, "meditation");
        assert_eq!(tables.training_messages.len(), 8);
        assert!(tables.icon("Running").unwrap().contains("id=k1l1XFkME39t&"));
        assert_eq!(tables.icon("Golf"), None);
    }

    #[test]
    fn record_lookups_fall_back() {
        assert_eq!(record_name(3), "5K");
        assert_eq!(record_name(99), "Unnamed Activity");
        assert_eq!(record_emoji("5K"), "\u{1f45f}");
        assert_eq!(record_emoji("Fastest Mile"), "\u{1f3c5}");
    }

    #[test]
    fn overrides_extend_maps_and_replace_lists() {
        let overrides = TableOverrides {
            category_remap: BTreeMap::from([("Trail Running".to_string(), "Running".to_string())]),
            label_overrides: Some(vec![]),
            training_messages: None,
            icons: BTreeMap::from([("Golf".to_string(), "https://example.test/golf.png".to_string())]),
        };
        let tables = MappingTables::default().with_overrides(overrides);
        assert_eq!(tables.category_remap["Trail Running"], "Running");
        assert_eq!(tables.category_remap["Indoor Rowing"], "Rowing");
        assert!(tables.label_overrides.is_empty());
        assert_eq!(tables.training_messages.len(), 8);
        assert_eq!(tables.icon("Golf"), Some("https://example.test/golf.png"));
    }
}
