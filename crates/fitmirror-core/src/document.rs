//! Documents as they live in the destination store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Typed value of a single destination property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Number(Option<f64>),
    Select(Option<String>),
    Date(Option<String>),
    Checkbox(bool),
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// Page icon attached on create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Icon {
    External(String),
    Emoji(String),
}

/// A document owned by the store. Reads are null-safe: a missing property, or
/// a property of an unexpected kind, reads as the documented default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub properties: Properties,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, properties: Properties) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }

    /// `None` when the property is absent or empty.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.properties.get(key) {
            Some(PropertyValue::Number(value)) => *value,
            _ => None,
        }
    }

    pub fn number_or_zero(&self, key: &str) -> f64 {
        self.number(key).unwrap_or(0.0)
    }

    pub fn select(&self, key: &str) -> &str {
        match self.properties.get(key) {
            Some(PropertyValue::Select(Some(name))) => name,
            _ => "",
        }
    }

    /// Title or rich-text content.
    pub fn text(&self, key: &str) -> &str {
        match self.properties.get(key) {
            Some(PropertyValue::Title(text)) | Some(PropertyValue::RichText(text)) => text,
            _ => "",
        }
    }

    pub fn checkbox(&self, key: &str) -> bool {
        matches!(self.properties.get(key), Some(PropertyValue::Checkbox(true)))
    }

    pub fn date(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(PropertyValue::Date(Some(start))) => Some(start),
            _ => None,
        }
    }
}
