//! Process-local [`DocumentStore`] used by dry runs against fixtures and tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use fitmirror_core::{Filter, Icon, Properties, PropertyValue, StoredDocument};
use tokio::sync::Mutex;

use crate::{DocumentStore, StoreError};

/// One mutating call as the store saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create {
        collection: String,
        properties: Properties,
        icon: Option<Icon>,
    },
    Update {
        document_id: String,
        properties: Properties,
        icon: Option<Icon>,
    },
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<StoredDocument>>,
    calls: Vec<StoreCall>,
    queries: usize,
    next_id: u64,
}

/// Select properties listed in `allowed_options` reject unknown values with
/// [`StoreError::SchemaValidation`], the way a strict remote schema would.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    allowed_options: BTreeMap<String, BTreeSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_select_options<I, S>(mut self, property: &str, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_options
            .insert(property.to_string(), options.into_iter().map(Into::into).collect());
        self
    }

    /// Seeds a document without recording a call.
    pub async fn insert(&self, collection: &str, properties: Properties) -> StoredDocument {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let doc = StoredDocument::new(format!("mem-{}", state.next_id), properties);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        doc
    }

    pub async fn documents(&self, collection: &str) -> Vec<StoredDocument> {
        let state = self.state.lock().await;
        state.collections.get(collection).cloned().unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn query_count(&self) -> usize {
        self.state.lock().await.queries
    }

    pub async fn write_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    fn check_options(&self, properties: &Properties) -> Result<(), StoreError> {
        for (name, value) in properties {
            let (Some(allowed), PropertyValue::Select(Some(option))) =
                (self.allowed_options.get(name), value)
            else {
                continue;
            };
            if !allowed.contains(option) {
                return Err(StoreError::SchemaValidation {
                    message: format!("{option} is not a valid option for {name}"),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let mut state = self.state.lock().await;
        state.queries += 1;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default())
    }

    async fn create(
        &self,
        collection: &str,
        properties: &Properties,
        icon: Option<&Icon>,
    ) -> Result<StoredDocument, StoreError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Create {
            collection: collection.to_string(),
            properties: properties.clone(),
            icon: icon.cloned(),
        });
        self.check_options(properties)?;

        state.next_id += 1;
        let doc = StoredDocument::new(format!("mem-{}", state.next_id), properties.clone());
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        document_id: &str,
        properties: &Properties,
        icon: Option<&Icon>,
    ) -> Result<StoredDocument, StoreError> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Update {
            document_id: document_id.to_string(),
            properties: properties.clone(),
            icon: icon.cloned(),
        });
        self.check_options(properties)?;

        let doc = state
            .collections
            .values_mut()
            .flat_map(|docs| docs.iter_mut())
            .find(|doc| doc.id == document_id)
            .ok_or_else(|| StoreError::Api {
                status: 404,
                code: "object_not_found".into(),
                message: format!("no page {document_id}"),
            })?;
        // Partial update: untouched properties keep their stored values.
        doc.properties
            .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(doc.clone())
    }
}

#[cfg(test)]
mod tests {
    use fitmirror_core::Condition;

    use super::*;

    fn props(name: &str, kind: &str) -> Properties {
        Properties::from([
            ("Activity Name".to_string(), PropertyValue::Title(name.to_string())),
            ("Activity Type".to_string(), PropertyValue::Select(Some(kind.to_string()))),
        ])
    }

    #[tokio::test]
    async fn query_filters_within_a_collection() {
        let store = InMemoryStore::new();
        store.insert("activities", props("Morning Run", "Running")).await;
        store.insert("activities", props("Evening Ride", "Cycling")).await;
        store.insert("other", props("Morning Run", "Running")).await;

        let filter = Filter::property("Activity Type", Condition::SelectEquals("Running".into()));
        let hits = store.query("activities", &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text("Activity Name"), "Morning Run");
        assert_eq!(store.query_count().await, 1);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn update_merges_properties() {
        let store = InMemoryStore::new();
        let doc = store.insert("activities", props("Morning Run", "Running")).await;
        let mut patch = Properties::new();
        patch.insert("Calories".into(), PropertyValue::Number(Some(512.0)));

        let updated = store.update(&doc.id, &patch, None).await.unwrap();
        assert_eq!(updated.text("Activity Name"), "Morning Run");
        assert_eq!(updated.number("Calories"), Some(512.0));
        assert!(store.update("missing", &patch, None).await.is_err());
    }

    #[tokio::test]
    async fn unknown_select_options_are_rejected_but_recorded() {
        let store = InMemoryStore::new().with_select_options("Activity Type", ["Running", "Unknown"]);
        let err = store
            .create("activities", &props("Padel", "Padel"), None)
            .await
            .unwrap_err();
        assert!(err.is_schema_validation());
        assert!(store.documents("activities").await.is_empty());

        store
            .create("activities", &props("Padel", "Unknown"), None)
            .await
            .unwrap();
        assert_eq!(store.write_count().await, 2);
        assert_eq!(store.documents("activities").await.len(), 1);
    }
}
