//! Two-tier identity lookup: external id first, then a same-day heuristic.

use fitmirror_core::format::UNKNOWN;
use fitmirror_core::schema::activity as prop;
use fitmirror_core::{
    Condition, Filter, FormattedActivity, IdentityKey, LocalDayWindow, ResolutionOutcome, TemporalNormalizer,
};
use fitmirror_storage::{DocumentStore, StoreError};
use tracing::debug;

/// Lookup keys for one activity, in the order they are tried.
pub fn identity_keys(
    activity: &FormattedActivity,
    start_time_gmt: &str,
    normalizer: &TemporalNormalizer,
) -> Vec<IdentityKey> {
    let mut keys = Vec::with_capacity(2);
    if let Some(id) = activity.external_id {
        keys.push(IdentityKey::ExternalId(id));
    }
    if let Some(window) = normalizer.local_day_window(start_time_gmt) {
        keys.push(IdentityKey::Heuristic {
            window,
            category: activity.category.clone(),
            label: activity.name.clone(),
        });
    }
    keys
}

pub fn filter_for(key: &IdentityKey) -> Filter {
    heuristic_or_id_filter(key, false)
}

/// Like [`filter_for`], but a heuristic key only matches documents that carry
/// no external id. Used once the incoming id itself has come back empty.
pub fn unlinked_filter_for(key: &IdentityKey) -> Filter {
    heuristic_or_id_filter(key, true)
}

fn heuristic_or_id_filter(key: &IdentityKey, unlinked_only: bool) -> Filter {
    match key {
        IdentityKey::ExternalId(id) => {
            Filter::property(prop::EXTERNAL_ID, Condition::NumberEquals(*id as f64))
        }
        IdentityKey::Heuristic {
            window: LocalDayWindow { start, end },
            category,
            label,
        } => {
            // A degraded write stored the category as Unknown.
            let category = if category == UNKNOWN {
                Filter::property(prop::CATEGORY, Condition::SelectEquals(UNKNOWN.to_string()))
            } else {
                Filter::Or(vec![
                    Filter::property(prop::CATEGORY, Condition::SelectEquals(category.clone())),
                    Filter::property(prop::CATEGORY, Condition::SelectEquals(UNKNOWN.to_string())),
                ])
            };
            let mut parts = vec![
                Filter::property(prop::DATE, Condition::DateOnOrAfter(start.clone())),
                Filter::property(prop::DATE, Condition::DateBefore(end.clone())),
                category,
                Filter::property(prop::NAME, Condition::TitleEquals(label.clone())),
            ];
            if unlinked_only {
                parts.push(Filter::property(prop::EXTERNAL_ID, Condition::NumberIsEmpty));
            }
            Filter::And(parts)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    /// The key that produced a match or ambiguity; `None` when nothing matched.
    pub matched_by: Option<IdentityKey>,
}

pub struct IdentityResolver<'a> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: &'a str) -> Self {
        Self { store, collection }
    }

    pub async fn lookup(&self, key: &IdentityKey) -> Result<ResolutionOutcome, StoreError> {
        self.query(&filter_for(key)).await
    }

    async fn query(&self, filter: &Filter) -> Result<ResolutionOutcome, StoreError> {
        let matches = self.store.query(self.collection, filter).await?;
        Ok(ResolutionOutcome::from_matches(matches))
    }

    pub async fn resolve_by_external_id(&self, id: i64) -> Result<ResolutionOutcome, StoreError> {
        self.lookup(&IdentityKey::ExternalId(id)).await
    }

    pub async fn resolve_by_heuristic(
        &self,
        window: LocalDayWindow,
        category: &str,
        label: &str,
    ) -> Result<ResolutionOutcome, StoreError> {
        self.lookup(&IdentityKey::Heuristic {
            window,
            category: category.to_string(),
            label: label.to_string(),
        })
        .await
    }

    /// Tries each key in turn; later keys are consulted only on `NotFound`.
    /// Once an external id has missed, heuristic keys skip documents already
    /// linked to some other id.
    pub async fn resolve(&self, keys: &[IdentityKey]) -> Result<Resolution, StoreError> {
        let mut id_missed = false;
        for key in keys {
            let filter = if id_missed {
                unlinked_filter_for(key)
            } else {
                filter_for(key)
            };
            let outcome = self.query(&filter).await?;
            if outcome != ResolutionOutcome::NotFound {
                return Ok(Resolution {
                    outcome,
                    matched_by: Some(key.clone()),
                });
            }
            debug!(?key, "no match");
            id_missed |= matches!(key, IdentityKey::ExternalId(_));
        }
        Ok(Resolution {
            outcome: ResolutionOutcome::NotFound,
            matched_by: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use fitmirror_core::{MappingTables, Measurements, Properties, PropertyValue, SourceRecord};
    use fitmirror_storage::InMemoryStore;

    use super::*;

    const COLLECTION: &str = "activities";

    fn stretch_session(external_id: Option<i64>) -> FormattedActivity {
        let record = SourceRecord {
            external_id,
            start_time_gmt: "2026-01-28T18:37:00Z".into(),
            type_key: "other".into(),
            label: "Evening stretch".into(),
            metrics: Measurements::default(),
        };
        FormattedActivity::new(&record, &MappingTables::default())
    }

    fn stored(date: &str, category: &str, name: &str, id: Option<f64>) -> Properties {
        let mut props = Properties::from([
            (prop::DATE.to_string(), PropertyValue::Date(Some(date.to_string()))),
            (prop::CATEGORY.to_string(), PropertyValue::Select(Some(category.to_string()))),
            (prop::NAME.to_string(), PropertyValue::Title(name.to_string())),
        ]);
        if let Some(id) = id {
            props.insert(prop::EXTERNAL_ID.to_string(), PropertyValue::Number(Some(id)));
        }
        props
    }

    #[test]
    fn keys_prefer_the_external_id() {
        let normalizer = TemporalNormalizer::default();
        let activity = stretch_session(Some(99));
        let keys = identity_keys(&activity, "2026-01-28T18:37:00Z", &normalizer);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], IdentityKey::ExternalId(99));
        match &keys[1] {
            IdentityKey::Heuristic { category, label, .. } => {
                assert_eq!(category, "Stretching");
                assert_eq!(label, "Evening stretch");
            }
            other => panic!("unexpected key {other:?}"),
        }

        let keys = identity_keys(&stretch_session(None), "not a date", &normalizer);
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn heuristic_only_runs_when_the_id_is_unknown() {
        let store = InMemoryStore::new();
        store
            .insert(COLLECTION, stored("2026-01-28T19:37:00+01:00", "Stretching", "Evening stretch", None))
            .await;
        let normalizer = TemporalNormalizer::default();
        let activity = stretch_session(Some(99));
        let keys = identity_keys(&activity, "2026-01-28T18:37:00Z", &normalizer);

        let resolution = IdentityResolver::new(&store, COLLECTION).resolve(&keys).await.unwrap();
        assert!(matches!(resolution.outcome, ResolutionOutcome::UniqueMatch(_)));
        assert!(matches!(resolution.matched_by, Some(IdentityKey::Heuristic { .. })));
        assert_eq!(store.query_count().await, 2);
    }

    #[tokio::test]
    async fn external_id_match_short_circuits() {
        let store = InMemoryStore::new();
        store
            .insert(COLLECTION, stored("2026-01-20T08:00:00+01:00", "Running", "Older name", Some(99.0)))
            .await;
        let normalizer = TemporalNormalizer::default();
        let keys = identity_keys(&stretch_session(Some(99)), "2026-01-28T18:37:00Z", &normalizer);

        let resolution = IdentityResolver::new(&store, COLLECTION).resolve(&keys).await.unwrap();
        assert!(matches!(resolution.outcome, ResolutionOutcome::UniqueMatch(_)));
        assert_eq!(resolution.matched_by, Some(IdentityKey::ExternalId(99)));
        assert_eq!(store.query_count().await, 1);
    }

    #[tokio::test]
    async fn window_end_is_exclusive_and_label_is_case_sensitive() {
        let store = InMemoryStore::new();
        store
            .insert(COLLECTION, stored("2026-01-29T00:00:00+01:00", "Stretching", "Evening stretch", None))
            .await;
        store
            .insert(COLLECTION, stored("2026-01-28T08:00:00+01:00", "Stretching", "evening stretch", None))
            .await;
        let normalizer = TemporalNormalizer::default();
        let keys = identity_keys(&stretch_session(None), "2026-01-28T18:37:00Z", &normalizer);

        let resolution = IdentityResolver::new(&store, COLLECTION).resolve(&keys).await.unwrap();
        assert_eq!(resolution.outcome, ResolutionOutcome::NotFound);
        assert_eq!(resolution.matched_by, None);

        let window = normalizer.local_day_window("2026-01-28T18:37:00Z").unwrap();
        let outcome = IdentityResolver::new(&store, COLLECTION)
            .resolve_by_heuristic(window, "Stretching", "evening stretch")
            .await
            .unwrap();
        assert!(matches!(outcome, ResolutionOutcome::UniqueMatch(_)));
    }

    #[tokio::test]
    async fn heuristic_skips_documents_linked_to_another_id() {
        let store = InMemoryStore::new();
        store
            .insert(COLLECTION, stored("2026-01-28T08:00:00+01:00", "Stretching", "Evening stretch", Some(98.0)))
            .await;
        let normalizer = TemporalNormalizer::default();
        let resolver = IdentityResolver::new(&store, COLLECTION);

        let linked = identity_keys(&stretch_session(Some(99)), "2026-01-28T18:37:00Z", &normalizer);
        let resolution = resolver.resolve(&linked).await.unwrap();
        assert_eq!(resolution.outcome, ResolutionOutcome::NotFound);

        let anonymous = identity_keys(&stretch_session(None), "2026-01-28T18:37:00Z", &normalizer);
        let resolution = resolver.resolve(&anonymous).await.unwrap();
        assert!(matches!(resolution.outcome, ResolutionOutcome::UniqueMatch(_)));
    }

    #[tokio::test]
    async fn heuristic_accepts_a_degraded_category() {
        let store = InMemoryStore::new();
        store
            .insert(COLLECTION, stored("2026-01-28T19:37:00+01:00", UNKNOWN, "Evening stretch", None))
            .await;
        let normalizer = TemporalNormalizer::default();
        let keys = identity_keys(&stretch_session(Some(99)), "2026-01-28T18:37:00Z", &normalizer);

        let resolution = IdentityResolver::new(&store, COLLECTION).resolve(&keys).await.unwrap();
        assert!(matches!(resolution.outcome, ResolutionOutcome::UniqueMatch(_)));
    }

    #[tokio::test]
    async fn duplicates_are_ambiguous() {
        let store = InMemoryStore::new();
        for _ in 0..2 {
            store
                .insert(COLLECTION, stored("2026-01-20T08:00:00+01:00", "Running", "Run", Some(99.0)))
                .await;
        }
        let outcome = IdentityResolver::new(&store, COLLECTION)
            .resolve_by_external_id(99)
            .await
            .unwrap();
        match outcome {
            ResolutionOutcome::Ambiguous(ids) => assert_eq!(ids.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }
}
