//! Personal records: one current row per record name, superseded rows keep
//! their history with the `PR` flag cleared.

use std::cmp::Ordering;

use fitmirror_adapters::SourceFeed;
use fitmirror_core::format::{format_record_value, title_case};
use fitmirror_core::schema::records as prop;
use fitmirror_core::tables::{record_emoji, record_name, IGNORED_RECORD_TYPE};
use fitmirror_core::temporal::parse_utc;
use fitmirror_core::{
    Condition, Filter, Icon, PersonalRecord, Properties, PropertyValue, ReconciliationCounters,
    ResolutionOutcome, TemporalNormalizer,
};
use fitmirror_storage::{DocumentStore, StoreError};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::upsert::{UpsertExecutor, WriteTarget};

pub const DEFAULT_RECORD_ACTIVITY: &str = "Walking";

/// A feed record with its destination fields resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRecord {
    pub name: &'static str,
    pub type_id: i64,
    pub activity_type: String,
    pub date: Option<String>,
    pub value: String,
    pub pace: String,
}

impl FormattedRecord {
    pub fn new(record: &PersonalRecord, normalizer: &TemporalNormalizer) -> Self {
        let activity_type = record
            .activity_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_RECORD_ACTIVITY);
        let (value, pace) = format_record_value(record.value, record.type_id);
        Self {
            name: record_name(record.type_id),
            type_id: record.type_id,
            activity_type: title_case(&activity_type.replace('_', " ")),
            date: record
                .start_time_formatted
                .as_deref()
                .map(|raw| normalizer.to_local_string(raw)),
            value,
            pace,
        }
    }

    pub fn properties(&self) -> Properties {
        Properties::from([
            (prop::TITLE.to_string(), PropertyValue::Title(self.name.to_string())),
            (prop::DATE.to_string(), PropertyValue::Date(self.date.clone())),
            (prop::CATEGORY.to_string(), PropertyValue::Select(Some(self.activity_type.clone()))),
            (prop::TYPE_ID.to_string(), PropertyValue::Number(Some(self.type_id as f64))),
            (prop::CURRENT.to_string(), PropertyValue::Checkbox(true)),
            (prop::VALUE.to_string(), PropertyValue::RichText(self.value.clone())),
            (prop::PACE.to_string(), PropertyValue::RichText(self.pace.clone())),
        ])
    }

    pub fn icon(&self) -> Icon {
        Icon::Emoji(record_emoji(self.name).to_string())
    }
}

/// True when `incoming` is strictly later than `stored`. Instants are
/// compared when both parse; otherwise the raw strings are.
pub fn supersedes(incoming: Option<&str>, stored: Option<&str>) -> bool {
    let Some(incoming) = incoming else {
        return false;
    };
    let Some(stored) = stored else {
        return true;
    };
    let ordering = match (parse_utc(incoming), parse_utc(stored)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => incoming.cmp(stored),
    };
    ordering == Ordering::Greater
}

pub fn current_record_filter(name: &str) -> Filter {
    Filter::And(vec![
        Filter::property(prop::TITLE, Condition::TitleEquals(name.to_string())),
        Filter::property(prop::CURRENT, Condition::CheckboxEquals(true)),
    ])
}

enum RecordOutcome {
    Created,
    Replaced,
    Unchanged,
    Collision,
}

pub struct RecordSync<'a> {
    store: &'a dyn DocumentStore,
    executor: UpsertExecutor<'a>,
    normalizer: TemporalNormalizer,
    collection: &'a str,
}

impl<'a> RecordSync<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        executor: UpsertExecutor<'a>,
        normalizer: TemporalNormalizer,
        collection: &'a str,
    ) -> Self {
        Self {
            store,
            executor,
            normalizer,
            collection,
        }
    }

    pub async fn run(&self, feed: &dyn SourceFeed) -> ReconciliationCounters {
        let mut counters = ReconciliationCounters::default();
        let records = match feed.fetch_personal_records().await {
            Ok(records) => records,
            Err(err) => {
                error!(feed = feed.feed_id(), error = %err, "personal record fetch failed");
                counters.errors += 1;
                return counters;
            }
        };

        for record in records.iter().filter(|r| r.type_id != IGNORED_RECORD_TYPE) {
            let formatted = FormattedRecord::new(record, &self.normalizer);
            let span = info_span!("record_sync", record = formatted.name, type_id = record.type_id);
            match self.sync_record(&formatted).instrument(span).await {
                Ok(RecordOutcome::Created | RecordOutcome::Replaced) => counters.created += 1,
                Ok(RecordOutcome::Unchanged) => counters.unchanged += 1,
                Ok(RecordOutcome::Collision) => counters.skipped_collision += 1,
                Err(err) => {
                    error!(record = formatted.name, error = %err, "personal record sync failed");
                    counters.errors += 1;
                }
            }
        }
        info!(?counters, "personal record sync finished");
        counters
    }

    async fn sync_record(&self, record: &FormattedRecord) -> Result<RecordOutcome, StoreError> {
        let matches = self
            .store
            .query(self.collection, &current_record_filter(record.name))
            .await?;
        let create = WriteTarget::Create {
            collection: self.collection,
        };
        match ResolutionOutcome::from_matches(matches) {
            ResolutionOutcome::NotFound => {
                self.executor.write(create, &record.properties(), Some(&record.icon())).await?;
                info!("created");
                Ok(RecordOutcome::Created)
            }
            ResolutionOutcome::Ambiguous(ids) => {
                warn!(?ids, "several current rows; skipping");
                Ok(RecordOutcome::Collision)
            }
            ResolutionOutcome::UniqueMatch(existing) => {
                if !supersedes(record.date.as_deref(), existing.date(prop::DATE)) {
                    debug!("current row is up to date");
                    return Ok(RecordOutcome::Unchanged);
                }
                let retire = Properties::from([(prop::CURRENT.to_string(), PropertyValue::Checkbox(false))]);
                self.executor
                    .write(WriteTarget::Update { document_id: &existing.id }, &retire, None)
                    .await?;
                self.executor.write(create, &record.properties(), Some(&record.icon())).await?;
                info!(previous = %existing.id, "new personal record");
                Ok(RecordOutcome::Replaced)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fitmirror_adapters::garmin::RawPersonalRecord;
    use fitmirror_adapters::{FixtureFeed, FixturePayload};
    use fitmirror_core::MappingTables;
    use fitmirror_storage::{InMemoryStore, StoreCall};

    use super::*;

    const COLLECTION: &str = "records";

    fn raw(type_id: i64, value: f64, start: &str) -> RawPersonalRecord {
        RawPersonalRecord {
            type_id,
            activity_type: Some("running".into()),
            value: Some(value),
            pr_start_time_gmt_formatted: Some(start.into()),
        }
    }

    fn feed(records: Vec<RawPersonalRecord>) -> FixtureFeed {
        FixtureFeed::new(FixturePayload {
            personal_records: records,
            ..Default::default()
        })
    }

    #[test]
    fn formatting_defaults_to_walking() {
        let normalizer = TemporalNormalizer::default();
        let record = PersonalRecord {
            type_id: 12,
            activity_type: None,
            value: 31_204.0,
            start_time_formatted: Some("2025-06-01T10:00:00.0".into()),
        };
        let formatted = FormattedRecord::new(&record, &normalizer);
        assert_eq!(formatted.name, "Most Steps in a Day");
        assert_eq!(formatted.activity_type, "Walking");
        assert_eq!(formatted.value, "31,204");
        assert_eq!(formatted.date.as_deref(), Some("2025-06-01T12:00:00+02:00"));

        let record = PersonalRecord {
            activity_type: Some("trail_running".into()),
            ..record
        };
        assert_eq!(FormattedRecord::new(&record, &normalizer).activity_type, "Trail Running");
    }

    #[test]
    fn later_instants_supersede() {
        assert!(supersedes(Some("2025-06-02T08:00:00+02:00"), Some("2025-06-01T08:00:00+02:00")));
        assert!(!supersedes(Some("2025-06-01T08:00:00+02:00"), Some("2025-06-01T06:00:00Z")));
        assert!(!supersedes(None, Some("2025-06-01")));
        assert!(supersedes(Some("2025-06-01"), None));
    }

    #[tokio::test]
    async fn creates_current_rows_and_ignores_type_16() {
        let store = InMemoryStore::new();
        let tables = MappingTables::default();
        let sync = RecordSync::new(
            &store,
            UpsertExecutor::new(&store, &tables, false),
            TemporalNormalizer::default(),
            COLLECTION,
        );
        let feed = feed(vec![raw(3, 1_500.0, "2025-06-01T07:00:00.0"), raw(16, 1.0, "2025-06-01T07:00:00.0")]);

        let counters = sync.run(&feed).await;
        assert_eq!(counters.created, 1);
        assert_eq!(counters.errors, 0);

        let docs = store.documents(COLLECTION).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text(prop::VALUE), "25:00");
        assert_eq!(docs[0].text(prop::PACE), "5:00 /km");
        assert!(docs[0].checkbox(prop::CURRENT));
        match &store.calls().await[0] {
            StoreCall::Create { icon, .. } => assert_eq!(icon, &Some(Icon::Emoji(record_emoji("5K").into()))),
            other => panic!("unexpected call {other:?}"),
        }

        let again = sync.run(&feed).await;
        assert_eq!(again.unchanged, 1);
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn newer_record_retires_the_previous_row() {
        let store = InMemoryStore::new();
        let tables = MappingTables::default();
        let sync = RecordSync::new(
            &store,
            UpsertExecutor::new(&store, &tables, false),
            TemporalNormalizer::default(),
            COLLECTION,
        );
        sync.run(&feed(vec![raw(3, 1_500.0, "2025-06-01T07:00:00.0")])).await;

        let counters = sync.run(&feed(vec![raw(3, 1_450.0, "2025-09-14T07:00:00.0")])).await;
        assert_eq!(counters.created, 1);

        let docs = store.documents(COLLECTION).await;
        assert_eq!(docs.len(), 2);
        let current: Vec<_> = docs.iter().filter(|d| d.checkbox(prop::CURRENT)).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].text(prop::VALUE), "24:10");
    }

    #[tokio::test]
    async fn duplicate_current_rows_are_skipped() {
        let store = InMemoryStore::new();
        let tables = MappingTables::default();
        for _ in 0..2 {
            store
                .insert(
                    COLLECTION,
                    Properties::from([
                        (prop::TITLE.to_string(), PropertyValue::Title("5K".into())),
                        (prop::CURRENT.to_string(), PropertyValue::Checkbox(true)),
                    ]),
                )
                .await;
        }
        let sync = RecordSync::new(
            &store,
            UpsertExecutor::new(&store, &tables, false),
            TemporalNormalizer::default(),
            COLLECTION,
        );

        let counters = sync.run(&feed(vec![raw(3, 1_450.0, "2025-09-14T07:00:00.0")])).await;
        assert_eq!(counters.skipped_collision, 1);
        assert_eq!(store.write_count().await, 0);
    }
}
