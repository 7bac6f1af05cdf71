//! Fetch → resolve → decide → upsert → tally, one record at a time.

use chrono::{DateTime, Duration, Utc};
use fitmirror_adapters::SourceFeed;
use fitmirror_core::{
    FormattedActivity, IdentityKey, MappingTables, ReconciliationCounters, ResolutionOutcome, SourceRecord,
    TemporalNormalizer,
};
use fitmirror_storage::DocumentStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::change::first_difference;
use crate::resolver::{identity_keys, IdentityResolver};
use crate::upsert::{UpsertExecutor, WriteOutcome, WriteTarget};

pub const INCREMENTAL_PAGE_SIZE: usize = 100;
pub const FULL_PAGE_SIZE: usize = 200;
pub const FULL_RECORD_CAP: usize = 10_000;
/// Extra days fetched behind the incremental cutoff.
pub const OVERLAP_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum FetchMode {
    Incremental { days: i64 },
    Full,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedBatch {
    pub records: Vec<SourceRecord>,
    pub truncated: bool,
    /// Page fetches that failed; paging stops at the first one.
    pub feed_errors: usize,
}

/// Oldest start time an incremental fetch keeps. `None` when the window
/// reaches past the representable range, which leaves the fetch uncut.
pub fn incremental_cutoff(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    days.max(0)
        .checked_add(OVERLAP_DAYS)
        .and_then(Duration::try_days)
        .and_then(|span| now.checked_sub_signed(span))
}

pub async fn fetch_records(feed: &dyn SourceFeed, mode: FetchMode, now: DateTime<Utc>) -> FetchedBatch {
    let mut batch = FetchedBatch::default();
    let (page_size, cutoff) = match mode {
        FetchMode::Incremental { days } => (INCREMENTAL_PAGE_SIZE, incremental_cutoff(now, days)),
        FetchMode::Full => (FULL_PAGE_SIZE, None),
    };

    let mut offset = 0usize;
    loop {
        let page = match feed.fetch_page(offset, page_size).await {
            Ok(page) => page,
            Err(err) => {
                error!(feed = feed.feed_id(), offset, error = %err, "activity page fetch failed");
                batch.feed_errors += 1;
                break;
            }
        };
        if page.is_empty() {
            break;
        }
        offset += page.len();

        let mut reached_cutoff = false;
        for record in page {
            if let (Some(cutoff), Some(start)) = (cutoff, fitmirror_core::temporal::parse_utc(&record.start_time_gmt)) {
                if start < cutoff {
                    reached_cutoff = true;
                    continue;
                }
            }
            batch.records.push(record);
        }

        if reached_cutoff {
            debug!(offset, "reached incremental cutoff");
            break;
        }
        if cutoff.is_none() && batch.records.len() >= FULL_RECORD_CAP {
            batch.records.truncate(FULL_RECORD_CAP);
            batch.truncated = true;
            warn!(cap = FULL_RECORD_CAP, "full fetch truncated at record cap");
            break;
        }
    }
    batch
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    ExternalId,
    Heuristic,
}

impl MatchTier {
    fn of(key: &IdentityKey) -> Self {
        match key {
            IdentityKey::ExternalId(_) => Self::ExternalId,
            IdentityKey::Heuristic { .. } => Self::Heuristic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Unchanged,
    SkippedCollision,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordReport {
    pub outcome: RecordOutcome,
    pub tier: Option<MatchTier>,
}

impl RecordReport {
    fn new(outcome: RecordOutcome, tier: Option<MatchTier>) -> Self {
        Self { outcome, tier }
    }

    pub fn tally(&self, counters: &mut ReconciliationCounters) {
        match self.outcome {
            RecordOutcome::Created => counters.created += 1,
            RecordOutcome::Updated => counters.updated += 1,
            RecordOutcome::Unchanged => counters.unchanged += 1,
            RecordOutcome::SkippedCollision => counters.skipped_collision += 1,
            RecordOutcome::Failed => counters.errors += 1,
        }
        if matches!(self.outcome, RecordOutcome::Updated | RecordOutcome::Unchanged) {
            match self.tier {
                Some(MatchTier::ExternalId) => counters.found_by_id += 1,
                Some(MatchTier::Heuristic) => counters.found_by_fallback += 1,
                None => {}
            }
        }
    }
}

pub struct ReconciliationDriver<'a> {
    store: &'a dyn DocumentStore,
    tables: &'a MappingTables,
    normalizer: TemporalNormalizer,
    collection: &'a str,
    dry_run: bool,
}

impl<'a> ReconciliationDriver<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        tables: &'a MappingTables,
        normalizer: TemporalNormalizer,
        collection: &'a str,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            tables,
            normalizer,
            collection,
            dry_run,
        }
    }

    /// Fetches according to `mode` and reconciles every record. Never fails:
    /// feed and store errors are tallied.
    pub async fn run(&self, feed: &dyn SourceFeed, mode: FetchMode, now: DateTime<Utc>) -> ReconciliationCounters {
        let batch = fetch_records(feed, mode, now).await;
        info!(
            fetched = batch.records.len(),
            truncated = batch.truncated,
            ?mode,
            "activities fetched"
        );
        let mut counters = self.reconcile(&batch.records).await;
        counters.errors += batch.feed_errors;
        counters
    }

    pub async fn reconcile(&self, records: &[SourceRecord]) -> ReconciliationCounters {
        let mut counters = ReconciliationCounters::default();
        for record in records {
            self.reconcile_record(record).await.tally(&mut counters);
        }
        counters
    }

    pub async fn reconcile_record(&self, record: &SourceRecord) -> RecordReport {
        let span = info_span!(
            "reconcile_record",
            external_id = ?record.external_id,
            start = %record.start_time_gmt
        );
        self.reconcile_inner(record).instrument(span).await
    }

    async fn reconcile_inner(&self, record: &SourceRecord) -> RecordReport {
        let activity = FormattedActivity::new(record, self.tables);
        let local_start = self.normalizer.to_local_string(&record.start_time_gmt);
        let keys = identity_keys(&activity, &record.start_time_gmt, &self.normalizer);
        let resolver = IdentityResolver::new(self.store, self.collection);
        let executor = UpsertExecutor::new(self.store, self.tables, self.dry_run);

        let resolution = match resolver.resolve(&keys).await {
            Ok(resolution) => resolution,
            Err(err) => {
                error!(name = %activity.name, error = %err, "identity lookup failed");
                return RecordReport::new(RecordOutcome::Failed, None);
            }
        };
        let tier = resolution.matched_by.as_ref().map(MatchTier::of);

        match resolution.outcome {
            ResolutionOutcome::NotFound => {
                let target = WriteTarget::Create {
                    collection: self.collection,
                };
                match executor.write_activity(target, &activity, &local_start).await {
                    Ok(outcome) => {
                        log_write("created", &activity, &outcome);
                        RecordReport::new(RecordOutcome::Created, None)
                    }
                    Err(err) => {
                        error!(name = %activity.name, error = %err, "create failed");
                        RecordReport::new(RecordOutcome::Failed, None)
                    }
                }
            }
            ResolutionOutcome::UniqueMatch(doc) => {
                let Some(field) = first_difference(&doc, &activity) else {
                    debug!(name = %activity.name, document_id = %doc.id, "unchanged");
                    return RecordReport::new(RecordOutcome::Unchanged, tier);
                };
                debug!(name = %activity.name, document_id = %doc.id, field, "stored document is stale");
                let target = WriteTarget::Update { document_id: &doc.id };
                match executor.write_activity(target, &activity, &local_start).await {
                    Ok(outcome) => {
                        log_write("updated", &activity, &outcome);
                        RecordReport::new(RecordOutcome::Updated, tier)
                    }
                    Err(err) => {
                        error!(name = %activity.name, document_id = %doc.id, error = %err, "update failed");
                        RecordReport::new(RecordOutcome::Failed, tier)
                    }
                }
            }
            ResolutionOutcome::Ambiguous(ids) => {
                warn!(
                    name = %activity.name,
                    ?tier,
                    candidates = ?ids,
                    "ambiguous match; skipping without writing"
                );
                RecordReport::new(RecordOutcome::SkippedCollision, tier)
            }
        }
    }
}

fn log_write(action: &str, activity: &FormattedActivity, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Written(doc) => {
            info!(name = %activity.name, category = %activity.category, document_id = %doc.id, "{action}")
        }
        WriteOutcome::Degraded(doc) => {
            warn!(name = %activity.name, document_id = %doc.id, "{action} with Unknown category")
        }
        WriteOutcome::DryRun => info!(name = %activity.name, "{action} (dry run)"),
    }
}
