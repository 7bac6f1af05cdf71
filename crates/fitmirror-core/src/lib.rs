//! Core domain model for fitmirror: feed records, store documents, query
//! filters, and the pure temporal/formatting rules shared by every sync.

pub mod document;
pub mod filter;
pub mod format;
pub mod record;
pub mod schema;
pub mod tables;
pub mod temporal;

use serde::{Deserialize, Serialize};

pub use document::{Icon, Properties, PropertyValue, StoredDocument};
pub use filter::{Condition, Filter};
pub use format::{ActivityCategory, FormattedActivity};
pub use record::{DailySleep, DailySteps, Measurements, PersonalRecord, SourceRecord};
pub use tables::{MappingTables, TableOverrides};
pub use temporal::{LocalDayWindow, TemporalNormalizer};

pub const CRATE_NAME: &str = "fitmirror-core";

/// Upper bound on document ids carried by an ambiguous resolution.
pub const MAX_AMBIGUOUS_IDS: usize = 5;

/// Lookup key derived from a feed record. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdentityKey {
    ExternalId(i64),
    Heuristic {
        window: LocalDayWindow,
        category: String,
        label: String,
    },
}

/// Outcome of looking a record up in the store.
///
/// `Ambiguous` is terminal for the record: nothing is written when more than
/// one document matches.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    NotFound,
    UniqueMatch(StoredDocument),
    Ambiguous(Vec<String>),
}

impl ResolutionOutcome {
    /// Maps a query result onto the zero/one/many outcome.
    pub fn from_matches(mut matches: Vec<StoredDocument>) -> Self {
        match matches.len() {
            0 => Self::NotFound,
            1 => match matches.pop() {
                Some(doc) => Self::UniqueMatch(doc),
                None => Self::NotFound,
            },
            _ => Self::Ambiguous(
                matches
                    .into_iter()
                    .take(MAX_AMBIGUOUS_IDS)
                    .map(|doc| doc.id)
                    .collect(),
            ),
        }
    }
}

/// Per-run tallies. Reset at the start of every run, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCounters {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_collision: usize,
    pub skipped_no_data: usize,
    pub errors: usize,
    pub found_by_id: usize,
    pub found_by_fallback: usize,
}

impl ReconciliationCounters {
    pub fn skipped(&self) -> usize {
        self.skipped_collision + self.skipped_no_data
    }

    pub fn absorb(&mut self, other: &ReconciliationCounters) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped_collision += other.skipped_collision;
        self.skipped_no_data += other.skipped_no_data;
        self.errors += other.errors;
        self.found_by_id += other.found_by_id;
        self.found_by_fallback += other.found_by_fallback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> StoredDocument {
        StoredDocument::new(id, Properties::new())
    }

    #[test]
    fn outcome_from_match_counts() {
        assert_eq!(ResolutionOutcome::from_matches(vec![]), ResolutionOutcome::NotFound);
        assert_eq!(
            ResolutionOutcome::from_matches(vec![doc("a")]),
            ResolutionOutcome::UniqueMatch(doc("a"))
        );
        let many = (0..7).map(|i| doc(&format!("p{i}"))).collect();
        match ResolutionOutcome::from_matches(many) {
            ResolutionOutcome::Ambiguous(ids) => {
                assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4"]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn counters_absorb() {
        let mut total = ReconciliationCounters::default();
        let run = ReconciliationCounters {
            created: 2,
            skipped_collision: 1,
            skipped_no_data: 3,
            errors: 1,
            ..Default::default()
        };
        total.absorb(&run);
        total.absorb(&run);
        assert_eq!(total.created, 4);
        assert_eq!(total.skipped(), 8);
        assert_eq!(total.errors, 2);
    }
}
