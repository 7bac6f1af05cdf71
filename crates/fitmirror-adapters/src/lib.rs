//! Source feed contracts + the Garmin Connect and fixture-file feeds.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use fitmirror_core::{DailySleep, DailySteps, PersonalRecord, SourceRecord};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod fixture;
pub mod garmin;

pub use fixture::{FixtureFeed, FixturePayload};
pub use garmin::{GarminFeedConfig, GarminHttpFeed};

pub const CRATE_NAME: &str = "fitmirror-adapters";

#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed has nothing for the requested day.
    #[error("no data for {0}")]
    NotFound(NaiveDate),
    #[error("feed returned http {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected feed payload: {0}")]
    Decode(String),
}

impl FeedError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A remote, time-ordered feed of activities and daily summaries.
///
/// `fetch_page` returns records newest first; an empty page means the feed is
/// exhausted.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    fn feed_id(&self) -> &'static str;

    async fn fetch_page(&self, offset: usize, page_size: usize) -> Result<Vec<SourceRecord>, FeedError>;

    async fn fetch_steps(&self, date: NaiveDate) -> Result<DailySteps, FeedError>;

    async fn fetch_sleep(&self, date: NaiveDate) -> Result<DailySleep, FeedError>;

    async fn fetch_personal_records(&self) -> Result<Vec<PersonalRecord>, FeedError>;
}

pub fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}
