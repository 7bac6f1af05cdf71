//! Document store contract + the Notion HTTP client and an in-memory store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use fitmirror_core::{Filter, Icon, Properties, StoredDocument};
use thiserror::Error;
use tokio::sync::Mutex;

pub mod memory;
pub mod notion;

pub use memory::{InMemoryStore, StoreCall};
pub use notion::NotionClient;

pub const CRATE_NAME: &str = "fitmirror-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused a select value it does not recognize.
    #[error("schema validation rejected the write: {message}")]
    SchemaValidation { message: String },
    #[error("store returned http {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_schema_validation(&self) -> bool {
        matches!(self, Self::SchemaValidation { .. })
    }
}

/// A collection-oriented document store.
///
/// Mutating calls surface a select-option rejection as
/// [`StoreError::SchemaValidation`] so callers can retry with safe values.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError>;

    async fn create(
        &self,
        collection: &str,
        properties: &Properties,
        icon: Option<&Icon>,
    ) -> Result<StoredDocument, StoreError>;

    async fn update(
        &self,
        document_id: &str,
        properties: &Properties,
        icon: Option<&Icon>,
    ) -> Result<StoredDocument, StoreError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub pacing: Option<PacingConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            api_version: "2022-06-28".to_string(),
            timeout: Duration::from_secs(20),
            user_agent: None,
            pacing: Some(PacingConfig::default()),
        }
    }
}

/// Token bucket settings. The default keeps under Notion's average of three
/// requests per second.
#[derive(Debug, Clone, Copy)]
pub struct PacingConfig {
    pub capacity: u32,
    pub refill_every: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            refill_every: Duration::from_millis(334),
        }
    }
}

/// Spaces outbound requests; callers wait for a token instead of failing.
#[derive(Debug)]
pub struct RequestPacer {
    capacity: u32,
    refill_every: Duration,
    state: Mutex<PacerState>,
}

#[derive(Debug, Clone, Copy)]
struct PacerState {
    tokens: u32,
    last_refill: Instant,
}

impl PacerState {
    /// Credits every whole interval since `last_refill` and takes a token.
    /// The unfinished interval carries over. Returns the wait until the next
    /// token when the bucket is empty. A zero interval never waits.
    fn take(&mut self, capacity: u32, refill_every: Duration, now: Instant) -> Option<Duration> {
        if refill_every.is_zero() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.last_refill);
        let refills = (elapsed.as_nanos() / refill_every.as_nanos()).min(u128::from(capacity)) as u32;
        if refills > 0 {
            self.tokens = self.tokens.saturating_add(refills).min(capacity);
            self.last_refill = if self.tokens == capacity {
                now
            } else {
                self.last_refill + refill_every * refills
            };
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            return None;
        }
        let next = self.last_refill + refill_every;
        Some(next.saturating_duration_since(now).max(Duration::from_millis(1)))
    }
}

impl RequestPacer {
    pub fn new(config: PacingConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            capacity,
            refill_every: config.refill_every,
            state: Mutex::new(PacerState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                state.take(self.capacity, self.refill_every, Instant::now())
            };
            match wait {
                Some(wait) => tokio::time::sleep(wait).await,
                None => return,
            }
        }
    }
}
