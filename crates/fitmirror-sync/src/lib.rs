//! Sync pipeline orchestration: configuration, per-variant runs, reports and
//! the optional cron scheduler.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fitmirror_adapters::{FixtureFeed, GarminFeedConfig, GarminHttpFeed, SourceFeed};
use fitmirror_core::temporal::DEFAULT_DISPLAY_ZONE;
use fitmirror_core::{MappingTables, ReconciliationCounters, TableOverrides, TemporalNormalizer};
use fitmirror_storage::{DocumentStore, HttpClientConfig, NotionClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub mod change;
pub mod daily;
pub mod driver;
pub mod records;
pub mod resolver;
pub mod upsert;

use daily::{DailyKind, DailySync, FULL_HISTORY_DAYS};
use driver::{FetchMode, ReconciliationDriver};
use records::RecordSync;
use upsert::UpsertExecutor;

pub const CRATE_NAME: &str = "fitmirror-sync";
pub const DEFAULT_SYNC_DAYS: i64 = 7;
pub const MAX_SYNC_DAYS: i64 = 36_500;
pub const DEFAULT_SYNC_CRON: &str = "0 0 6 * * *";

#[derive(Debug, Error)]
pub enum TablesError {
    #[error("reading mapping tables {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing mapping tables {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Built-in tables, overlaid with the YAML file at `path` when given.
pub fn load_tables(path: Option<&Path>) -> Result<MappingTables, TablesError> {
    let Some(path) = path else {
        return Ok(MappingTables::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| TablesError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let overrides: TableOverrides = serde_yaml::from_str(&text).map_err(|source| TablesError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(MappingTables::default().with_overrides(overrides))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncVariant {
    Activities,
    PersonalRecords,
    Steps,
    Sleep,
}

impl SyncVariant {
    pub const ALL: [SyncVariant; 4] = [
        SyncVariant::Activities,
        SyncVariant::PersonalRecords,
        SyncVariant::Steps,
        SyncVariant::Sleep,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activities => "activities",
            Self::PersonalRecords => "personal_records",
            Self::Steps => "steps",
            Self::Sleep => "sleep",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub notion_token: String,
    pub activities_db: String,
    pub records_db: Option<String>,
    pub steps_db: Option<String>,
    pub sleep_db: Option<String>,
    pub garmin_access_token: Option<String>,
    pub garmin_display_name: Option<String>,
    pub garmin_fixture_path: Option<PathBuf>,
    pub sync_days: i64,
    pub sync_all: bool,
    pub dry_run: bool,
    pub display_zone: Tz,
    pub tables_path: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub scheduler_enabled: bool,
    pub sync_cron: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True" | "yes"))
        .unwrap_or(false)
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SyncConfig::from_env`] with an arbitrary variable source.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("missing required environment variable {key}"));

        let sync_days = match get("SYNC_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("SYNC_DAYS must be a whole number, got {raw:?}"))?,
            None => DEFAULT_SYNC_DAYS,
        };
        if sync_days > MAX_SYNC_DAYS {
            return Err(anyhow!("SYNC_DAYS must be at most {MAX_SYNC_DAYS}, got {sync_days}"));
        }
        let display_zone = match get("DISPLAY_TIMEZONE") {
            Some(raw) => raw
                .trim()
                .parse::<Tz>()
                .map_err(|err| anyhow!("invalid DISPLAY_TIMEZONE {raw:?}: {err}"))?,
            None => DEFAULT_DISPLAY_ZONE,
        };

        Ok(Self {
            notion_token: required("NOTION_TOKEN")?,
            activities_db: required("NOTION_DB_ID")?,
            records_db: get("NOTION_PR_DB_ID"),
            steps_db: get("NOTION_STEPS_DB_ID"),
            sleep_db: get("NOTION_SLEEP_DB_ID"),
            garmin_access_token: get("GARMIN_ACCESS_TOKEN"),
            garmin_display_name: get("GARMIN_DISPLAY_NAME"),
            garmin_fixture_path: get("GARMIN_FIXTURE_PATH").map(PathBuf::from),
            sync_days: sync_days.max(0),
            sync_all: flag(get("SYNC_ALL")),
            dry_run: flag(get("DRY_RUN")),
            display_zone,
            tables_path: get("FITMIRROR_TABLES").map(PathBuf::from),
            reports_dir: get("REPORTS_DIR").map(PathBuf::from),
            scheduler_enabled: flag(get("FITMIRROR_SCHEDULER_ENABLED")),
            sync_cron: get("SYNC_CRON").unwrap_or_else(|| DEFAULT_SYNC_CRON.to_string()),
            http_timeout_secs: get("FITMIRROR_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(20),
            user_agent: get("FITMIRROR_USER_AGENT").unwrap_or_else(|| "fitmirror/0.1".to_string()),
        })
    }

    pub fn fetch_mode(&self) -> FetchMode {
        if self.sync_all {
            FetchMode::Full
        } else {
            FetchMode::Incremental { days: self.sync_days }
        }
    }

    /// Days walked back by the steps and sleep variants.
    pub fn daily_days(&self) -> i64 {
        if self.sync_all {
            FULL_HISTORY_DAYS
        } else {
            self.sync_days
        }
    }

    pub fn collection_for(&self, variant: SyncVariant) -> Option<&str> {
        match variant {
            SyncVariant::Activities => Some(self.activities_db.as_str()),
            SyncVariant::PersonalRecords => self.records_db.as_deref(),
            SyncVariant::Steps => self.steps_db.as_deref(),
            SyncVariant::Sleep => self.sleep_db.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feed: String,
    pub mode: FetchMode,
    pub dry_run: bool,
    pub variants: BTreeMap<SyncVariant, ReconciliationCounters>,
    pub totals: ReconciliationCounters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports_dir: Option<String>,
}

impl SyncRunSummary {
    pub fn has_errors(&self) -> bool {
        self.totals.errors > 0
    }
}

pub fn build_feed(config: &SyncConfig) -> Result<Arc<dyn SourceFeed>> {
    if let Some(path) = &config.garmin_fixture_path {
        let feed = FixtureFeed::load(path).with_context(|| format!("loading feed fixture {}", path.display()))?;
        return Ok(Arc::new(feed));
    }
    let token = config
        .garmin_access_token
        .clone()
        .ok_or_else(|| anyhow!("GARMIN_ACCESS_TOKEN is required unless GARMIN_FIXTURE_PATH is set"))?;
    let display_name = config
        .garmin_display_name
        .clone()
        .ok_or_else(|| anyhow!("GARMIN_DISPLAY_NAME is required unless GARMIN_FIXTURE_PATH is set"))?;
    let feed_config = GarminFeedConfig {
        timeout: Duration::from_secs(config.http_timeout_secs),
        user_agent: Some(config.user_agent.clone()),
        ..GarminFeedConfig::new(token, display_name)
    };
    Ok(Arc::new(GarminHttpFeed::new(feed_config)?))
}

pub fn build_store(config: &SyncConfig) -> Result<Arc<dyn DocumentStore>> {
    let client = NotionClient::new(
        &config.notion_token,
        HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            ..Default::default()
        },
    )?;
    Ok(Arc::new(client))
}

pub struct SyncPipeline {
    config: SyncConfig,
    store: Arc<dyn DocumentStore>,
    feed: Arc<dyn SourceFeed>,
    tables: MappingTables,
    normalizer: TemporalNormalizer,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let tables = load_tables(config.tables_path.as_deref())?;
        let store = build_store(&config)?;
        let feed = build_feed(&config)?;
        Ok(Self::with_collaborators(config, store, feed, tables))
    }

    pub fn with_collaborators(
        config: SyncConfig,
        store: Arc<dyn DocumentStore>,
        feed: Arc<dyn SourceFeed>,
        tables: MappingTables,
    ) -> Self {
        let normalizer = TemporalNormalizer::new(config.display_zone);
        Self {
            config,
            store,
            feed,
            tables,
            normalizer,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn run_once(&self, variants: &[SyncVariant]) -> SyncRunSummary {
        self.run_once_at(variants, Utc::now()).await
    }

    /// Runs each requested variant in order against the clock `now`. Variants
    /// without a configured collection are skipped with a warning. Failures
    /// only show up in the counters and the log; a report that cannot be
    /// written leaves `reports_dir` unset.
    pub async fn run_once_at(&self, variants: &[SyncVariant], now: DateTime<Utc>) -> SyncRunSummary {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", %run_id, feed = self.feed.feed_id(), dry_run = self.config.dry_run);

        let mut per_variant = BTreeMap::new();
        let mut totals = ReconciliationCounters::default();
        for &variant in variants {
            let Some(counters) = self.run_variant(variant, now).instrument(span.clone()).await else {
                continue;
            };
            totals.absorb(&counters);
            per_variant.insert(variant, counters);
        }

        let mut summary = SyncRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            feed: self.feed.feed_id().to_string(),
            mode: self.config.fetch_mode(),
            dry_run: self.config.dry_run,
            variants: per_variant,
            totals,
            reports_dir: None,
        };
        if let Some(root) = &self.config.reports_dir {
            match write_reports(root, &summary).await {
                Ok(dir) => summary.reports_dir = Some(dir.display().to_string()),
                Err(err) => span.in_scope(|| {
                    error!(root = %root.display(), error = %format!("{err:#}"), "writing run reports failed")
                }),
            }
        }
        span.in_scope(|| {
            info!(
                created = totals.created,
                updated = totals.updated,
                unchanged = totals.unchanged,
                skipped = totals.skipped(),
                errors = totals.errors,
                "sync run finished"
            )
        });
        summary
    }

    async fn run_variant(&self, variant: SyncVariant, now: DateTime<Utc>) -> Option<ReconciliationCounters> {
        let Some(collection) = self.config.collection_for(variant) else {
            warn!(variant = variant.as_str(), "no collection configured; skipping");
            return None;
        };
        let store = self.store.as_ref();
        let feed = self.feed.as_ref();
        let executor = UpsertExecutor::new(store, &self.tables, self.config.dry_run);
        info!(variant = variant.as_str(), collection, "variant started");
        let counters = match variant {
            SyncVariant::Activities => {
                ReconciliationDriver::new(store, &self.tables, self.normalizer, collection, self.config.dry_run)
                    .run(feed, self.config.fetch_mode(), now)
                    .await
            }
            SyncVariant::PersonalRecords => {
                RecordSync::new(store, executor, self.normalizer, collection).run(feed).await
            }
            SyncVariant::Steps | SyncVariant::Sleep => {
                let kind = if variant == SyncVariant::Steps {
                    DailyKind::Steps
                } else {
                    DailyKind::Sleep
                };
                DailySync::new(store, executor, collection, kind)
                    .run(feed, self.normalizer.today(now), self.config.daily_days())
                    .await
            }
        };
        Some(counters)
    }

    /// A scheduler that runs every variant on `SYNC_CRON`, or `None` when
    /// scheduling is disabled. The caller starts it.
    pub async fn maybe_build_scheduler(self: &Arc<Self>) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }

        let sched = JobScheduler::new().await.context("creating scheduler")?;
        let cron = self.config.sync_cron.clone();
        let pipeline = Arc::clone(self);
        let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
            let pipeline = Arc::clone(&pipeline);
            Box::pin(async move {
                let summary = pipeline.run_once(&SyncVariant::ALL).await;
                if summary.has_errors() {
                    error!(run_id = %summary.run_id, errors = summary.totals.errors, "scheduled sync finished with errors");
                } else {
                    info!(run_id = %summary.run_id, "scheduled sync finished");
                }
            })
        })
        .with_context(|| format!("creating scheduler job for cron {cron}"))?;
        sched.add(job).await.context("adding scheduler job")?;
        Ok(Some(sched))
    }
}

pub async fn run_sync_once_from_env(variants: &[SyncVariant]) -> Result<SyncRunSummary> {
    let config = SyncConfig::from_env()?;
    let pipeline = SyncPipeline::new(config)?;
    Ok(pipeline.run_once(variants).await)
}

pub fn brief_markdown(summary: &SyncRunSummary) -> String {
    let mut lines = vec![
        "# fitmirror run brief".to_string(),
        String::new(),
        format!("- Run ID: `{}`", summary.run_id),
        format!("- Started: {}", summary.started_at),
        format!("- Finished: {}", summary.finished_at),
        format!("- Feed: {}", summary.feed),
        format!("- Dry run: {}", summary.dry_run),
        String::new(),
        "| variant | created | updated | unchanged | skipped | errors |".to_string(),
        "|---|---|---|---|---|---|".to_string(),
    ];
    for (variant, c) in &summary.variants {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            variant.as_str(),
            c.created,
            c.updated,
            c.unchanged,
            c.skipped(),
            c.errors
        ));
    }
    let t = &summary.totals;
    lines.push(format!(
        "| **total** | {} | {} | {} | {} | {} |",
        t.created,
        t.updated,
        t.unchanged,
        t.skipped(),
        t.errors
    ));
    lines.push(String::new());
    lines.join("\n")
}

/// Writes `<root>/<run_id>/summary.json` and `run_brief.md`.
pub async fn write_reports(root: &Path, summary: &SyncRunSummary) -> Result<PathBuf> {
    let reports_dir = root.join(summary.run_id.to_string());
    fs::create_dir_all(&reports_dir)
        .await
        .with_context(|| format!("creating {}", reports_dir.display()))?;

    fs::write(reports_dir.join("run_brief.md"), brief_markdown(summary))
        .await
        .context("writing run_brief.md")?;

    let json = serde_json::to_vec_pretty(summary).context("serializing run summary")?;
    fs::write(reports_dir.join("summary.json"), json)
        .await
        .context("writing summary.json")?;

    Ok(reports_dir)
}

/// Markdown digest of the `runs` most recent summaries under `reports_root`,
/// newest first.
pub fn report_recent_markdown(runs: usize, reports_root: &Path) -> Result<String> {
    let mut summaries = Vec::new();
    for entry in std::fs::read_dir(reports_root).with_context(|| format!("reading {}", reports_root.display()))? {
        let entry = entry.with_context(|| format!("listing {}", reports_root.display()))?;
        let path = entry.path().join("summary.json");
        if !path.is_file() {
            continue;
        }
        let summary: SyncRunSummary = serde_json::from_str(
            &std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?,
        )
        .with_context(|| format!("parsing {}", path.display()))?;
        summaries.push(summary);
    }
    summaries.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let mut lines = vec!["# fitmirror recent runs".to_string(), String::new()];
    for summary in summaries.iter().take(runs.max(1)) {
        let t = &summary.totals;
        lines.push(format!("## Run `{}`", summary.run_id));
        lines.push(format!("- started: {}", summary.started_at));
        lines.push(format!(
            "- variants: {}",
            summary
                .variants
                .keys()
                .map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        lines.push(format!(
            "- created {} / updated {} / unchanged {} / skipped {} / errors {}",
            t.created,
            t.updated,
            t.unchanged,
            t.skipped(),
            t.errors
        ));
        if summary.dry_run {
            lines.push("- dry run".to_string());
        }
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;
    use fitmirror_core::schema::{activity, steps};
    use fitmirror_storage::InMemoryStore;

    use super::*;

    const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/garmin/sample-feed.json");

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn base_env<'a>() -> Vec<(&'a str, &'a str)> {
        vec![
            ("NOTION_TOKEN", "secret"),
            ("NOTION_DB_ID", "activities"),
            ("NOTION_PR_DB_ID", "records"),
            ("NOTION_STEPS_DB_ID", "steps"),
            ("NOTION_SLEEP_DB_ID", "sleep"),
            ("GARMIN_FIXTURE_PATH", FIXTURE),
        ]
    }

    fn pipeline(config: SyncConfig, store: Arc<InMemoryStore>) -> SyncPipeline {
        let feed = build_feed(&config).unwrap();
        SyncPipeline::with_collaborators(config, store, feed, MappingTables::default())
    }

    fn sample_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 28, 21, 0, 0).unwrap()
    }

    #[test]
    fn config_defaults_and_required_keys() {
        let config = SyncConfig::from_lookup(env(&base_env())).unwrap();
        assert_eq!(config.sync_days, DEFAULT_SYNC_DAYS);
        assert_eq!(config.display_zone, DEFAULT_DISPLAY_ZONE);
        assert_eq!(config.fetch_mode(), FetchMode::Incremental { days: 7 });
        assert!(!config.dry_run);
        assert_eq!(config.collection_for(SyncVariant::Sleep), Some("sleep"));

        let err = SyncConfig::from_lookup(env(&[("NOTION_TOKEN", "secret")])).unwrap_err();
        assert!(err.to_string().contains("NOTION_DB_ID"));
    }

    #[test]
    fn config_flags_and_zone() {
        let mut vars = base_env();
        vars.extend([
            ("SYNC_ALL", "true"),
            ("DRY_RUN", "1"),
            ("DISPLAY_TIMEZONE", "America/New_York"),
            ("NOTION_PR_DB_ID", ""),
        ]);
        let config = SyncConfig::from_lookup(env(&vars)).unwrap();
        assert_eq!(config.fetch_mode(), FetchMode::Full);
        assert_eq!(config.daily_days(), FULL_HISTORY_DAYS);
        assert!(config.dry_run);
        assert_eq!(config.display_zone, chrono_tz::America::New_York);
        assert_eq!(config.collection_for(SyncVariant::PersonalRecords), None);

        let mut bad = base_env();
        bad.push(("DISPLAY_TIMEZONE", "Mars/Olympus"));
        assert!(SyncConfig::from_lookup(env(&bad)).is_err());

        let mut far = base_env();
        far.push(("SYNC_DAYS", "100000000"));
        let err = SyncConfig::from_lookup(env(&far)).unwrap_err();
        assert!(err.to_string().contains("SYNC_DAYS"));
    }

    #[test]
    fn table_overrides_extend_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.yaml");
        std::fs::write(&path, "category_remap:\n  e_bike_fitness: Cycling\n").unwrap();
        let tables = load_tables(Some(&path)).unwrap();
        assert_eq!(tables.category_remap.get("e_bike_fitness").map(String::as_str), Some("Cycling"));
        assert!(tables.category_remap.len() > 1);

        std::fs::write(&path, "category_remap: [oops").unwrap();
        assert!(matches!(load_tables(Some(&path)), Err(TablesError::Parse { .. })));
        assert!(matches!(
            load_tables(Some(&dir.path().join("missing.yaml"))),
            Err(TablesError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn full_run_over_the_fixture_writes_reports() {
        let reports = tempfile::tempdir().unwrap();
        let reports_path = reports.path().display().to_string();
        let mut vars = base_env();
        vars.push(("REPORTS_DIR", reports_path.as_str()));
        let config = SyncConfig::from_lookup(env(&vars)).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline(config, Arc::clone(&store));

        let summary = pipeline.run_once_at(&SyncVariant::ALL, sample_now()).await;
        assert!(!summary.has_errors(), "{summary:?}");
        assert_eq!(summary.variants[&SyncVariant::Activities].created, 3);
        assert_eq!(summary.variants[&SyncVariant::PersonalRecords].created, 2);
        assert_eq!(summary.variants[&SyncVariant::Steps].created, 1);
        assert_eq!(summary.variants[&SyncVariant::Sleep].created, 1);
        assert_eq!(summary.totals.created, 7);

        let stored = store.documents("activities").await;
        assert!(stored.iter().all(|d| d.number(activity::EXTERNAL_ID).is_some()));
        assert_eq!(store.documents("steps").await[0].date(steps::DATE), Some("2026-01-28"));

        let dir = PathBuf::from(summary.reports_dir.clone().unwrap());
        assert!(dir.join("summary.json").is_file());
        assert!(dir.join("run_brief.md").is_file());
        let digest = report_recent_markdown(5, reports.path()).unwrap();
        assert!(digest.contains(&summary.run_id.to_string()));

        let again = pipeline.run_once_at(&SyncVariant::ALL, sample_now()).await;
        assert_eq!(again.totals.created, 0);
        assert_eq!(again.totals.updated, 0);
        assert_eq!(again.totals.errors, 0);
    }

    #[tokio::test]
    async fn unwritable_reports_keep_the_counters() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let blocker_path = blocker.path().display().to_string();
        let mut vars = base_env();
        vars.push(("REPORTS_DIR", blocker_path.as_str()));
        let config = SyncConfig::from_lookup(env(&vars)).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline(config, Arc::clone(&store));

        let summary = pipeline.run_once_at(&[SyncVariant::Activities], sample_now()).await;
        assert_eq!(summary.totals.created, 3);
        assert!(!summary.has_errors());
        assert!(summary.reports_dir.is_none());
    }

    #[tokio::test]
    async fn dry_run_and_missing_collections() {
        let mut vars: Vec<_> = base_env()
            .into_iter()
            .filter(|(k, _)| *k != "NOTION_SLEEP_DB_ID")
            .collect();
        vars.push(("DRY_RUN", "true"));
        let config = SyncConfig::from_lookup(env(&vars)).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline(config, Arc::clone(&store));

        let summary = pipeline
            .run_once_at(&[SyncVariant::Activities, SyncVariant::Sleep], sample_now())
            .await;
        assert!(summary.dry_run);
        assert!(!summary.variants.contains_key(&SyncVariant::Sleep));
        assert_eq!(store.write_count().await, 0);
        assert!(summary.reports_dir.is_none());
    }

    #[test]
    fn brief_lists_every_variant() {
        let summary = SyncRunSummary {
            run_id: Uuid::nil(),
            started_at: sample_now(),
            finished_at: sample_now(),
            feed: "fixture".into(),
            mode: FetchMode::Full,
            dry_run: false,
            variants: BTreeMap::from([
                (SyncVariant::Activities, ReconciliationCounters { created: 2, ..Default::default() }),
                (SyncVariant::Steps, ReconciliationCounters { errors: 1, ..Default::default() }),
            ]),
            totals: ReconciliationCounters {
                created: 2,
                errors: 1,
                ..Default::default()
            },
            reports_dir: None,
        };
        let brief = brief_markdown(&summary);
        assert!(brief.contains("| activities | 2 | 0 | 0 | 0 | 0 |"));
        assert!(brief.contains("| steps | 0 | 0 | 0 | 0 | 1 |"));
        assert!(summary.has_errors());
    }
}
