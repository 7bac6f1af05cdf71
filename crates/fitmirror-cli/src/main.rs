use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fitmirror_sync::{report_recent_markdown, SyncConfig, SyncPipeline, SyncVariant};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fitmirror")]
#[command(about = "Mirror Garmin activities, records, steps and sleep into Notion")]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one reconciliation pass and exit non-zero if any record failed.
    Sync {
        /// Restrict the run to these variants (default: all).
        #[arg(long = "only", value_enum)]
        only: Vec<VariantArg>,
        /// Log intended writes without touching the store.
        #[arg(long)]
        dry_run: bool,
        /// Full history instead of the incremental window.
        #[arg(long)]
        all: bool,
    },
    /// Run on the configured cron schedule until interrupted.
    Schedule,
    /// Summarize recent run reports.
    Report {
        #[arg(long, default_value_t = 5)]
        runs: usize,
        #[arg(long, env = "REPORTS_DIR", default_value = "reports")]
        reports_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Activities,
    Records,
    Steps,
    Sleep,
}

impl From<VariantArg> for SyncVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Activities => SyncVariant::Activities,
            VariantArg::Records => SyncVariant::PersonalRecords,
            VariantArg::Steps => SyncVariant::Steps,
            VariantArg::Sleep => SyncVariant::Sleep,
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn sync(only: Vec<VariantArg>, dry_run: bool, all: bool) -> Result<ExitCode> {
    let mut config = SyncConfig::from_env()?;
    config.dry_run |= dry_run;
    config.sync_all |= all;
    let variants: Vec<SyncVariant> = if only.is_empty() {
        SyncVariant::ALL.to_vec()
    } else {
        only.into_iter().map(SyncVariant::from).collect()
    };

    let summary = SyncPipeline::new(config)?.run_once(&variants).await;
    let t = &summary.totals;
    println!(
        "sync complete: run_id={} created={} updated={} unchanged={} skipped={} errors={}{}",
        summary.run_id,
        t.created,
        t.updated,
        t.unchanged,
        t.skipped(),
        t.errors,
        summary
            .reports_dir
            .as_deref()
            .map(|dir| format!(" reports={dir}"))
            .unwrap_or_default()
    );
    Ok(if summary.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn schedule() -> Result<ExitCode> {
    let mut config = SyncConfig::from_env()?;
    config.scheduler_enabled = true;
    let cron = config.sync_cron.clone();
    let pipeline = Arc::new(SyncPipeline::new(config)?);
    let Some(sched) = pipeline.maybe_build_scheduler().await? else {
        return Ok(ExitCode::SUCCESS);
    };
    sched.start().await.context("starting scheduler")?;
    info!(%cron, "scheduler running; ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let command = cli.command.unwrap_or(Commands::Sync {
        only: Vec::new(),
        dry_run: false,
        all: false,
    });
    match command {
        Commands::Sync { only, dry_run, all } => sync(only, dry_run, all).await,
        Commands::Schedule => schedule().await,
        Commands::Report { runs, reports_dir } => {
            println!("{}", report_recent_markdown(runs, &reports_dir)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
