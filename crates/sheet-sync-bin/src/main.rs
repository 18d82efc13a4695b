//! Sheet Sync - command-line front end for the event spreadsheet reconciler.

mod app;
mod intents;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sheet_sync_config::{init_logging, Config, LogConfig, Paths};
use sheet_sync_reconciler::{EventId, EventStore, SheetSyncClient, SyncPhase, SyncState, UpdateType};
use tokio::io::BufReader;
use tracing::{info, warn};

/// Sheet sync command-line interface.
#[derive(Parser)]
#[command(name = "sheet-sync")]
#[command(about = "Keep event registration spreadsheets in sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.campus-sync
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Data API URL
    #[arg(long, env = "CAMPUS_SYNC_STORE_URL", global = true, hide_env_values = true)]
    store_url: Option<String>,

    /// Data API service key
    #[arg(long, env = "CAMPUS_SYNC_STORE_KEY", global = true, hide_env_values = true)]
    store_key: Option<String>,

    /// Spreadsheet backend URL
    #[arg(long, env = "CAMPUS_SYNC_SHEETS_URL", global = true, hide_env_values = true)]
    sheets_url: Option<String>,

    /// Spreadsheet backend bearer token
    #[arg(long, env = "CAMPUS_SYNC_SHEETS_TOKEN", global = true, hide_env_values = true)]
    sheets_token: Option<String>,

    /// Seconds to wait for the backlog to drain before giving up
    #[arg(long, default_value_t = 120, global = true)]
    drain_timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a sync for one event and wait for it to finish
    Sync {
        event_id: String,
        /// What changed (registration, attendance, payment, manual)
        #[arg(short, long, default_value = "manual")]
        update_type: UpdateType,
    },
    /// Turn automatic syncing on or off for one event
    AutoSync { event_id: String, state: Toggle },
    /// Show the stored sync state of one event
    Status { event_id: String },
    /// Probe the spreadsheet backend
    Health,
    /// Read JSONL intents from stdin until EOF or Ctrl-C
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    event_id: &'a EventId,
    phase: &'static str,
    #[serde(flatten)]
    state: &'a SyncState,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match &cli.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    let config = load_config(&cli, &paths)?;

    init_logging(&LogConfig {
        default_level: config.log_level.clone(),
        log_path: config.log_to_file.then(|| paths.log_file()),
        stderr: true,
    })?;

    let drain_timeout = Duration::from_secs(cli.drain_timeout);
    match cli.command {
        Commands::Sync {
            event_id,
            update_type,
        } => {
            let event_id = EventId::from(event_id);
            let reconciler = app::start_reconciler(&config)?;
            reconciler.request_sync(event_id.clone(), update_type);
            let drained = app::wait_idle(&reconciler, drain_timeout).await;
            let state = reconciler.sync_state(&event_id).await;
            reconciler.shutdown().await;
            drained?;
            print_status(&event_id, &state?)?;
        }
        Commands::AutoSync { event_id, state } => {
            let event_id = EventId::from(event_id);
            let reconciler = app::start_reconciler(&config)?;
            let toggled = reconciler
                .set_auto_sync(event_id.clone(), matches!(state, Toggle::On))
                .await;
            let drained = app::wait_idle(&reconciler, drain_timeout).await;
            let state = reconciler.sync_state(&event_id).await;
            reconciler.shutdown().await;
            toggled?;
            drained?;
            print_status(&event_id, &state?)?;
        }
        Commands::Status { event_id } => {
            let event_id = EventId::from(event_id);
            let store = app::event_store(&config)?;
            let state = store.load_sync_state(&event_id).await?.unwrap_or_default();
            print_status(&event_id, &state)?;
        }
        Commands::Health => {
            let client = app::sheet_client(&config)?;
            if !client.health_check().await {
                bail!("sheet backend is unreachable");
            }
            println!("ok");
        }
        Commands::Watch => run_watch(&config, drain_timeout).await?,
    }

    Ok(())
}

/// Config file, then environment, then flags.
fn load_config(cli: &Cli, paths: &Paths) -> Result<Config> {
    let mut config = Config::load(paths)
        .with_context(|| format!("failed to load {}", paths.config_file().display()))?;

    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(url) = &cli.store_url {
        config.store_url = Some(url.clone());
    }
    if let Some(key) = &cli.store_key {
        config.store_key = Some(key.clone());
    }
    if let Some(url) = &cli.sheets_url {
        config.sheets_url = Some(url.clone());
    }
    if let Some(token) = &cli.sheets_token {
        config.sheets_token = Some(token.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn run_watch(config: &Config, drain_timeout: Duration) -> Result<()> {
    let reconciler = app::start_reconciler(config)?;
    let stdin = BufReader::new(tokio::io::stdin());

    let stats = tokio::select! {
        stats = intents::pump_intents(&reconciler, stdin) => Some(stats?),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, draining backlog");
            None
        }
    };
    if let Some(stats) = stats {
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected,
            "Input closed, draining backlog"
        );
    }

    if let Err(e) = app::wait_idle(&reconciler, drain_timeout).await {
        warn!(error = %format!("{e:#}"), "Shutting down with work pending");
    }
    let status = reconciler.queue_status().await;
    reconciler.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn print_status(event_id: &EventId, state: &SyncState) -> Result<()> {
    let phase: SyncPhase = state.phase();
    let report = StatusReport {
        event_id,
        phase: phase.as_str(),
        state,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
