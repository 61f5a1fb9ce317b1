//! Outline Backup/Restore Tool
//!
//! Snapshots the PostgreSQL databases and MinIO buckets behind an Outline
//! deployment into `<backup_dir>/backup_<timestamp>/`, and restores them.

// outline-backup/src/main.rs
mod backup;
mod cli;
mod config;
mod database;
mod errors;
mod report;
mod restore;
mod services;
mod storage;
mod utils;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Action, Cli};
use config::AppConfig;
use report::RunSummary;
use services::LiveServices;

/// Main entry point for the backup/restore tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // failures are reported on the console; only --strict turns them into an exit status
    match run_app(&cli).await {
        Ok(summary) if summary.is_success() => {
            info!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(_) => {
            warn!("⚠️ Operation finished with failures, see above.");
            exit_code(cli.strict)
        }
        Err(e) => {
            error!("❌ Error: {:#}", e);
            exit_code(cli.strict)
        }
    }
}

fn exit_code(strict: bool) -> ExitCode {
    if strict { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_app(cli: &Cli) -> Result<RunSummary> {
    let mut app_config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load application configuration from {}", cli.config.display()))?;
    if let Some(dir) = &cli.backup_dir {
        app_config.backup_root = dir.clone();
    }
    tracing::debug!("Configuration: {:?}", app_config);

    let live = LiveServices::from_config(&app_config).await;

    match cli.action {
        Action::Backup => {
            info!("🚀 Starting Backup Process...");
            backup::run_backup_flow(&app_config, live.services())
                .await
                .context("Backup process failed")
        }
        Action::Restore => {
            info!("🔄 Starting Restore Process...");
            restore::run_restore_flow(&app_config, live.services(), cli.restore_path.clone())
                .await
                .context("Restore process failed")
        }
    }
}
