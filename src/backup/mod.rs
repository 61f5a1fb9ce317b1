mod logic;
pub(crate) mod bucket_mirror;
pub(crate) mod db_dump;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::AppConfig;
use crate::report::RunSummary;
use crate::services::Services;
use crate::utils::snapshot::{SnapshotLayout, snapshot_timestamp};

/// Public entry point for the backup process: creates a fresh snapshot under
/// the configured backup root and fills it.
pub async fn run_backup_flow(app_config: &AppConfig, services: Services<'_>) -> Result<RunSummary> {
    let layout = SnapshotLayout::for_timestamp(&app_config.backup_root, &snapshot_timestamp());
    layout
        .create()
        .with_context(|| format!("Cannot start backup in {}", app_config.backup_root.display()))?;
    info!("Backup will be saved to: {}", layout.root().display());

    let summary = logic::perform_backup_orchestration(services, &app_config.postgres, &layout).await;

    info!("=== Backup finished ===");
    summary.log();
    info!("Backup saved at: {}", summary.snapshot.display());
    Ok(summary)
}
