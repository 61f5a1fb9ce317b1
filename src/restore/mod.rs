mod logic;
pub(crate) mod bucket_restore;
pub(crate) mod db_restore;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::AppConfig;
use crate::report::RunSummary;
use crate::services::Services;
use crate::utils::snapshot::SnapshotSelector;

/// Public entry point for the restore process. Without an explicit snapshot
/// the most recent one under the backup root is used.
pub async fn run_restore_flow(
    app_config: &AppConfig,
    services: Services<'_>,
    snapshot: Option<PathBuf>,
) -> Result<RunSummary> {
    let selector = match snapshot {
        Some(path) => SnapshotSelector::exact(path),
        None => SnapshotSelector::latest_in(&app_config.backup_root),
    };
    let layout = selector.resolve().context("No backup found, cannot restore")?;
    info!("Restoring from: {}", layout.root().display());

    let summary = logic::perform_restore_orchestration(services, &app_config.postgres, &layout).await;

    info!("=== Restore finished ===");
    summary.log();
    info!("Restored data from: {}", summary.snapshot.display());
    info!("Check restored buckets for a nested <bucket>/<bucket>/ layout before putting the service back in use");
    Ok(summary)
}
