// outline-backup/src/backup/logic.rs
use crate::config::PostgresConfig;
use crate::report::RunSummary;
use crate::services::Services;
use crate::utils::snapshot::SnapshotLayout;

use super::{bucket_mirror, db_dump};

/// Full backup: databases first, then buckets. Each driver reports its own
/// failures, so the second always runs whatever happened to the first.
pub async fn perform_backup_orchestration(
    services: Services<'_>,
    pg: &PostgresConfig,
    layout: &SnapshotLayout,
) -> RunSummary {
    let db_report = db_dump::backup_databases(
        services.connector,
        services.dump_tool,
        &pg.database_names(),
        layout,
    )
    .await;

    let bucket_report = bucket_mirror::backup_buckets(services.store, layout).await;

    RunSummary {
        snapshot: layout.root().to_path_buf(),
        reports: vec![db_report, bucket_report],
    }
}
