// outline-backup/src/restore/logic.rs
use crate::config::PostgresConfig;
use crate::report::RunSummary;
use crate::services::Services;
use crate::utils::snapshot::{SnapshotLayout, SnapshotSelector};

use super::{bucket_restore, db_restore};

/// Full restore from an already resolved snapshot: databases, then buckets,
/// with the same failure isolation as the backup.
pub async fn perform_restore_orchestration(
    services: Services<'_>,
    pg: &PostgresConfig,
    layout: &SnapshotLayout,
) -> RunSummary {
    let selector = SnapshotSelector::exact(layout.root());

    let db_report = db_restore::restore_databases(services.connector, services.dump_tool, pg, &selector).await;
    let bucket_report = bucket_restore::restore_buckets(services.store, &selector).await;

    RunSummary {
        snapshot: layout.root().to_path_buf(),
        reports: vec![db_report, bucket_report],
    }
}
