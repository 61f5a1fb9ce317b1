// outline-backup/src/backup/db_dump.rs
use tracing::{info, warn};

use crate::database::{AdminConnector, AdminSession, DumpTool};
use crate::report::DriverReport;
use crate::utils::snapshot::SnapshotLayout;

pub const DRIVER: &str = "postgres";

/// Dumps every database of `target_names` that exists on the server into the
/// snapshot's `postgres/` directory. Names the server does not have are skipped.
pub async fn backup_databases(
    connector: &dyn AdminConnector,
    dump_tool: &dyn DumpTool,
    target_names: &[String],
    layout: &SnapshotLayout,
) -> DriverReport {
    info!("=== Backing up PostgreSQL databases ===");
    let report = DriverReport::new(DRIVER);

    let mut session = match connector.connect().await {
        Ok(session) => session,
        Err(e) => return report.abort(e),
    };

    let available = match session.list_databases().await {
        Ok(dbs) => dbs,
        Err(e) => {
            close_session(session).await;
            return report.abort(e);
        }
    };
    info!("Found databases: {}", available.join(", "));

    let report = dump_each(dump_tool, target_names, &available, layout, report).await;

    close_session(session).await;
    info!("PostgreSQL backup pass finished");
    report
}

async fn dump_each(
    dump_tool: &dyn DumpTool,
    target_names: &[String],
    available: &[String],
    layout: &SnapshotLayout,
    mut report: DriverReport,
) -> DriverReport {
    for db_name in target_names {
        if !available.contains(db_name) {
            warn!("⚠️ Database {} does not exist, skipping backup", db_name);
            report.skipped(db_name.as_str());
            continue;
        }

        let dump_file = layout.dump_file(db_name);
        info!("Backing up database: {}", db_name);
        match dump_tool.dump(db_name, &dump_file).await {
            Ok(()) => {
                info!("✓ Backed up {} to {}", db_name, dump_file.display());
                report.completed(db_name.as_str());
            }
            Err(e) => report.failed(db_name.as_str(), format!("{:#}", e)),
        }
    }
    report
}

pub(crate) async fn close_session(session: Box<dyn AdminSession>) {
    if let Err(e) = session.close().await {
        warn!("⚠️ {:#}", e);
    }
}
