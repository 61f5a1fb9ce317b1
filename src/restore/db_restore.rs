// outline-backup/src/restore/db_restore.rs
use std::collections::HashSet;
use tracing::{info, warn};

use crate::backup::db_dump::close_session;
use crate::config::PostgresConfig;
use crate::database::{AdminConnector, AdminSession, DumpTool};
use crate::report::DriverReport;
use crate::utils::snapshot::{SnapshotLayout, SnapshotSelector};

pub const DRIVER: &str = "postgres";

/// Drops, recreates and replays every database of the target set.
///
/// Stages run strictly in order: drop all, ensure roles, create databases,
/// replay dumps. Nothing is rolled back; a failed stage leaves the server
/// partially restored and the run must be repeated.
pub async fn restore_databases(
    connector: &dyn AdminConnector,
    dump_tool: &dyn DumpTool,
    pg: &PostgresConfig,
    selector: &SnapshotSelector,
) -> DriverReport {
    info!("=== Restoring PostgreSQL databases ===");
    let mut report = DriverReport::new(DRIVER);

    let layout = match selector.resolve() {
        Ok(layout) => layout,
        Err(e) => return report.abort(format!("{:#}, cannot restore PostgreSQL databases", e)),
    };
    let postgres_dir = layout.postgres_dir();
    if !postgres_dir.is_dir() {
        return report.abort(format!(
            "PostgreSQL backup directory does not exist: {}",
            postgres_dir.display()
        ));
    }

    let mut session = match connector.connect().await {
        Ok(session) => session,
        Err(e) => return report.abort(e),
    };

    info!("Dropping existing databases...");
    drop_databases(session.as_mut(), pg, &mut report).await;

    info!("Creating roles and databases...");
    ensure_roles(session.as_mut(), pg, &mut report).await;
    let created = create_databases(session.as_mut(), pg, &mut report).await;
    elevate_roles(session.as_mut(), pg, &mut report).await;

    close_session(session).await;

    replay_dumps(dump_tool, pg, &layout, &created, &mut report).await;
    info!("PostgreSQL restore pass finished");
    report
}

async fn drop_databases(session: &mut dyn AdminSession, pg: &PostgresConfig, report: &mut DriverReport) {
    for db in &pg.databases {
        if let Err(e) = session.terminate_connections(&db.name).await {
            warn!("⚠️ {:#}", e);
        }
        match session.drop_database(&db.name).await {
            Ok(()) => info!("Dropped database: {}", db.name),
            Err(e) => report.failed(db.name.as_str(), format!("{:#}", e)),
        }
    }
}

/// Check-then-create: `CREATE ROLE` has no `IF NOT EXISTS`. Safe only while runs are sequential.
async fn ensure_roles(session: &mut dyn AdminSession, pg: &PostgresConfig, report: &mut DriverReport) {
    for role in &pg.roles {
        let resource = format!("role {}", role.name);
        match session.role_exists(&role.name).await {
            Ok(true) => info!("Role {} already exists", role.name),
            Ok(false) => match session.create_role(role).await {
                Ok(()) => info!("Created role: {}", role.name),
                Err(e) => report.failed(resource, format!("{:#}", e)),
            },
            Err(e) => report.failed(resource, format!("{:#}", e)),
        }
    }
}

async fn create_databases(
    session: &mut dyn AdminSession,
    pg: &PostgresConfig,
    report: &mut DriverReport,
) -> HashSet<String> {
    let mut created = HashSet::new();
    for db in &pg.databases {
        match session.create_database(&db.name, &db.owner).await {
            Ok(()) => {
                info!("Created database {} owned by {}", db.name, db.owner);
                created.insert(db.name.clone());
            }
            Err(e) => report.failed(db.name.as_str(), format!("{:#}", e)),
        }
    }
    created
}

async fn elevate_roles(session: &mut dyn AdminSession, pg: &PostgresConfig, report: &mut DriverReport) {
    for role in pg.roles.iter().filter(|r| r.superuser) {
        warn!(
            "⚠️ Granting SUPERUSER to role '{}'. This gives the application full control of the server; revoke it once the application no longer needs it.",
            role.name
        );
        if let Err(e) = session.grant_superuser(&role.name).await {
            report.failed(format!("role {}", role.name), format!("{:#}", e));
        }
    }
}

async fn replay_dumps(
    dump_tool: &dyn DumpTool,
    pg: &PostgresConfig,
    layout: &SnapshotLayout,
    created: &HashSet<String>,
    report: &mut DriverReport,
) {
    for db in &pg.databases {
        let dump_file = layout.dump_file(&db.name);
        if !dump_file.is_file() {
            warn!("⚠️ No backup file found for {}", db.name);
            report.skipped(db.name.as_str());
            continue;
        }
        if !created.contains(&db.name) {
            // replaying into a database that was not recreated would duplicate its contents
            warn!("⚠️ Not replaying {}: the database was not recreated", db.name);
            report.skipped(db.name.as_str());
            continue;
        }

        info!("Restoring database: {}", db.name);
        match dump_tool.restore(&db.name, &dump_file).await {
            Ok(()) => {
                info!("✓ Restored database {}", db.name);
                report.completed(db.name.as_str());
            }
            Err(e) => report.failed(db.name.as_str(), format!("{:#}", e)),
        }
    }
}
