// outline-backup/src/database/mod.rs
pub(crate) mod admin;
pub(crate) mod tools;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::config::RoleSpec;

pub use admin::PgAdminConnector;
pub use tools::PgClientTools;

/// Opens administrative sessions against the server's maintenance database.
#[async_trait]
pub trait AdminConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn AdminSession>>;
}

/// An autocommit administrative session. Every statement runs outside a
/// transaction block, which `CREATE/DROP DATABASE` require.
#[async_trait]
pub trait AdminSession: Send {
    /// Names of all non-template databases.
    async fn list_databases(&mut self) -> Result<Vec<String>>;

    /// Terminates other sessions connected to `name`.
    async fn terminate_connections(&mut self, name: &str) -> Result<()>;

    /// `DROP DATABASE IF EXISTS`.
    async fn drop_database(&mut self, name: &str) -> Result<()>;

    async fn role_exists(&mut self, name: &str) -> Result<bool>;

    async fn create_role(&mut self, role: &RoleSpec) -> Result<()>;

    async fn create_database(&mut self, name: &str, owner: &str) -> Result<()>;

    async fn grant_superuser(&mut self, role: &str) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// The external dump and replay utilities.
#[async_trait]
pub trait DumpTool: Send + Sync {
    /// Writes a full logical dump of `database` to `output`.
    async fn dump(&self, database: &str, output: &Path) -> Result<()>;

    /// Replays the dump at `input` into `database`.
    async fn restore(&self, database: &str, input: &Path) -> Result<()>;
}
