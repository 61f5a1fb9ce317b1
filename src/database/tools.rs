// outline-backup/src/database/tools.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use super::DumpTool;
use crate::config::PostgresConfig;
use crate::errors::AppError;
use crate::utils::{find_pg_dump_executable, find_psql_executable};

/// `pg_dump` and `psql` invoked with the admin connection parameters.
/// The password travels in `PGPASSWORD`, never on the command line.
pub struct PgClientTools {
    host: String,
    port: u16,
    user: String,
    password: String,
    stop_on_error: bool,
    /// Overrides for the client binaries; looked up on `PATH` when unset.
    pg_dump: Option<PathBuf>,
    psql: Option<PathBuf>,
}

impl PgClientTools {
    pub fn new(config: &PostgresConfig) -> Self {
        PgClientTools {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
            stop_on_error: config.stop_on_error,
            pg_dump: None,
            psql: None,
        }
    }

    fn pg_dump_path(&self) -> Result<PathBuf> {
        match &self.pg_dump {
            Some(path) => Ok(path.clone()),
            None => find_pg_dump_executable(),
        }
    }

    fn psql_path(&self) -> Result<PathBuf> {
        match &self.psql {
            Some(path) => Ok(path.clone()),
            None => find_psql_executable(),
        }
    }

    fn base_command(&self, program: &Path, database: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.arg("-h")
            .arg(&self.host)
            .arg("-p")
            .arg(self.port.to_string())
            .arg("-U")
            .arg(&self.user)
            .arg("-d")
            .arg(database)
            .env("PGPASSWORD", &self.password);
        cmd
    }

    fn restore_args(&self, input: &Path) -> Vec<String> {
        let mut args = vec!["-X".to_string(), "-q".to_string()];
        if self.stop_on_error {
            args.push("-v".to_string());
            args.push("ON_ERROR_STOP=1".to_string());
        }
        args.push("-f".to_string());
        args.push(input.display().to_string());
        args
    }
}

fn check_status(program: &Path, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(AppError::Command {
        program: program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string()),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
    .into())
}

#[async_trait]
impl DumpTool for PgClientTools {
    async fn dump(&self, database: &str, output: &Path) -> Result<()> {
        let pg_dump_path = self.pg_dump_path()?;
        let dump_file = File::create(output)
            .with_context(|| format!("Failed to create dump file: {}", output.display()))?;

        let result = self
            .base_command(&pg_dump_path, database)
            .stdout(Stdio::from(dump_file))
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute pg_dump for database: {}", database))
            .and_then(|out| check_status(&pg_dump_path, &out));

        if result.is_err() {
            // a truncated dump must not be replayed later
            if let Err(e) = fs::remove_file(output) {
                tracing::warn!("Could not remove partial dump {}: {}", output.display(), e);
            }
        }
        result
    }

    async fn restore(&self, database: &str, input: &Path) -> Result<()> {
        let psql_path = self.psql_path()?;
        let output = self
            .base_command(&psql_path, database)
            .args(self.restore_args(input))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute psql for database: {}", database))?;
        check_status(&psql_path, &output)
    }
}
