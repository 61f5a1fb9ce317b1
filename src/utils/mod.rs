pub mod snapshot;

use anyhow::Context;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use which::which;

use crate::errors::{AppError, Result};

/// Finds the pg_dump executable in the system PATH.
pub fn find_pg_dump_executable() -> anyhow::Result<PathBuf> {
    which("pg_dump").context("pg_dump executable not found in PATH. Please ensure PostgreSQL client tools are installed and in your PATH.")
}

/// Finds the psql executable in the system PATH.
pub fn find_psql_executable() -> anyhow::Result<PathBuf> {
    which("psql").context("psql executable not found in PATH. Please ensure PostgreSQL client tools are installed and in your PATH.")
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("identifier pattern is valid"))
}

/// Database and role names end up inside DDL, where bind parameters are not allowed.
pub fn validate_identifier(name: &str) -> Result<()> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(AppError::InvalidIdentifier(name.to_string()))
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
