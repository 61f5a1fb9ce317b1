use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier '{0}': expected letters, digits, '_' or '-', not starting with a digit")]
    InvalidIdentifier(String),

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("No snapshot found under {0}")]
    SnapshotNotFound(PathBuf),

    #[error("Snapshot already exists: {0}")]
    SnapshotExists(PathBuf),

    #[error("Rejected object key '{key}': {reason}")]
    RejectedKey { key: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, AppError>;
