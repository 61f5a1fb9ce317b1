// outline-backup/src/utils/snapshot.rs
//! Snapshot naming, on-disk layout and lookup of the most recent snapshot.
//!
//! A snapshot is `<backup_root>/backup_<YYYYMMDD_HHMMSS>/` holding a `postgres/`
//! and a `minio/` subtree. Names sort lexicographically in chronological order,
//! which is what [`find_latest`] relies on.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::errors::AppError;

pub const SNAPSHOT_PREFIX: &str = "backup_";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const POSTGRES_SEGMENT: &str = "postgres";
pub const MINIO_SEGMENT: &str = "minio";

/// Timestamp for a snapshot taken now, in local time.
pub fn snapshot_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn snapshot_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^backup_\d{8}_\d{6}$").expect("snapshot pattern is valid"))
}

pub fn is_snapshot_name(name: &str) -> bool {
    snapshot_name_pattern().is_match(name)
}

/// Paths inside one snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLayout {
    root: PathBuf,
}

impl SnapshotLayout {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        SnapshotLayout { root: root.into() }
    }

    pub fn for_timestamp(backup_root: &Path, timestamp: &str) -> Self {
        Self::at(backup_root.join(format!("{}{}", SNAPSHOT_PREFIX, timestamp)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn postgres_dir(&self) -> PathBuf {
        self.root.join(POSTGRES_SEGMENT)
    }

    pub fn minio_dir(&self) -> PathBuf {
        self.root.join(MINIO_SEGMENT)
    }

    pub fn dump_file(&self, db_name: &str) -> PathBuf {
        self.postgres_dir().join(format!("{}_backup.sql", db_name))
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.minio_dir().join(bucket)
    }

    /// Creates the snapshot skeleton. A completed snapshot is never reused.
    pub fn create(&self) -> Result<()> {
        if self.root.exists() {
            return Err(AppError::SnapshotExists(self.root.clone()).into());
        }
        for dir in [self.postgres_dir(), self.minio_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create snapshot directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Returns the lexicographically greatest `backup_<timestamp>` directory under `backup_root`.
pub fn find_latest(backup_root: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(backup_root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Cannot read backup root {}: {}", backup_root.display(), e);
            return None;
        }
    };

    let latest = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_snapshot_name(name))
        .max()?;

    let path = backup_root.join(latest);
    tracing::info!("Found latest snapshot: {}", path.display());
    Some(path)
}

/// Either an explicitly named snapshot or "the latest one under the backup root".
#[derive(Debug, Clone)]
pub struct SnapshotSelector {
    pub backup_root: PathBuf,
    pub explicit: Option<PathBuf>,
}

impl SnapshotSelector {
    pub fn latest_in(backup_root: impl Into<PathBuf>) -> Self {
        SnapshotSelector {
            backup_root: backup_root.into(),
            explicit: None,
        }
    }

    pub fn exact(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        SnapshotSelector {
            backup_root: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            explicit: Some(path),
        }
    }

    pub fn resolve(&self) -> Result<SnapshotLayout> {
        match &self.explicit {
            Some(path) if path.is_dir() => Ok(SnapshotLayout::at(path.clone())),
            Some(path) => Err(AppError::SnapshotNotFound(path.clone()).into()),
            None => find_latest(&self.backup_root)
                .map(SnapshotLayout::at)
                .ok_or_else(|| AppError::SnapshotNotFound(self.backup_root.clone()).into()),
        }
    }
}
