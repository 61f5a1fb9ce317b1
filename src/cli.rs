use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// outline-backup: point-in-time backup and restore of the PostgreSQL databases and MinIO buckets behind Outline
#[derive(Parser, Debug)]
#[command(name = "outline-backup", version, about = "Back up or restore PostgreSQL databases and MinIO buckets.", long_about = None)]
pub struct Cli {
    /// Operation to run
    #[arg(value_enum)]
    pub action: Action,

    /// Directory holding backup_<timestamp> snapshots (overrides BACKUP_DIR and config.json)
    #[arg(long = "backup-dir", value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Snapshot to restore from; defaults to the most recent one in the backup directory
    #[arg(long = "restore-path", value_name = "DIR")]
    pub restore_path: Option<PathBuf>,

    /// JSON configuration file; a missing file is ignored
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    pub config: PathBuf,

    /// Exit with a non-zero status when any database, bucket or object failed
    #[arg(long)]
    pub strict: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Backup,
    Restore,
}
