// outline-backup/src/restore/bucket_restore.rs
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::report::DriverReport;
use crate::storage::{ObjectStore, POLICY_FILE, relative_path_to_key};
use crate::utils::snapshot::SnapshotSelector;

pub const DRIVER: &str = "minio";

/// Recreates each bucket found in the snapshot's `minio/` directory, uploads
/// its files (overwriting same-named objects) and reapplies its policy.
pub async fn restore_buckets(store: &dyn ObjectStore, selector: &SnapshotSelector) -> DriverReport {
    info!("=== Restoring MinIO buckets ===");
    let mut report = DriverReport::new(DRIVER);

    let layout = match selector.resolve() {
        Ok(layout) => layout,
        Err(e) => return report.abort(format!("{:#}, cannot restore MinIO buckets", e)),
    };
    let minio_dir = layout.minio_dir();
    if !minio_dir.is_dir() {
        return report.abort(format!("MinIO backup directory does not exist: {}", minio_dir.display()));
    }

    let buckets = match bucket_dirs(&minio_dir) {
        Ok(buckets) => buckets,
        Err(e) => return report.abort(e),
    };
    if buckets.is_empty() {
        info!("No bucket backups found, skipping MinIO restore");
        return report;
    }
    info!(
        "Found bucket backups: {}",
        buckets.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(", ")
    );

    let mut nested = Vec::new();
    for (bucket, dir) in &buckets {
        if let Some(count) = restore_bucket(store, bucket, dir, &mut report).await {
            if count > 0 {
                nested.push(format!("{} ({} objects under {}/)", bucket, count, bucket));
            }
        }
    }

    info!("MinIO restore pass finished");
    if !nested.is_empty() {
        warn!(
            "⚠️ Some restored keys start with their own bucket name: {}. Check that the layout is not duplicated as <bucket>/<bucket>/...",
            nested.join(", ")
        );
    }
    report
}

/// Immediate subdirectories of `minio_dir`, sorted by name.
fn bucket_dirs(minio_dir: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut buckets = Vec::new();
    for entry in fs::read_dir(minio_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => buckets.push((name, entry.path())),
            Err(name) => warn!("⚠️ Ignoring bucket directory with non UTF-8 name: {:?}", name),
        }
    }
    buckets.sort();
    Ok(buckets)
}

/// Returns how many uploaded keys start with `<bucket>/`, or `None` when the bucket could not be created.
async fn restore_bucket(
    store: &dyn ObjectStore,
    bucket: &str,
    bucket_dir: &Path,
    report: &mut DriverReport,
) -> Option<usize> {
    info!("Restoring bucket: {}", bucket);
    match store.bucket_exists(bucket).await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = store.make_bucket(bucket).await {
                report.failed(bucket, format!("{:#}", e));
                return None;
            }
            info!("Created bucket: {}", bucket);
        }
        Err(e) => {
            report.failed(bucket, format!("{:#}", e));
            return None;
        }
    }

    let nested_prefix = format!("{}/", bucket);
    let mut nested = 0;
    for entry in WalkDir::new(bucket_dir).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.failed(bucket, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(bucket_dir) {
            Ok(relative) => relative,
            Err(e) => {
                report.failed(entry.path().display().to_string(), e);
                continue;
            }
        };
        if relative == Path::new(POLICY_FILE) {
            continue;
        }
        let Some(key) = relative_path_to_key(relative) else {
            report.failed(
                format!("{}/{}", bucket, relative.display()),
                "path cannot be expressed as an object key",
            );
            continue;
        };

        let resource = format!("{}/{}", bucket, key);
        match store.upload_file(bucket, &key, entry.path()).await {
            Ok(()) => {
                info!("Restored: {}", key);
                if key.starts_with(&nested_prefix) {
                    nested += 1;
                }
                report.completed(resource);
            }
            Err(e) => report.failed(resource, format!("{:#}", e)),
        }
    }

    restore_policy(store, bucket, &bucket_dir.join(POLICY_FILE), report).await;
    Some(nested)
}

async fn restore_policy(store: &dyn ObjectStore, bucket: &str, policy_file: &Path, report: &mut DriverReport) {
    if !policy_file.is_file() {
        return;
    }
    let resource = format!("{}/{}", bucket, POLICY_FILE);
    let policy = match tokio::fs::read_to_string(policy_file).await {
        Ok(policy) => policy,
        Err(e) => {
            report.failed(resource, e);
            return;
        }
    };
    match store.set_bucket_policy(bucket, &policy).await {
        Ok(()) => {
            info!("Restored policy of {}", bucket);
            report.completed(resource);
        }
        Err(e) => report.failed(resource, format!("{:#}", e)),
    }
}
