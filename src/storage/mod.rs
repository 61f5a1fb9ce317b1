// outline-backup/src/storage/mod.rs
//! Object storage seam and the mapping between object keys and snapshot paths.

pub(crate) mod minio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::AppError;

pub use minio::MinioStore;

/// File name of the bucket policy inside a bucket's snapshot directory.
pub const POLICY_FILE: &str = "policy.json";

/// Objects are streamed to disk in chunks of this size.
pub const CHUNK_SIZE: usize = 32 * 1024;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Every key in `bucket`, recursively.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>>;

    /// Streams the object body into `dest`, returning the byte count.
    async fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn make_bucket(&self, bucket: &str) -> Result<()>;

    /// The policy document verbatim, or `None` when the bucket has no policy.
    async fn get_bucket_policy(&self, bucket: &str) -> Result<Option<String>>;

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()>;

    /// Uploads `src` as `key`, replacing any existing object.
    async fn upload_file(&self, bucket: &str, key: &str, src: &Path) -> Result<()>;
}

/// Stands in when no client could be built; every call fails with the reason.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        UnavailableStore {
            reason: format!("{:#}", reason),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(anyhow::anyhow!("MinIO client unavailable: {}", self.reason))
    }
}

#[async_trait]
impl ObjectStore for UnavailableStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.fail()
    }

    async fn list_objects(&self, _bucket: &str) -> Result<Vec<String>> {
        self.fail()
    }

    async fn download_object(&self, _bucket: &str, _key: &str, _dest: &Path) -> Result<u64> {
        self.fail()
    }

    async fn bucket_exists(&self, _bucket: &str) -> Result<bool> {
        self.fail()
    }

    async fn make_bucket(&self, _bucket: &str) -> Result<()> {
        self.fail()
    }

    async fn get_bucket_policy(&self, _bucket: &str) -> Result<Option<String>> {
        self.fail()
    }

    async fn set_bucket_policy(&self, _bucket: &str, _policy: &str) -> Result<()> {
        self.fail()
    }

    async fn upload_file(&self, _bucket: &str, _key: &str, _src: &Path) -> Result<()> {
        self.fail()
    }
}

/// How a listed key is treated by the backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMapping {
    /// Store the object at this path relative to the bucket directory.
    File(PathBuf),
    /// A `prefix/` folder marker carrying no data.
    DirectoryMarker,
}

/// Maps an object key to a relative path. Keys that cannot round-trip through
/// the filesystem, or that would land on the reserved policy file, are rejected.
pub fn key_to_relative_path(key: &str) -> crate::errors::Result<KeyMapping> {
    let reject = |reason| AppError::RejectedKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(reject("empty key"));
    }
    if key.starts_with('/') {
        return Err(reject("absolute key"));
    }
    let body = match key.strip_suffix('/') {
        Some(_) => return Ok(KeyMapping::DirectoryMarker),
        None => key,
    };
    if body == POLICY_FILE {
        return Err(reject("collides with the reserved policy file"));
    }

    let mut path = PathBuf::new();
    for segment in body.split('/') {
        match segment {
            "" => return Err(reject("empty path segment")),
            "." | ".." => return Err(reject("relative path segment")),
            s if s.contains('\\') => return Err(reject("backslash in path segment")),
            s => path.push(s),
        }
    }
    Ok(KeyMapping::File(path))
}

/// Inverse of [`key_to_relative_path`]: path components joined with `/` on every platform.
pub fn relative_path_to_key(relative: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => segments.push(s.to_str()?.to_string()),
            _ => return None,
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Copies `reader` into `writer` in [`CHUNK_SIZE`] pieces and flushes.
pub async fn copy_in_chunks<R, W>(reader: &mut R, writer: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await.context("Failed to read object body")?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .await
            .context("Failed to write object chunk")?;
        total += n as u64;
    }
    writer.flush().await.context("Failed to flush object file")?;
    Ok(total)
}
