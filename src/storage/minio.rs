// outline-backup/src/storage/minio.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::{Credentials, Region};
use s3::error::ProvideErrorMetadata;
use s3::primitives::ByteStream;
use std::path::Path;
use tokio::fs::File;

use super::{ObjectStore, copy_in_chunks};
use crate::config::MinioConfig;

const NO_SUCH_BUCKET_POLICY: &str = "NoSuchBucketPolicy";

/// MinIO (or any S3-compatible service) addressed path-style with static credentials.
pub struct MinioStore {
    client: s3::Client,
}

impl MinioStore {
    pub async fn connect(minio_config: &MinioConfig) -> Result<Self> {
        let endpoint = minio_config.endpoint_url()?;
        let (access_key, secret_key) = minio_config.credentials()?;
        tracing::debug!("Using object storage endpoint {}", endpoint);

        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .region(Region::new(minio_config.region.clone()))
            .credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ))
            .load()
            .await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(MinioStore {
            client: s3::Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl ObjectStore for MinioStore {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .context("Failed to list buckets")?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.with_context(|| format!("Failed to list objects in bucket {}", bucket))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );
        }
        Ok(keys)
    }

    async fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get object s3://{}/{}", bucket, key))?;

        let mut output_file = File::create(dest)
            .await
            .with_context(|| format!("Failed to create destination file: {}", dest.display()))?;

        // the body owns the HTTP connection; it is released when this scope ends
        let body = object.body.into_async_read();
        tokio::pin!(body);
        copy_in_chunks(&mut body, &mut output_file)
            .await
            .with_context(|| format!("Failed to stream s3://{}/{} to {}", bucket, key, dest.display()))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to check bucket {}", bucket)),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .with_context(|| format!("Failed to create bucket {}", bucket))?;
        Ok(())
    }

    async fn get_bucket_policy(&self, bucket: &str) -> Result<Option<String>> {
        match self.client.get_bucket_policy().bucket(bucket).send().await {
            Ok(output) => Ok(output.policy().map(str::to_string)),
            Err(e) if e.code() == Some(NO_SUCH_BUCKET_POLICY) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to get policy of bucket {}", bucket)),
        }
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .with_context(|| format!("Failed to set policy of bucket {}", bucket))?;
        Ok(())
    }

    async fn upload_file(&self, bucket: &str, key: &str, src: &Path) -> Result<()> {
        let body = ByteStream::from_path(src)
            .await
            .with_context(|| format!("Failed to create ByteStream from file: {}", src.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload {} to s3://{}/{}", src.display(), bucket, key))?;
        Ok(())
    }
}
