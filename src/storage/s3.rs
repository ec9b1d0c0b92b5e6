//! S3 Dump Storage
//!
//! Stores a dump under a key prefix inside an S3 (or S3-compatible) bucket.
//! The layout mirrors the local directory tree.

use crate::error::{Error, Result};
use crate::storage::{join_path, DumpStorage};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::collections::BTreeSet;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// S3 storage configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket_name: String,
    /// Bucket region, also used as the location constraint on creation
    pub location: Option<String>,
    /// Key prefix playing the role of the dump root
    pub key_prefix: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            location: None,
            key_prefix: "dump".to_string(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

// =============================================================================
// S3 Storage
// =============================================================================

/// Dump storage backed by an S3 bucket
pub struct S3Storage {
    client: Client,
    config: S3Config,
}

impl S3Storage {
    /// Connect to the bucket
    ///
    /// With `create_bucket` the bucket is created when missing (backup);
    /// otherwise a missing bucket is a configuration error (restore).
    pub async fn connect(config: S3Config, create_bucket: bool) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref location) = config.location {
            loader = loader.region(aws_config::Region::new(location.clone()));
        }
        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if config.force_path_style {
            s3_config = s3_config.force_path_style(true);
        }

        let storage = Self {
            client: Client::from_conf(s3_config.build()),
            config,
        };
        storage.ensure_bucket(create_bucket).await?;

        Ok(storage)
    }

    /// Create-or-get the bucket
    async fn ensure_bucket(&self, create: bool) -> Result<()> {
        let bucket = &self.config.bucket_name;
        let head = self
            .client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.into_service_error());

        if bucket_exists(bucket, head)? {
            info!("Bucket: {} already exists", bucket);
            return Ok(());
        }

        if !create {
            return Err(Error::Configuration(format!(
                "Bucket: {} does not exist",
                bucket
            )));
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(location) = self.config.location.as_deref() {
            if location != "us-east-1" {
                let constraint = CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(location))
                    .build();
                request = request.create_bucket_configuration(constraint);
            }
        }

        request.send().await.map_err(|e| Error::Storage {
            path: bucket.clone(),
            reason: format!("failed to create bucket: {}", e),
        })?;
        info!("Created bucket: {}", bucket);

        Ok(())
    }

    fn key(&self, path: &str) -> String {
        join_path(&self.config.key_prefix, path)
    }

    fn storage_error(&self, path: &str, reason: impl std::fmt::Display) -> Error {
        Error::Storage {
            path: format!("s3://{}/{}", self.config.bucket_name, self.key(path)),
            reason: reason.to_string(),
        }
    }

    /// All object keys under `dir`, relative to `dir`
    async fn list_keys(&self, dir: &str, delimited: bool) -> Result<(Vec<String>, Vec<String>)> {
        let prefix = listing_prefix(&self.key(dir));

        let mut objects = Vec::new();
        let mut prefixes = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket_name)
                .prefix(&prefix)
                .set_continuation_token(continuation.take());
            if delimited {
                request = request.delimiter("/");
            }

            let output = request
                .send()
                .await
                .map_err(|e| self.storage_error(dir, e))?;

            objects.extend(relative_names(
                &prefix,
                output.contents().iter().filter_map(|o| o.key()),
            ));
            prefixes.extend(relative_names(
                &prefix,
                output.common_prefixes().iter().filter_map(|p| p.prefix()),
            ));

            continuation = next_page(output.is_truncated(), output.next_continuation_token());
            if continuation.is_none() {
                break;
            }
        }

        Ok((objects, prefixes))
    }
}

#[async_trait]
impl DumpStorage for S3Storage {
    fn location(&self) -> String {
        format!("s3://{}/{}", self.config.bucket_name, self.config.key_prefix)
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let key = self.key(path);
        info!("Creating file: {}", key);

        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(&key)
            .content_type("application/json")
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| self.storage_error(path, e))?;

        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.config.bucket_name)
            .key(self.key(path))
            .send()
            .await;

        let output = match missing_as_none(result.map_err(|e| e.into_service_error())) {
            Ok(Some(output)) => output,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.storage_error(path, e)),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| self.storage_error(path, e))?;

        Ok(Some(body.into_bytes()))
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let (objects, prefixes) = self.list_keys(dir, true).await?;
        Ok(child_names(objects, prefixes))
    }

    async fn remove_all(&self, dir: &str) -> Result<()> {
        let (objects, _) = self.list_keys(dir, false).await?;
        debug!("Removing {} objects under {}", objects.len(), self.key(dir));

        for object in objects {
            let path = join_path(dir, &object);
            self.client
                .delete_object()
                .bucket(&self.config.bucket_name)
                .key(self.key(&path))
                .send()
                .await
                .map_err(|e| self.storage_error(&path, e))?;
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self
            .client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .is_ok())
    }
}

// =============================================================================
// Key Mapping
// =============================================================================

/// Listing prefix for everything below `key`; empty at the bucket root
fn listing_prefix(key: &str) -> String {
    let key = key.trim_matches('/');
    if key.is_empty() {
        String::new()
    } else {
        format!("{}/", key)
    }
}

/// Keys or common prefixes of one listing page, relative to `prefix`
fn relative_names<'a>(prefix: &str, keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    keys.filter_map(|key| key.strip_prefix(prefix))
        .map(|name| name.trim_end_matches('/'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Continuation token of the next listing page, if there is one
fn next_page(is_truncated: Option<bool>, token: Option<&str>) -> Option<String> {
    match token {
        Some(token) if is_truncated.unwrap_or(false) => Some(token.to_string()),
        _ => None,
    }
}

/// Sorted, de-duplicated immediate children of a directory
fn child_names(objects: Vec<String>, prefixes: Vec<String>) -> Vec<String> {
    let children: BTreeSet<String> = objects.into_iter().chain(prefixes).collect();
    children.into_iter().collect()
}

/// Whether a head-bucket response means the bucket exists
///
/// Only a not-found answer means missing; anything else (access denied,
/// network failure) is an error.
fn bucket_exists(
    bucket: &str,
    head: std::result::Result<(), HeadBucketError>,
) -> Result<bool> {
    match head {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(Error::Storage {
            path: format!("s3://{}", bucket),
            reason: format!("cannot access bucket: {}", e),
        }),
    }
}

/// Map a missing object to `None`
fn missing_as_none<T>(
    result: std::result::Result<T, GetObjectError>,
) -> std::result::Result<Option<T>, GetObjectError> {
    match result {
        Ok(output) => Ok(Some(output)),
        Err(e) if e.is_no_such_key() => Ok(None),
        Err(e) => Err(e),
    }
}
