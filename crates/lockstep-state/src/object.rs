//! Blob store backed by `object_store`.
//!
//! Supports in-memory, local filesystem, and S3 backends. One object store is
//! created per bucket on first use and cached for the lifetime of the
//! [`ObjectBlobStore`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutMode, PutOptions, UpdateVersion};
use tracing::{debug, warn};

use crate::config::BlobConfig;
use crate::error::{BlobError, BlobResult};
use crate::traits::BlobStore;
use crate::types::BlobMeta;

pub struct ObjectBlobStore {
    config: BlobConfig,
    buckets: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectBlobStore {
    pub fn new(config: BlobConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(BlobConfig::Memory)
    }

    /// Serve `bucket` from a pre-configured object store.
    #[must_use]
    pub fn with_bucket(self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        if let Ok(mut buckets) = self.buckets.write() {
            buckets.insert(bucket.into(), store);
        }
        self
    }

    fn bucket(&self, bucket: &str) -> BlobResult<Arc<dyn ObjectStore>> {
        {
            let buckets = self
                .buckets
                .read()
                .map_err(|_| BlobError::Backend("bucket registry poisoned".to_owned()))?;
            if let Some(store) = buckets.get(bucket) {
                return Ok(store.clone());
            }
        }

        validate_bucket_name(bucket)?;
        let store = create_object_store(&self.config, bucket)?;
        debug!(bucket = %bucket, "opened bucket");

        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| BlobError::Backend("bucket registry poisoned".to_owned()))?;
        Ok(buckets.entry(bucket.to_owned()).or_insert(store).clone())
    }
}

impl std::fmt::Debug for ObjectBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBlobStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> BlobResult<Bytes> {
        let store = self.bucket(bucket)?;
        let path = ObjectPath::from(key);

        let result = store
            .get(&path)
            .await
            .map_err(|e| BlobError::from_store(bucket, key, e))?;

        result
            .bytes()
            .await
            .map_err(|e| BlobError::from_store(bucket, key, e))
    }

    async fn put(&self, bucket: &str, key: &str, value: Bytes) -> BlobResult<()> {
        let store = self.bucket(bucket)?;
        let path = ObjectPath::from(key);

        debug!(bucket = %bucket, key = %key, size = value.len(), "writing object");
        store
            .put(&path, value.into())
            .await
            .map_err(|e| BlobError::from_store(bucket, key, e))?;
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<BlobMeta> {
        let store = self.bucket(bucket)?;
        let meta = store
            .head(&ObjectPath::from(key))
            .await
            .map_err(|e| BlobError::from_store(bucket, key, e))?;
        Ok(blob_meta(key, meta))
    }

    async fn create_if_absent(&self, bucket: &str, key: &str, value: Bytes) -> BlobResult<bool> {
        let store = self.bucket(bucket)?;
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };

        match store.put_opts(&ObjectPath::from(key), value.into(), opts).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
            Err(e) => Err(BlobError::from_store(bucket, key, e)),
        }
    }

    async fn delete_if_matches(&self, bucket: &str, key: &str, expected: &[u8]) -> BlobResult<()> {
        let store = self.bucket(bucket)?;
        let path = ObjectPath::from(key);

        let current = match store.get(&path).await {
            Ok(result) => result
                .bytes()
                .await
                .map_err(|e| BlobError::from_store(bucket, key, e))?,
            Err(object_store::Error::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(BlobError::from_store(bucket, key, e)),
        };

        if current.as_ref() != expected {
            return Err(BlobError::Mismatch {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                expected: String::from_utf8_lossy(expected).into_owned(),
                actual: String::from_utf8_lossy(&current).into_owned(),
            });
        }

        // object_store has no conditional delete: a writer that replaces the
        // object between the read above and this delete loses its write.
        match store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(BlobError::from_store(bucket, key, e)),
        }
    }

    async fn replace_if_stale(
        &self,
        bucket: &str,
        key: &str,
        value: Bytes,
        older_than: Duration,
    ) -> BlobResult<bool> {
        let store = self.bucket(bucket)?;
        let path = ObjectPath::from(key);

        let meta = match store.head(&path).await {
            Ok(meta) => meta,
            Err(object_store::Error::NotFound { .. }) => {
                return self.create_if_absent(bucket, key, value).await;
            }
            Err(e) => return Err(BlobError::from_store(bucket, key, e)),
        };

        let threshold = chrono::Duration::from_std(older_than)
            .map_err(|e| BlobError::Configuration(format!("invalid staleness window: {e}")))?;
        let age = Utc::now().signed_duration_since(meta.last_modified);
        if age <= threshold {
            return Ok(false);
        }

        let opts = PutOptions {
            mode: PutMode::Update(UpdateVersion {
                e_tag: meta.e_tag.clone(),
                version: meta.version.clone(),
            }),
            ..Default::default()
        };

        match store.put_opts(&path, value.into(), opts).await {
            Ok(_) => Ok(true),
            Err(
                object_store::Error::Precondition { .. }
                | object_store::Error::AlreadyExists { .. },
            ) => {
                warn!(bucket = %bucket, key = %key, "stale object replaced concurrently");
                Ok(false)
            }
            Err(e) => Err(BlobError::from_store(bucket, key, e)),
        }
    }
}

fn blob_meta(key: &str, meta: ObjectMeta) -> BlobMeta {
    BlobMeta {
        key: key.to_owned(),
        size: u64::try_from(meta.size).unwrap_or(u64::MAX),
        last_modified: meta.last_modified,
        e_tag: meta.e_tag,
        version: meta.version,
    }
}

fn validate_bucket_name(bucket: &str) -> BlobResult<()> {
    let valid = !bucket.is_empty()
        && bucket.len() <= 63
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !bucket.contains("..")
        && !bucket.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(BlobError::Configuration(format!(
            "invalid bucket name: {bucket:?}"
        )))
    }
}

fn create_object_store(config: &BlobConfig, bucket: &str) -> BlobResult<Arc<dyn ObjectStore>> {
    match config {
        BlobConfig::Memory => Ok(Arc::new(InMemory::new())),
        BlobConfig::Local { root } => {
            let path = root.join(bucket);
            std::fs::create_dir_all(&path).map_err(|e| {
                BlobError::Configuration(format!(
                    "failed to create bucket directory {}: {e}",
                    path.display()
                ))
            })?;
            let store = LocalFileSystem::new_with_prefix(&path).map_err(|e| {
                BlobError::Configuration(format!("failed to create local store: {e}"))
            })?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        BlobConfig::S3 {
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            allow_http,
        } => {
            use object_store::aws::{AmazonS3Builder, S3ConditionalPut};

            let mut builder = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .with_conditional_put(S3ConditionalPut::ETagMatch);

            if let Some(r) = region {
                builder = builder.with_region(r);
            }
            if let Some(ep) = endpoint {
                builder = builder.with_endpoint(ep);
            }
            if let Some(key) = access_key_id {
                builder = builder.with_access_key_id(key);
            }
            if let Some(secret) = secret_access_key {
                builder = builder.with_secret_access_key(secret);
            }
            if *allow_http {
                builder = builder.with_allow_http(true);
            }

            let store = builder.build().map_err(|e| {
                BlobError::Configuration(format!("failed to create S3 store: {e}"))
            })?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        BlobConfig::S3 { .. } => Err(BlobError::Configuration(
            "S3 storage requires the 's3' feature to be enabled".to_owned(),
        )),
    }
}
