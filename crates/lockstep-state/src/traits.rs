use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BlobError, BlobResult};
use crate::hash::sha256_hex;
use crate::types::BlobMeta;

/// Bucket-addressed object storage used for staging releases and locking.
///
/// Reads of a single key are assumed to observe the latest completed write.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> BlobResult<Bytes>;

    async fn put(&self, bucket: &str, key: &str, value: Bytes) -> BlobResult<()>;

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<BlobMeta>;

    /// Write `value` only if no object exists at `key`.
    ///
    /// Returns `false` when the object already exists.
    async fn create_if_absent(&self, bucket: &str, key: &str, value: Bytes) -> BlobResult<bool>;

    /// Delete the object at `key` only if its content equals `expected`.
    ///
    /// A missing object is not an error. A content mismatch returns
    /// [`BlobError::Mismatch`] and leaves the object in place.
    async fn delete_if_matches(&self, bucket: &str, key: &str, expected: &[u8]) -> BlobResult<()>;

    /// Overwrite the object at `key` with `value` if it was last modified more
    /// than `older_than` ago.
    ///
    /// The overwrite is conditional on the version observed when checking the
    /// age, so concurrent reclaimers cannot both succeed.
    async fn replace_if_stale(
        &self,
        bucket: &str,
        key: &str,
        value: Bytes,
        older_than: Duration,
    ) -> BlobResult<bool>;
}

/// Typed and hashing helpers on top of [`BlobStore`].
#[async_trait]
pub trait BlobStoreExt: BlobStore {
    async fn get_struct<T>(&self, bucket: &str, key: &str) -> BlobResult<T>
    where
        T: DeserializeOwned,
    {
        let data = self.get(bucket, key).await?;
        serde_json::from_slice(&data).map_err(|e| {
            BlobError::Serialisation(format!("failed to decode {bucket}/{key}: {e}"))
        })
    }

    async fn put_struct<T>(&self, bucket: &str, key: &str, value: &T) -> BlobResult<()>
    where
        T: Serialize + Sync,
    {
        let data = serde_json::to_vec(value).map_err(|e| {
            BlobError::Serialisation(format!("failed to encode {bucket}/{key}: {e}"))
        })?;
        self.put(bucket, key, Bytes::from(data)).await
    }

    /// Lowercase hex SHA-256 of the object content.
    async fn get_sha256(&self, bucket: &str, key: &str) -> BlobResult<String> {
        let data = self.get(bucket, key).await?;
        Ok(sha256_hex(&data))
    }
}

impl<S: BlobStore + ?Sized> BlobStoreExt for S {}
