//! Blob-store backed mutual exclusion.
//!
//! A lock is an object whose content is the owner token. It is taken with an
//! atomic create-if-absent and released with an owner-gated delete. A held
//! lock is not an error: callers back off or report the deployment as in
//! progress.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{BlobError, BlobResult, LockError, LockResult};
use crate::traits::BlobStore;
use crate::types::LockAcquisition;

/// Staleness handling for locks left behind by crashed holders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LockPolicy {
    /// Reclaim a held lock once it is older than this many seconds.
    ///
    /// `None` never reclaims automatically.
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
}

impl LockPolicy {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }
}

/// Take the lock at `lock_path` for `owner`.
///
/// Returns `false` without error when another owner holds it.
pub async fn grab_lock(
    store: &dyn BlobStore,
    bucket: &str,
    lock_path: &str,
    owner: &str,
) -> BlobResult<bool> {
    grab_lock_with(store, bucket, lock_path, owner, &LockPolicy::default())
        .await
        .map(LockAcquisition::acquired)
}

/// Take the lock, reclaiming it when the policy allows and the current holder
/// is stale.
pub async fn grab_lock_with(
    store: &dyn BlobStore,
    bucket: &str,
    lock_path: &str,
    owner: &str,
    policy: &LockPolicy,
) -> BlobResult<LockAcquisition> {
    let token = Bytes::copy_from_slice(owner.as_bytes());

    if store.create_if_absent(bucket, lock_path, token.clone()).await? {
        info!(bucket = %bucket, lock = %lock_path, owner = %owner, "lock acquired");
        return Ok(LockAcquisition::Acquired);
    }

    if let Some(stale_after) = policy.stale_after() {
        match store
            .replace_if_stale(bucket, lock_path, token, stale_after)
            .await
        {
            Ok(true) => {
                warn!(
                    bucket = %bucket,
                    lock = %lock_path,
                    owner = %owner,
                    stale_after_secs = stale_after.as_secs(),
                    "stale lock reclaimed"
                );
                return Ok(LockAcquisition::Reclaimed);
            }
            Ok(false) => {}
            // The holder keeps the lock; an operator can still release it.
            Err(BlobError::Unsupported(reason)) => {
                warn!(
                    bucket = %bucket,
                    lock = %lock_path,
                    owner = %owner,
                    reason = %reason,
                    "backend cannot reclaim stale locks"
                );
            }
            Err(e) => return Err(e),
        }
    }

    debug!(
        bucket = %bucket,
        lock = %lock_path,
        owner = %owner,
        "lock held by another owner"
    );
    Ok(LockAcquisition::Held)
}

/// Forcefully take over a lock older than `older_than`, whoever holds it.
pub async fn reclaim_lock(
    store: &dyn BlobStore,
    bucket: &str,
    lock_path: &str,
    owner: &str,
    older_than: Duration,
) -> BlobResult<bool> {
    let reclaimed = store
        .replace_if_stale(
            bucket,
            lock_path,
            Bytes::copy_from_slice(owner.as_bytes()),
            older_than,
        )
        .await?;

    if reclaimed {
        warn!(bucket = %bucket, lock = %lock_path, owner = %owner, "lock reclaimed");
    }
    Ok(reclaimed)
}

/// Release the lock at `lock_path` if `owner` holds it.
///
/// Releasing an absent lock succeeds. Releasing a lock held by a different
/// token fails with [`LockError::OwnershipMismatch`] and leaves it in place.
pub async fn release_lock(
    store: &dyn BlobStore,
    bucket: &str,
    lock_path: &str,
    owner: &str,
) -> LockResult<()> {
    match store
        .delete_if_matches(bucket, lock_path, owner.as_bytes())
        .await
    {
        Ok(()) => {
            info!(bucket = %bucket, lock = %lock_path, owner = %owner, "lock released");
            Ok(())
        }
        Err(BlobError::Mismatch { actual, .. }) => Err(LockError::OwnershipMismatch {
            lock_path: lock_path.to_owned(),
            expected: owner.to_owned(),
            actual,
        }),
        Err(e) => Err(e.into()),
    }
}
