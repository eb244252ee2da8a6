//! Blob storage and blob-backed locking for lockstep.
//!
//! Staged release artifacts, staged release documents and deployment locks all
//! live in a bucket-addressed blob store. The [`BlobStore`] trait is the seam;
//! [`ObjectBlobStore`] implements it on top of `object_store`.

mod config;
mod error;
mod hash;
mod lock;
mod object;
mod traits;
mod types;

pub use config::BlobConfig;
pub use error::{BlobError, BlobResult, LockError, LockResult};
pub use hash::sha256_hex;
pub use lock::{grab_lock, grab_lock_with, reclaim_lock, release_lock, LockPolicy};
pub use object::ObjectBlobStore;
pub use traits::{BlobStore, BlobStoreExt};
pub use types::{BlobMeta, LockAcquisition};
