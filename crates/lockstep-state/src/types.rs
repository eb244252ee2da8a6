use std::fmt;

use chrono::{DateTime, Utc};

/// Metadata of a stored object, as needed for conditional writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub e_tag: Option<String>,
    pub version: Option<String>,
}

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    /// The lock object was created with our token.
    Acquired,
    /// A stale lock was overwritten with our token.
    Reclaimed,
    /// Another owner holds the lock.
    Held,
}

impl LockAcquisition {
    pub fn acquired(self) -> bool {
        !matches!(self, Self::Held)
    }
}

impl fmt::Display for LockAcquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquired => write!(f, "acquired"),
            Self::Reclaimed => write!(f, "reclaimed"),
            Self::Held => write!(f, "held"),
        }
    }
}
