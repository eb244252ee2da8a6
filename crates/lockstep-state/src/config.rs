use std::path::PathBuf;

use serde::Deserialize;

/// Backend for the bucket-addressed blob store.
///
/// Each bucket maps to its own object store: a directory under `root` for the
/// local backend, an S3 bucket of the same name for the S3 backend.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BlobConfig {
    #[default]
    Memory,
    Local {
        root: PathBuf,
    },
    S3 {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
        #[serde(default)]
        allow_http: bool,
    },
}

impl BlobConfig {
    /// Whether the backend can replace an object only if it is unchanged,
    /// which stale lock reclaim relies on.
    #[must_use]
    pub fn supports_conditional_replace(&self) -> bool {
        !matches!(self, Self::Local { .. })
    }
}
