//! CLI subcommands.

pub mod hash;
pub mod lock;
pub mod stage;
pub mod validate;

use std::path::Path;

use lockstep_control::{DeployError, DeployerConfig, Release};
use lockstep_state::{BlobError, LockError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a release document: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode release: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

pub fn load_config(path: Option<&Path>) -> Result<DeployerConfig, DeployError> {
    match path {
        Some(path) => DeployerConfig::from_file(path),
        None => DeployerConfig::load(),
    }
}

pub async fn read_file(path: &Path) -> Result<Vec<u8>, CommandError> {
    tokio::fs::read(path).await.map_err(|source| CommandError::Read {
        path: path.display().to_string(),
        source,
    })
}

pub async fn read_release(path: &Path) -> Result<Release, CommandError> {
    let data = read_file(path).await?;
    serde_json::from_slice(&data).map_err(|source| CommandError::Decode {
        path: path.display().to_string(),
        source,
    })
}

/// Apply the configured defaults to a release read from disk.
pub fn with_defaults(config: &DeployerConfig, mut release: Release) -> Release {
    let defaults = &config.defaults;
    release.set_defaults(
        defaults.region.as_deref(),
        defaults.account_id.as_deref(),
        &defaults.bucket_prefix,
    );
    release
}
