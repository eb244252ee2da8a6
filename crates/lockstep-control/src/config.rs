//! Configuration for the lockstep deployer.

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use lockstep_state::{BlobConfig, LockPolicy};
use serde::Deserialize;

use crate::error::{DeployError, DeployResult};
use crate::types::DEFAULT_BUCKET_PREFIX;
use crate::validation::Freshness;

const ENV_PREFIX: &str = "LOCKSTEP_";

/// Top-level deployer configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeployerConfig {
    /// Ambient values used to fill in release defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Blob store backend.
    #[serde(default)]
    pub blob: BlobConfig,

    /// Lock staleness policy.
    #[serde(default)]
    pub lock: LockPolicy,

    /// Accepted `created_at` window.
    #[serde(default)]
    pub freshness: Freshness,
}

impl DeployerConfig {
    /// Load configuration from the default sources.
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. `lockstep.toml` in the current directory (if present)
    /// 3. Environment variables with the `LOCKSTEP_` prefix
    pub fn load() -> DeployResult<Self> {
        Self::from_file("lockstep.toml")
    }

    /// Load configuration from a specific TOML file, then the environment.
    pub fn from_file(path: impl AsRef<Path>) -> DeployResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the backend cannot honour.
    pub fn validate(&self) -> DeployResult<()> {
        if self.lock.stale_after_secs.is_some() && !self.blob.supports_conditional_replace() {
            return Err(DeployError::Config(
                "lock.stale_after_secs requires a blob backend with conditional replace; \
                 the local backend cannot reclaim stale locks"
                    .to_owned(),
            ));
        }
        Ok(())
    }
}

/// Fallbacks for release fields the client leaves empty.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub account_id: Option<String>,

    /// The staging bucket defaults to `{bucket_prefix}-{account_id}`.
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,
}

fn default_bucket_prefix() -> String {
    DEFAULT_BUCKET_PREFIX.to_owned()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            region: None,
            account_id: None,
            bucket_prefix: default_bucket_prefix(),
        }
    }
}
