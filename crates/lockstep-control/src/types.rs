//! Core types for lockstep-control.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeployError, DeployResult, ErrorKind};

/// Prefix of the default staging bucket; the account id is appended.
pub const DEFAULT_BUCKET_PREFIX: &str = "lockstep-deployer";

/// Terminal error recorded on a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human readable cause.
    pub cause: String,
}

/// Where a release is in its lifecycle, derived from `success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// No terminal outcome recorded yet.
    InProgress,
    /// The release was deployed.
    Succeeded,
    /// The release was refused or failed.
    Failed,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A deployment of one function and one workflow definition.
///
/// This is the document exchanged between the client and the deployer, and
/// the document staged in the blob store. String fields follow an "empty means
/// absent" contract: `Some("")` is treated exactly like `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Assigned per deployment attempt; doubles as the lock owner token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Assigned by the client; stable per logical release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    /// Bucket holding the staged artifact and staged release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Hex SHA-256 of the staged function zip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,

    /// Hex SHA-256 of the canonical form of every other field.
    #[serde(default)]
    pub release_sha256: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_definition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReleaseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// Read an optional string field, treating an empty string as absent.
#[must_use]
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Release {
    /// Fill in fields the client may leave out.
    ///
    /// Generates a UUID, falls back to the given region and account, and
    /// derives the bucket from the fallback account. The bucket follows the
    /// deployer's account rather than the release's, which may differ.
    pub fn set_defaults(
        &mut self,
        region: Option<&str>,
        account: Option<&str>,
        bucket_prefix: &str,
    ) {
        if present(&self.uuid).is_none() {
            self.uuid = Some(generate_uuid());
        }

        if present(&self.region).is_none() {
            self.region = region.map(ToOwned::to_owned);
        }

        if present(&self.account_id).is_none() {
            self.account_id = account.map(ToOwned::to_owned);
        }

        if present(&self.bucket).is_none() {
            if let Some(account) = account.filter(|a| !a.is_empty()) {
                self.bucket = Some(format!("{bucket_prefix}-{account}"));
            }
        }
    }

    /// Canonical JSON used for the release hash.
    ///
    /// `release_sha256` is excluded and object keys are sorted.
    pub fn canonical_json(&self) -> DeployResult<Vec<u8>> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| DeployError::malformed("release", e.to_string()))?;

        if let Value::Object(map) = &mut value {
            map.remove("release_sha256");
        }

        serde_json::to_vec(&sort_keys(value))
            .map_err(|e| DeployError::malformed("release", e.to_string()))
    }

    /// SHA-256 of [`Self::canonical_json`].
    pub fn compute_sha256(&self) -> DeployResult<String> {
        Ok(lockstep_state::sha256_hex(&self.canonical_json()?))
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ReleaseStatus {
        match self.success {
            None => ReleaseStatus::InProgress,
            Some(true) => ReleaseStatus::Succeeded,
            Some(false) => ReleaseStatus::Failed,
        }
    }

    /// Record a successful deployment.
    pub fn record_success(&mut self) {
        self.success = Some(true);
        self.error = None;
    }

    /// Record a failed or refused deployment.
    pub fn record_failure(&mut self, kind: ErrorKind, cause: impl Into<String>) {
        self.success = Some(false);
        self.error = Some(ReleaseError {
            kind,
            cause: cause.into(),
        });
    }

    /// Record an error without changing `success`.
    pub fn record_error(&mut self, kind: ErrorKind, cause: impl Into<String>) {
        self.error = Some(ReleaseError {
            kind,
            cause: cause.into(),
        });
    }
}

fn generate_uuid() -> String {
    format!("release-{}", ulid::Ulid::new().to_string().to_lowercase())
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Release {
        Release {
            release_id: Some("r1".to_owned()),
            project_name: Some("p1".to_owned()),
            config_name: Some("c1".to_owned()),
            function_name: Some("fn".to_owned()),
            ..Release::default()
        }
    }

    #[test]
    fn empty_strings_are_absent() {
        assert_eq!(present(&Some(String::new())), None);
        assert_eq!(present(&None), None);
        assert_eq!(present(&Some("x".to_owned())), Some("x"));
    }

    #[test]
    fn set_defaults_fills_missing_fields() {
        let mut release = sample();
        release.region = Some(String::new());
        release.set_defaults(Some("us-east-1"), Some("000000000000"), DEFAULT_BUCKET_PREFIX);

        assert!(release.uuid.as_deref().unwrap().starts_with("release-"));
        assert_eq!(release.region.as_deref(), Some("us-east-1"));
        assert_eq!(release.account_id.as_deref(), Some("000000000000"));
        assert_eq!(
            release.bucket.as_deref(),
            Some("lockstep-deployer-000000000000")
        );
    }

    #[test]
    fn set_defaults_keeps_client_values() {
        let mut release = sample();
        release.uuid = Some("client-uuid".to_owned());
        release.account_id = Some("111111111111".to_owned());
        release.bucket = Some("my-bucket".to_owned());
        release.set_defaults(Some("us-east-1"), Some("000000000000"), DEFAULT_BUCKET_PREFIX);

        assert_eq!(release.uuid.as_deref(), Some("client-uuid"));
        assert_eq!(release.account_id.as_deref(), Some("111111111111"));
        assert_eq!(release.bucket.as_deref(), Some("my-bucket"));
    }

    #[test]
    fn default_bucket_needs_an_account() {
        let mut release = sample();
        release.set_defaults(Some("us-east-1"), None, DEFAULT_BUCKET_PREFIX);
        assert_eq!(release.bucket, None);
    }

    #[test]
    fn release_hash_ignores_its_own_field() {
        let mut release = sample();
        let before = release.compute_sha256().unwrap();
        release.release_sha256 = before.clone();
        assert_eq!(release.compute_sha256().unwrap(), before);
    }

    #[test]
    fn release_hash_covers_other_fields() {
        let release = sample();
        let mut changed = sample();
        changed.config_name = Some("c2".to_owned());
        assert_ne!(
            release.compute_sha256().unwrap(),
            changed.compute_sha256().unwrap()
        );
    }

    #[test]
    fn release_hash_survives_serialisation() {
        let mut release = sample();
        release.created_at = Some(Utc::now());
        release.workflow_definition = Some(r#"{"StartAt":"A"}"#.to_owned());

        let json = serde_json::to_vec(&release).unwrap();
        let decoded: Release = serde_json::from_slice(&json).unwrap();
        assert_eq!(
            decoded.compute_sha256().unwrap(),
            release.compute_sha256().unwrap()
        );
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let json = String::from_utf8(sample().canonical_json().unwrap()).unwrap();
        let config = json.find("config_name").unwrap();
        let project = json.find("project_name").unwrap();
        assert!(config < project);
        assert!(!json.contains("release_sha256"));
    }

    #[test]
    fn status_follows_success() {
        let mut release = sample();
        assert_eq!(release.status(), ReleaseStatus::InProgress);

        release.record_failure(ErrorKind::TagMismatch, "wrong tag");
        assert_eq!(release.status(), ReleaseStatus::Failed);
        assert_eq!(release.error.as_ref().unwrap().kind, ErrorKind::TagMismatch);

        release.record_success();
        assert_eq!(release.status(), ReleaseStatus::Succeeded);
        assert!(release.error.is_none());
    }
}
