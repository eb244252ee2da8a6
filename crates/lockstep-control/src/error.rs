//! Error types for lockstep-control.

use std::fmt;

use chrono::{DateTime, Utc};
use lockstep_state::{BlobError, LockError};
use serde::{Deserialize, Serialize};

/// Result type alias using [`DeployError`].
pub type DeployResult<T> = Result<T, DeployError>;

/// Classification of a failed or refused deployment attempt.
///
/// This is what gets recorded on the release as its terminal error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingField,
    StaleOrFutureTimestamp,
    InvalidDefinitionSyntax,
    MalformedRequest,
    TagMismatch,
    AuthorizationPathMismatch,
    ArtifactHashMismatch,
    SelfHashMismatch,
    LockContended,
    LockOwnershipMismatch,
    UpstreamUnavailable,
    PartialDeployment,
    Configuration,
}

impl ErrorKind {
    /// Get the kind name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "MissingField",
            Self::StaleOrFutureTimestamp => "StaleOrFutureTimestamp",
            Self::InvalidDefinitionSyntax => "InvalidDefinitionSyntax",
            Self::MalformedRequest => "MalformedRequest",
            Self::TagMismatch => "TagMismatch",
            Self::AuthorizationPathMismatch => "AuthorizationPathMismatch",
            Self::ArtifactHashMismatch => "ArtifactHashMismatch",
            Self::SelfHashMismatch => "SelfHashMismatch",
            Self::LockContended => "LockContended",
            Self::LockOwnershipMismatch => "LockOwnershipMismatch",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::PartialDeployment => "PartialDeployment",
            Self::Configuration => "Configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a cloud resource API (function or workflow manager).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The addressed resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The caller is not permitted to perform the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The request was rejected by the service.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The service could not be reached or failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors that can occur while validating or deploying a release.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A required release field is absent or empty.
    #[error("{field} must be defined")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// `created_at` is outside the accepted freshness window.
    #[error(
        "created_at {created_at} older than {max_age_secs}s \
         or more than {max_skew_secs}s in the future (now {now})"
    )]
    StaleOrFutureTimestamp {
        /// Timestamp carried by the release.
        created_at: DateTime<Utc>,
        /// Time the check was made.
        now: DateTime<Utc>,
        /// Maximum accepted age.
        max_age_secs: u32,
        /// Maximum accepted clock skew into the future.
        max_skew_secs: u32,
    },

    /// The workflow definition failed validation.
    #[error("workflow definition invalid with '{0}'")]
    InvalidDefinitionSyntax(String),

    /// A request built from the release would be rejected by the target API.
    #[error("malformed {request} request: {reason}")]
    MalformedRequest {
        /// Which request is malformed.
        request: &'static str,
        /// Why it is malformed.
        reason: String,
    },

    /// An ownership tag on the target function is missing or wrong.
    #[error(
        "function {tag} tag incorrect, expecting {expected} has {}",
        .actual.as_deref().unwrap_or("<missing>")
    )]
    TagMismatch {
        /// Tag name.
        tag: &'static str,
        /// Value required by the release.
        expected: String,
        /// Value found on the function, if any.
        actual: Option<String>,
    },

    /// The workflow execution role is outside the release's namespace.
    #[error("incorrect workflow role path, expecting {expected}, got {actual}")]
    AuthorizationPathMismatch {
        /// Required role path.
        expected: String,
        /// Role path found on the workflow.
        actual: String,
    },

    /// The staged artifact does not hash to the submitted value.
    #[error("function artifact SHA mismatch, expecting {expected}, got {actual}")]
    ArtifactHashMismatch {
        /// Hash submitted with the release.
        expected: String,
        /// Hash of the staged artifact.
        actual: String,
    },

    /// The staged release does not hash to the submitted value.
    #[error("release SHA incorrect, expecting {expected}, got {actual}")]
    SelfHashMismatch {
        /// Hash of the staged release.
        expected: String,
        /// Hash submitted with the release.
        actual: String,
    },

    /// The lock is held by a different owner than the one releasing it.
    #[error("lock {lock_path} not owned by {expected}, held by {actual}")]
    LockOwnershipMismatch {
        /// Lock object key.
        lock_path: String,
        /// Token of the caller.
        expected: String,
        /// Token found in the lock object.
        actual: String,
    },

    /// The blob store failed or did not have the requested object.
    #[error("blob store error: {0}")]
    Store(#[from] BlobError),

    /// A cloud resource API failed.
    #[error("{operation} failed: {source}")]
    Cloud {
        /// API operation that failed.
        operation: &'static str,
        /// Underlying API error.
        #[source]
        source: ApiError,
    },

    /// The function was updated but the workflow update failed.
    #[error("partial deployment: {completed} updated, {failed} failed: {source}")]
    PartialDeployment {
        /// Target that was updated.
        completed: String,
        /// Target whose update failed.
        failed: String,
        /// Error from the failed update.
        #[source]
        source: Box<DeployError>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DeployError {
    /// Create a malformed request error.
    #[must_use]
    pub fn malformed(request: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRequest {
            request,
            reason: reason.into(),
        }
    }

    /// Wrap a cloud API error with the operation that produced it.
    #[must_use]
    pub const fn cloud(operation: &'static str, source: ApiError) -> Self {
        Self::Cloud { operation, source }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::StaleOrFutureTimestamp { .. } => ErrorKind::StaleOrFutureTimestamp,
            Self::InvalidDefinitionSyntax(_) => ErrorKind::InvalidDefinitionSyntax,
            Self::MalformedRequest { .. } => ErrorKind::MalformedRequest,
            Self::TagMismatch { .. } => ErrorKind::TagMismatch,
            Self::AuthorizationPathMismatch { .. } => ErrorKind::AuthorizationPathMismatch,
            Self::ArtifactHashMismatch { .. } => ErrorKind::ArtifactHashMismatch,
            Self::SelfHashMismatch { .. } => ErrorKind::SelfHashMismatch,
            Self::LockOwnershipMismatch { .. } => ErrorKind::LockOwnershipMismatch,
            Self::Store(_) | Self::Cloud { .. } => ErrorKind::UpstreamUnavailable,
            Self::PartialDeployment { .. } => ErrorKind::PartialDeployment,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }
}

impl From<LockError> for DeployError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::OwnershipMismatch {
                lock_path,
                expected,
                actual,
            } => Self::LockOwnershipMismatch {
                lock_path,
                expected,
                actual,
            },
            LockError::Blob(e) => Self::Store(e),
        }
    }
}

impl From<figment::Error> for DeployError {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mismatch_reports_missing_tag() {
        let err = DeployError::TagMismatch {
            tag: "DeployWith",
            expected: "lockstep-deployer".to_owned(),
            actual: None,
        };
        assert_eq!(
            err.to_string(),
            "function DeployWith tag incorrect, expecting lockstep-deployer has <missing>"
        );
    }

    #[test]
    fn upstream_errors_share_a_kind() {
        let store = DeployError::Store(BlobError::Backend("down".to_owned()));
        let cloud = DeployError::cloud("list_tags", ApiError::Transport("reset".to_owned()));
        assert_eq!(store.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(cloud.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn lock_ownership_error_converts() {
        let err: DeployError = LockError::OwnershipMismatch {
            lock_path: "a/p/c/lock".to_owned(),
            expected: "mine".to_owned(),
            actual: "theirs".to_owned(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::LockOwnershipMismatch);
        assert!(err.to_string().contains("theirs"));
    }
}
