//! Structural validation of a release.
//!
//! Checks run in a fixed order and stop at the first failure. Nothing here
//! touches the network.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::definition::{pretty_definition, DefinitionValidator};
use crate::error::{DeployError, DeployResult};
use crate::identity::{required, ReleaseIdentity};
use crate::request::{UpdateCodeRequest, UpdateDefinitionRequest};
use crate::types::Release;

/// Accepted window for `created_at` relative to the validating clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Freshness {
    /// Oldest accepted age in seconds.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u32,
    /// Furthest accepted distance into the future in seconds.
    #[serde(default = "default_max_skew_secs")]
    pub max_skew_secs: u32,
}

const fn default_max_age_secs() -> u32 {
    300
}

const fn default_max_skew_secs() -> u32 {
    120
}

impl Default for Freshness {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            max_skew_secs: default_max_skew_secs(),
        }
    }
}

impl Freshness {
    /// Whether `created_at` lies within the window around `now`. Both ends are
    /// inclusive. A bound that falls outside the representable time range does
    /// not constrain that side.
    #[must_use]
    pub fn contains(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let oldest = now.checked_sub_signed(TimeDelta::seconds(i64::from(self.max_age_secs)));
        let newest = now.checked_add_signed(TimeDelta::seconds(i64::from(self.max_skew_secs)));
        oldest.map_or(true, |oldest| created_at >= oldest)
            && newest.map_or(true, |newest| created_at <= newest)
    }

    fn check(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> DeployResult<()> {
        if self.contains(created_at, now) {
            Ok(())
        } else {
            Err(DeployError::StaleOrFutureTimestamp {
                created_at,
                now,
                max_age_secs: self.max_age_secs,
                max_skew_secs: self.max_skew_secs,
            })
        }
    }
}

impl Release {
    /// Full structural validation.
    ///
    /// Checks the deployer-assigned identity, then the client attributes, then
    /// that the function and workflow update requests built from this release
    /// would be well formed. Returns the validated identity.
    pub fn validate_attributes(
        &self,
        definitions: &dyn DefinitionValidator,
        now: DateTime<Utc>,
        freshness: &Freshness,
    ) -> DeployResult<ReleaseIdentity> {
        required(&self.account_id, "account_id")?;
        required(&self.region, "region")?;
        required(&self.uuid, "uuid")?;

        self.validate_client_attributes(definitions, now, freshness)?;

        let identity = ReleaseIdentity::from_release(self)?;

        UpdateCodeRequest::new(identity.function_arn(), Bytes::new()).validate()?;

        let definition = required(&self.workflow_definition, "workflow_definition")?;
        // Size limits apply to the text that will be pushed, not the submitted text.
        UpdateDefinitionRequest::new(identity.workflow_arn(), pretty_definition(&definition))
            .validate()?;

        debug!(
            uuid = %identity.uuid(),
            release_id = %identity.release_id(),
            "release attributes valid"
        );
        Ok(identity)
    }

    /// Validate the fields a client is responsible for.
    pub fn validate_client_attributes(
        &self,
        definitions: &dyn DefinitionValidator,
        now: DateTime<Utc>,
        freshness: &Freshness,
    ) -> DeployResult<()> {
        required(&self.release_id, "release_id")?;
        required(&self.project_name, "project_name")?;
        required(&self.config_name, "config_name")?;
        required(&self.bucket, "bucket")?;

        let created_at = self
            .created_at
            .ok_or(DeployError::MissingField { field: "created_at" })?;
        freshness.check(created_at, now)?;

        required(&self.function_name, "function_name")?;
        required(&self.function_sha256, "function_sha256")?;
        required(&self.workflow_name, "workflow_name")?;
        let definition = required(&self.workflow_definition, "workflow_definition")?;

        definitions
            .validate(&definition)
            .map_err(|e| DeployError::InvalidDefinitionSyntax(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::definition::StatesLanguageValidator;
    use crate::error::ErrorKind;

    const DEFINITION: &str =
        r#"{"StartAt": "Hello", "States": {"Hello": {"Type": "Pass", "End": true}}}"#;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn valid() -> Release {
        Release {
            account_id: Some("000000000000".to_owned()),
            region: Some("us-east-1".to_owned()),
            uuid: Some("release-1".to_owned()),
            release_id: Some("r1".to_owned()),
            project_name: Some("p1".to_owned()),
            config_name: Some("c1".to_owned()),
            bucket: Some("bucket".to_owned()),
            created_at: Some(now()),
            function_name: Some("fn".to_owned()),
            function_sha256: Some("abc".to_owned()),
            workflow_name: Some("wf".to_owned()),
            workflow_definition: Some(DEFINITION.to_owned()),
            ..Release::default()
        }
    }

    fn validate(release: &Release) -> DeployResult<ReleaseIdentity> {
        release.validate_attributes(&StatesLanguageValidator, now(), &Freshness::default())
    }

    fn missing_field(err: DeployError) -> &'static str {
        match err {
            DeployError::MissingField { field } => field,
            other => panic!("expected MissingField, got {other}"),
        }
    }

    #[test]
    fn valid_release_yields_identity() {
        let identity = validate(&valid()).unwrap();
        assert_eq!(identity.paths().lock, "000000000000/p1/c1/lock");
        assert_eq!(identity.role_path(), "/step/p1/c1/");
    }

    #[test]
    fn each_missing_field_is_named() {
        type Clear = fn(&mut Release);
        let cases: [(&str, Clear); 12] = [
            ("account_id", |r| r.account_id = None),
            ("region", |r| r.region = Some(String::new())),
            ("uuid", |r| r.uuid = None),
            ("release_id", |r| r.release_id = None),
            ("project_name", |r| r.project_name = Some(String::new())),
            ("config_name", |r| r.config_name = None),
            ("bucket", |r| r.bucket = None),
            ("created_at", |r| r.created_at = None),
            ("function_name", |r| r.function_name = None),
            ("function_sha256", |r| r.function_sha256 = Some(String::new())),
            ("workflow_name", |r| r.workflow_name = None),
            ("workflow_definition", |r| r.workflow_definition = None),
        ];

        for (field, clear) in cases {
            let mut release = valid();
            clear(&mut release);
            assert_eq!(missing_field(validate(&release).unwrap_err()), field);
        }
    }

    #[test]
    fn first_missing_field_wins() {
        let mut release = valid();
        release.bucket = None;
        release.workflow_name = None;
        assert_eq!(missing_field(validate(&release).unwrap_err()), "bucket");
    }

    #[test]
    fn freshness_window_boundaries() {
        let cases = [(-301, false), (-299, true), (121, false), (119, true)];

        for (offset, ok) in cases {
            let mut release = valid();
            release.created_at = Some(now() + TimeDelta::seconds(offset));
            let result = validate(&release);
            assert_eq!(result.is_ok(), ok, "offset {offset}");
            if let Err(err) = result {
                assert_eq!(err.kind(), ErrorKind::StaleOrFutureTimestamp);
            }
        }
    }

    #[test]
    fn huge_freshness_window_does_not_overflow() {
        let wide = Freshness {
            max_age_secs: u32::MAX,
            max_skew_secs: u32::MAX,
        };
        assert!(wide.contains(now(), now()));
        assert!(wide.contains(DateTime::<Utc>::MAX_UTC, DateTime::<Utc>::MAX_UTC));
        assert!(wide.contains(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MIN_UTC));
        assert!(wide.contains(now() - TimeDelta::days(365 * 100), now()));
    }

    #[test]
    fn negative_freshness_is_rejected() {
        let parsed: Result<Freshness, _> = toml::from_str("max_age_secs = -10");
        assert!(parsed.is_err());
    }

    #[test]
    fn size_limit_applies_to_pushed_definition() {
        let mut release = valid();
        release.workflow_definition = Some(padded_definition(200_000));
        let submitted = release.workflow_definition.as_deref().unwrap();
        assert!(submitted.len() < crate::definition::MAX_DEFINITION_BYTES);
        assert!(pretty_definition(submitted).len() > crate::definition::MAX_DEFINITION_BYTES);

        assert_eq!(validate(&release).unwrap_err().kind(), ErrorKind::MalformedRequest);
    }

    fn padded_definition(entries: usize) -> String {
        serde_json::json!({
            "StartAt": "Hello",
            "States": {"Hello": {"Type": "Pass", "Result": vec![1; entries], "End": true}}
        })
        .to_string()
    }

    #[test]
    fn definition_errors_are_wrapped() {
        let mut release = valid();
        release.workflow_definition = Some(r#"{"StartAt": "Missing", "States": {}}"#.to_owned());
        let err = validate(&release).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDefinitionSyntax);
        assert!(err.to_string().starts_with("workflow definition invalid"));
    }

    #[test]
    fn malformed_names_fail_as_requests() {
        let mut release = valid();
        release.function_name = Some("not a valid name".to_owned());
        assert_eq!(validate(&release).unwrap_err().kind(), ErrorKind::MalformedRequest);

        let mut release = valid();
        release.account_id = Some("12".to_owned());
        assert_eq!(validate(&release).unwrap_err().kind(), ErrorKind::MalformedRequest);
    }

    #[test]
    fn client_attributes_skip_deployer_fields() {
        let mut release = valid();
        release.account_id = None;
        release.uuid = None;
        assert!(release
            .validate_client_attributes(&StatesLanguageValidator, now(), &Freshness::default())
            .is_ok());
    }
}
