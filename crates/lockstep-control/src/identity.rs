//! Resource addresses and blob-store keys derived from a release.
//!
//! Everything here is a pure function of already-validated identity fields.
//! Blob keys are laid out as:
//!
//! ```text
//! {account}/{project}/{config}/lock
//! {account}/{project}/{config}/{release_id}/lambda.zip
//! {account}/{project}/{config}/{release_id}/release
//! ```

use crate::error::{DeployError, DeployResult};
use crate::types::{present, Release};

/// Value of the `DeployWith` tag on functions managed by lockstep.
pub const DEPLOY_WITH: &str = "lockstep-deployer";

/// Function ARN for `name` in `region`/`account`.
#[must_use]
pub fn function_arn(region: &str, account: &str, name: &str) -> String {
    format!("arn:aws:lambda:{region}:{account}:function:{name}")
}

/// Workflow (state machine) ARN for `name` in `region`/`account`.
#[must_use]
pub fn workflow_arn(region: &str, account: &str, name: &str) -> String {
    format!("arn:aws:states:{region}:{account}:stateMachine:{name}")
}

/// Path component of an IAM ARN, with leading and trailing slash.
///
/// `arn:aws:iam::000000000000:role/step/p1/c1/name` has path `/step/p1/c1/`;
/// a role without a path has path `/`.
#[must_use]
pub fn arn_path(arn: &str) -> String {
    let resource = arn.splitn(6, ':').nth(5).unwrap_or_default();
    let Some(start) = resource.find('/') else {
        return "/".to_owned();
    };

    let rest = &resource[start..];
    match rest.rfind('/') {
        Some(end) => rest[..=end].to_owned(),
        None => "/".to_owned(),
    }
}

/// Blob-store keys for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePaths {
    /// `{account}/{project}/{config}`
    pub root: String,
    /// `{root}/{release_id}`
    pub release: String,
    /// `{release}/lambda.zip`
    pub artifact: String,
    /// `{release}/release`
    pub staged_release: String,
    /// `{root}/lock`
    pub lock: String,
}

impl ReleasePaths {
    #[must_use]
    pub fn new(account: &str, project: &str, config: &str, release_id: &str) -> Self {
        let root = format!("{account}/{project}/{config}");
        let release = format!("{root}/{release_id}");
        Self {
            artifact: format!("{release}/lambda.zip"),
            staged_release: format!("{release}/release"),
            lock: format!("{root}/lock"),
            root,
            release,
        }
    }
}

/// Identity fields of a release, all guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseIdentity {
    account_id: String,
    region: String,
    uuid: String,
    release_id: String,
    project_name: String,
    config_name: String,
    bucket: String,
    function_name: String,
    workflow_name: String,
    paths: ReleasePaths,
}

impl ReleaseIdentity {
    /// Extract the identity of `release`, failing on the first missing field.
    pub fn from_release(release: &Release) -> DeployResult<Self> {
        let account_id = required(&release.account_id, "account_id")?;
        let region = required(&release.region, "region")?;
        let uuid = required(&release.uuid, "uuid")?;
        let release_id = required(&release.release_id, "release_id")?;
        let project_name = required(&release.project_name, "project_name")?;
        let config_name = required(&release.config_name, "config_name")?;
        let bucket = required(&release.bucket, "bucket")?;
        let function_name = required(&release.function_name, "function_name")?;
        let workflow_name = required(&release.workflow_name, "workflow_name")?;

        let paths = ReleasePaths::new(&account_id, &project_name, &config_name, &release_id);

        Ok(Self {
            account_id,
            region,
            uuid,
            release_id,
            project_name,
            config_name,
            bucket,
            function_name,
            workflow_name,
            paths,
        })
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[must_use]
    pub fn release_id(&self) -> &str {
        &self.release_id
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[must_use]
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    #[must_use]
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Blob-store keys, computed once at construction.
    #[must_use]
    pub const fn paths(&self) -> &ReleasePaths {
        &self.paths
    }

    #[must_use]
    pub fn function_arn(&self) -> String {
        function_arn(&self.region, &self.account_id, &self.function_name)
    }

    #[must_use]
    pub fn workflow_arn(&self) -> String {
        workflow_arn(&self.region, &self.account_id, &self.workflow_name)
    }

    /// Role path the workflow's execution role must live under.
    #[must_use]
    pub fn role_path(&self) -> String {
        format!("/step/{}/{}/", self.project_name, self.config_name)
    }
}

pub(crate) fn required(value: &Option<String>, field: &'static str) -> DeployResult<String> {
    present(value)
        .map(ToOwned::to_owned)
        .ok_or(DeployError::MissingField { field })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn paths_layout() {
        let paths = ReleasePaths::new("000000000000", "p1", "c1", "r1");
        assert_eq!(paths.root, "000000000000/p1/c1");
        assert_eq!(paths.release, "000000000000/p1/c1/r1");
        assert_eq!(paths.artifact, "000000000000/p1/c1/r1/lambda.zip");
        assert_eq!(paths.staged_release, "000000000000/p1/c1/r1/release");
        assert_eq!(paths.lock, "000000000000/p1/c1/lock");
    }

    #[test]
    fn lock_is_shared_across_release_ids() {
        let a = ReleasePaths::new("000000000000", "p1", "c1", "r1");
        let b = ReleasePaths::new("000000000000", "p1", "c1", "r2");
        assert_eq!(a.lock, b.lock);
        assert_ne!(a.artifact, b.artifact);
    }

    #[test]
    fn arns() {
        assert_eq!(
            function_arn("us-east-1", "000000000000", "fn"),
            "arn:aws:lambda:us-east-1:000000000000:function:fn"
        );
        assert_eq!(
            workflow_arn("us-east-1", "000000000000", "wf"),
            "arn:aws:states:us-east-1:000000000000:stateMachine:wf"
        );
    }

    #[test]
    fn role_arn_paths() {
        assert_eq!(
            arn_path("arn:aws:iam::000000000000:role/step/p1/c1/role-name"),
            "/step/p1/c1/"
        );
        assert_eq!(arn_path("arn:aws:iam::000000000000:role/role-name"), "/");
        assert_eq!(arn_path("not-an-arn"), "/");
    }

    #[test]
    fn identity_reports_first_missing_field() {
        let release = Release {
            account_id: Some("000000000000".to_owned()),
            region: Some("us-east-1".to_owned()),
            uuid: Some(String::new()),
            ..Release::default()
        };
        let err = ReleaseIdentity::from_release(&release).unwrap_err();
        assert!(matches!(err, DeployError::MissingField { field: "uuid" }));
    }
}
