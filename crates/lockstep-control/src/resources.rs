//! Validation of a release against live resources and its staged copy.

use lockstep_state::{BlobStore, BlobStoreExt};
use tracing::debug;

use crate::cloud::{FunctionApi, WorkflowApi};
use crate::error::{DeployError, DeployResult};
use crate::identity::{arn_path, required, ReleaseIdentity, DEPLOY_WITH};
use crate::types::Release;

/// Checks a release against the function, the workflow and the blob store.
///
/// Collaborator failures propagate unchanged; nothing is retried here.
#[derive(Clone, Copy)]
pub struct ResourceValidator<'a> {
    blobs: &'a dyn BlobStore,
    functions: &'a dyn FunctionApi,
    workflows: &'a dyn WorkflowApi,
}

impl<'a> ResourceValidator<'a> {
    #[must_use]
    pub fn new(
        blobs: &'a dyn BlobStore,
        functions: &'a dyn FunctionApi,
        workflows: &'a dyn WorkflowApi,
    ) -> Self {
        Self {
            blobs,
            functions,
            workflows,
        }
    }

    /// Run every resource check in order, stopping at the first failure.
    pub async fn validate_resources(
        &self,
        release: &Release,
        identity: &ReleaseIdentity,
    ) -> DeployResult<()> {
        self.validate_function_tags(identity).await?;
        self.validate_workflow_path(identity).await?;
        self.validate_function_sha(release, identity).await?;
        self.validate_release_sha(release, identity).await?;

        debug!(uuid = %identity.uuid(), "release resources valid");
        Ok(())
    }

    /// The function must be tagged for this project, config and deployer.
    pub async fn validate_function_tags(&self, identity: &ReleaseIdentity) -> DeployResult<()> {
        let arn = identity.function_arn();
        let tags = self
            .functions
            .list_tags(&arn)
            .await
            .map_err(|e| DeployError::cloud("list_tags", e))?;

        let expected = [
            ("ProjectName", identity.project_name()),
            ("ConfigName", identity.config_name()),
            ("DeployWith", DEPLOY_WITH),
        ];

        for (tag, value) in expected {
            let actual = tags.get(tag);
            if actual.map(String::as_str) != Some(value) {
                return Err(DeployError::TagMismatch {
                    tag,
                    expected: value.to_owned(),
                    actual: actual.cloned(),
                });
            }
        }

        debug!(function = %arn, "function tags valid");
        Ok(())
    }

    /// The workflow's execution role must live under `/step/{project}/{config}/`.
    pub async fn validate_workflow_path(&self, identity: &ReleaseIdentity) -> DeployResult<()> {
        let arn = identity.workflow_arn();
        let description = self
            .workflows
            .describe(&arn)
            .await
            .map_err(|e| DeployError::cloud("describe_state_machine", e))?;

        let expected = identity.role_path();
        let actual = arn_path(&description.role_arn);
        if actual != expected {
            return Err(DeployError::AuthorizationPathMismatch { expected, actual });
        }

        debug!(workflow = %arn, role = %description.role_arn, "workflow role path valid");
        Ok(())
    }

    /// The staged artifact must hash to the submitted `function_sha256`.
    pub async fn validate_function_sha(
        &self,
        release: &Release,
        identity: &ReleaseIdentity,
    ) -> DeployResult<()> {
        let expected = required(&release.function_sha256, "function_sha256")?;
        let actual = self
            .blobs
            .get_sha256(identity.bucket(), &identity.paths().artifact)
            .await?;

        if actual != expected {
            return Err(DeployError::ArtifactHashMismatch { expected, actual });
        }

        debug!(artifact = %identity.paths().artifact, sha256 = %actual, "artifact hash valid");
        Ok(())
    }

    /// The staged release must hash to the submitted `release_sha256`.
    pub async fn validate_release_sha(
        &self,
        release: &Release,
        identity: &ReleaseIdentity,
    ) -> DeployResult<()> {
        let staged: Release = self
            .blobs
            .get_struct(identity.bucket(), &identity.paths().staged_release)
            .await?;
        let expected = staged.compute_sha256()?;

        if release.release_sha256 != expected {
            return Err(DeployError::SelfHashMismatch {
                expected,
                actual: release.release_sha256.clone(),
            });
        }

        debug!(
            release = %identity.paths().staged_release,
            sha256 = %expected,
            "release hash valid"
        );
        Ok(())
    }
}
