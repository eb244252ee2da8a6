//! Release deployment orchestration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lockstep_state::BlobStore;
use tracing::{error, info, warn};

use crate::cloud::{FunctionApi, WorkflowApi};
use crate::config::DeployerConfig;
use crate::definition::DefinitionValidator;
use crate::error::{DeployError, DeployResult, ErrorKind};
use crate::resources::ResourceValidator;
use crate::state::{Attempt, Grab, Locked};
use crate::types::{Release, ReleaseStatus};

/// How a deployment attempt ended when no error was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The function and the workflow were updated.
    Deployed,
    /// Another deployment for the same project and config holds the lock.
    Contended,
}

/// Validates, locks and deploys releases.
pub struct ReleaseDeployer {
    blobs: Arc<dyn BlobStore>,
    functions: Arc<dyn FunctionApi>,
    workflows: Arc<dyn WorkflowApi>,
    definitions: Arc<dyn DefinitionValidator>,
    config: DeployerConfig,
}

impl ReleaseDeployer {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        functions: Arc<dyn FunctionApi>,
        workflows: Arc<dyn WorkflowApi>,
        definitions: Arc<dyn DefinitionValidator>,
        config: DeployerConfig,
    ) -> Self {
        Self {
            blobs,
            functions,
            workflows,
            definitions,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DeployerConfig {
        &self.config
    }

    /// Deploy `release`, recording the terminal outcome on it.
    ///
    /// 1. Fill in defaults
    /// 2. Validate attributes
    /// 3. Validate resources (fast rejection before locking)
    /// 4. Take the lock
    /// 5. Validate resources again inside the lock
    /// 6. Deploy the function, then the workflow
    /// 7. Release the lock
    pub async fn deploy(&self, release: &mut Release) -> DeployResult<Outcome> {
        self.deploy_at(release, Utc::now()).await
    }

    /// [`Self::deploy`] with an explicit clock for the freshness check.
    pub async fn deploy_at(
        &self,
        release: &mut Release,
        now: DateTime<Utc>,
    ) -> DeployResult<Outcome> {
        let defaults = &self.config.defaults;
        release.set_defaults(
            defaults.region.as_deref(),
            defaults.account_id.as_deref(),
            &defaults.bucket_prefix,
        );

        match self.run(release, now).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if release.status() != ReleaseStatus::Succeeded {
                    release.record_failure(e.kind(), e.to_string());
                }
                error!(
                    uuid = release.uuid.as_deref().unwrap_or_default(),
                    kind = %e.kind(),
                    error = %e,
                    "deployment failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, release: &mut Release, now: DateTime<Utc>) -> DeployResult<Outcome> {
        let identity =
            release.validate_attributes(self.definitions.as_ref(), now, &self.config.freshness)?;

        info!(
            uuid = %identity.uuid(),
            release_id = %identity.release_id(),
            project = %identity.project_name(),
            config = %identity.config_name(),
            "deploying release"
        );

        let validator = self.validator();
        validator.validate_resources(release, &identity).await?;

        let locked = match Attempt::new(identity)
            .grab_lock(self.blobs.as_ref(), &self.config.lock)
            .await?
        {
            Grab::Locked(locked) => locked,
            Grab::Contended(attempt) => {
                let lock = &attempt.identity().paths().lock;
                warn!(
                    uuid = %attempt.identity().uuid(),
                    lock = %lock,
                    "deployment already in progress"
                );
                release.record_failure(
                    ErrorKind::LockContended,
                    format!("lock {lock} held by another deployment"),
                );
                return Ok(Outcome::Contended);
            }
        };

        let deployed = self.deploy_locked(&locked, &validator, release).await;
        let lock = locked.identity().paths().lock.clone();
        let unlocked = locked.unlock(self.blobs.as_ref()).await;

        match (deployed, unlocked) {
            (Ok(()), Ok(_)) => {
                release.record_success();
                info!(uuid = release.uuid.as_deref().unwrap_or_default(), "release deployed");
                Ok(Outcome::Deployed)
            }
            (Ok(()), Err(e)) => {
                release.record_success();
                release.record_error(e.kind(), e.to_string());
                error!(lock = %lock, error = %e, "release deployed but lock release failed");
                Err(e)
            }
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(unlock)) => {
                error!(
                    lock = %lock,
                    error = %unlock,
                    "lock release failed after failed deployment"
                );
                Err(e)
            }
        }
    }

    async fn deploy_locked(
        &self,
        locked: &Attempt<Locked>,
        validator: &ResourceValidator<'_>,
        release: &Release,
    ) -> DeployResult<()> {
        locked.revalidate(validator, release).await?;

        locked
            .deploy_function(self.blobs.as_ref(), self.functions.as_ref())
            .await?;

        locked
            .deploy_workflow(self.workflows.as_ref(), release)
            .await
            .map_err(|e| DeployError::PartialDeployment {
                completed: locked.identity().function_arn(),
                failed: locked.identity().workflow_arn(),
                source: Box::new(e),
            })
    }

    fn validator(&self) -> ResourceValidator<'_> {
        ResourceValidator::new(
            self.blobs.as_ref(),
            self.functions.as_ref(),
            self.workflows.as_ref(),
        )
    }
}
