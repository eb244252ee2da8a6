//! Typestate for a single deployment attempt.
//!
//! The lock discipline is encoded in the type system: the deploy operations
//! exist only on [`Attempt<Locked>`], which can only be obtained by taking the
//! lock, and unlocking consumes it.
//!
//! ```ignore
//! let attempt = Attempt::new(identity);
//! let Grab::Locked(locked) = attempt.grab_lock(blobs, &policy).await? else {
//!     return Ok(Outcome::Contended);
//! };
//! locked.deploy_function(blobs, functions).await?;
//! locked.unlock(blobs).await?;
//! // locked.deploy_function(..) would not compile here
//! ```

use std::marker::PhantomData;

use lockstep_state::{grab_lock_with, release_lock, BlobStore, LockAcquisition, LockPolicy};
use tracing::{debug, info};

use crate::cloud::{FunctionApi, WorkflowApi};
use crate::definition::pretty_definition;
use crate::error::{DeployError, DeployResult};
use crate::identity::ReleaseIdentity;
use crate::request::{UpdateCodeRequest, UpdateDefinitionRequest};
use crate::resources::ResourceValidator;
use crate::types::Release;

/// Marker trait for attempt states.
pub trait AttemptState: private::Sealed + Send + Sync {
    fn name() -> &'static str;
}

mod private {
    pub trait Sealed {}
}

/// Attributes validated, lock not yet taken.
#[derive(Debug, Clone, Copy)]
pub struct Validated;

/// Lock held by this attempt.
#[derive(Debug, Clone, Copy)]
pub struct Locked;

/// Lock given back.
#[derive(Debug, Clone, Copy)]
pub struct Released;

impl private::Sealed for Validated {}
impl private::Sealed for Locked {}
impl private::Sealed for Released {}

impl AttemptState for Validated {
    fn name() -> &'static str {
        "validated"
    }
}

impl AttemptState for Locked {
    fn name() -> &'static str {
        "locked"
    }
}

impl AttemptState for Released {
    fn name() -> &'static str {
        "released"
    }
}

/// A deployment attempt in state `S`.
///
/// The lock owner token is the release UUID.
#[derive(Debug)]
pub struct Attempt<S: AttemptState> {
    identity: ReleaseIdentity,
    _state: PhantomData<S>,
}

impl<S: AttemptState> Attempt<S> {
    #[must_use]
    pub const fn identity(&self) -> &ReleaseIdentity {
        &self.identity
    }

    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::name()
    }

    fn owner(&self) -> &str {
        self.identity.uuid()
    }

    fn transition<T: AttemptState>(self) -> Attempt<T> {
        Attempt {
            identity: self.identity,
            _state: PhantomData,
        }
    }
}

/// Result of trying to take the lock.
#[derive(Debug)]
pub enum Grab {
    /// The lock is held by this attempt.
    Locked(Attempt<Locked>),
    /// Another deployment holds the lock.
    Contended(Attempt<Validated>),
}

impl Attempt<Validated> {
    /// Start an attempt for a release whose attributes are valid.
    #[must_use]
    pub const fn new(identity: ReleaseIdentity) -> Self {
        Self {
            identity,
            _state: PhantomData,
        }
    }

    /// Take the lock for this release's project and config.
    pub async fn grab_lock(self, blobs: &dyn BlobStore, policy: &LockPolicy) -> DeployResult<Grab> {
        let acquisition = grab_lock_with(
            blobs,
            self.identity.bucket(),
            &self.identity.paths().lock,
            self.owner(),
            policy,
        )
        .await?;

        match acquisition {
            LockAcquisition::Acquired | LockAcquisition::Reclaimed => {
                Ok(Grab::Locked(self.transition()))
            }
            LockAcquisition::Held => Ok(Grab::Contended(self)),
        }
    }
}

impl Attempt<Locked> {
    /// Authoritative resource validation inside the lock window.
    pub async fn revalidate(
        &self,
        validator: &ResourceValidator<'_>,
        release: &Release,
    ) -> DeployResult<()> {
        validator.validate_resources(release, &self.identity).await
    }

    /// Push the staged artifact as the function's code.
    ///
    /// The artifact is fetched again rather than reusing the bytes that were
    /// hashed, as the function may live outside the staging account.
    pub async fn deploy_function(
        &self,
        blobs: &dyn BlobStore,
        functions: &dyn FunctionApi,
    ) -> DeployResult<()> {
        let zip = blobs
            .get(self.identity.bucket(), &self.identity.paths().artifact)
            .await?;

        let request = UpdateCodeRequest::new(self.identity.function_arn(), zip);
        request.validate()?;

        debug!(
            function = %request.function_arn,
            bytes = request.zip.len(),
            "updating function code"
        );
        functions
            .update_code(&request.function_arn, request.zip)
            .await
            .map_err(|e| DeployError::cloud(UpdateCodeRequest::NAME, e))?;

        info!(function = %request.function_arn, uuid = %self.owner(), "function code updated");
        Ok(())
    }

    /// Push the workflow definition, pretty-printed.
    pub async fn deploy_workflow(
        &self,
        workflows: &dyn WorkflowApi,
        release: &Release,
    ) -> DeployResult<()> {
        let definition = release
            .workflow_definition
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or(DeployError::MissingField {
                field: "workflow_definition",
            })?;

        let request = UpdateDefinitionRequest::new(
            self.identity.workflow_arn(),
            pretty_definition(definition),
        );
        request.validate()?;

        workflows
            .update_definition(&request.workflow_arn, &request.definition)
            .await
            .map_err(|e| DeployError::cloud(UpdateDefinitionRequest::NAME, e))?;

        info!(
            workflow = %request.workflow_arn,
            uuid = %self.owner(),
            "workflow definition updated"
        );
        Ok(())
    }

    /// Give the lock back.
    pub async fn unlock(self, blobs: &dyn BlobStore) -> DeployResult<Attempt<Released>> {
        release_lock(
            blobs,
            self.identity.bucket(),
            &self.identity.paths().lock,
            self.owner(),
        )
        .await?;
        Ok(self.transition())
    }
}
