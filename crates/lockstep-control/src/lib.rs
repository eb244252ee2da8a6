//! Lockstep release control
//!
//! This crate decides whether a proposed release is well formed and
//! authorised, serialises concurrent deployments of the same target, and
//! pushes a function artifact and a workflow definition once both have been
//! verified against their staged copies.
//!
//! # Pipeline
//!
//! A deployment attempt moves through a typestate enforced at compile time:
//!
//! ```text
//! Validated ──grab_lock──▶ Locked ──unlock──▶ Released
//!     │                      │
//!     ▼                      ▼
//! Contended        revalidate, deploy_function, deploy_workflow
//! ```
//!
//! Deploying is only possible on an [`Attempt<Locked>`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use lockstep_control::{
//!     DeployerConfig, MemoryFunctions, MemoryWorkflows, ReleaseDeployer,
//!     StatesLanguageValidator,
//! };
//! use lockstep_state::ObjectBlobStore;
//!
//! let deployer = ReleaseDeployer::new(
//!     Arc::new(ObjectBlobStore::in_memory()),
//!     Arc::new(MemoryFunctions::new()),
//!     Arc::new(MemoryWorkflows::new()),
//!     Arc::new(StatesLanguageValidator),
//!     DeployerConfig::default(),
//! );
//!
//! let outcome = deployer.deploy(&mut release).await?;
//! ```

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod cloud;
pub mod config;
pub mod definition;
pub mod deployment;
pub mod error;
pub mod identity;
pub mod request;
pub mod resources;
pub mod state;
pub mod types;
pub mod validation;

pub use cloud::{FunctionApi, MemoryFunctions, MemoryWorkflows, WorkflowApi, WorkflowDescription};
pub use config::{DefaultsConfig, DeployerConfig};
pub use definition::{
    pretty_definition, DefinitionError, DefinitionValidator, StatesLanguageValidator,
};
pub use deployment::{Outcome, ReleaseDeployer, Stager};
pub use error::{ApiError, DeployError, DeployResult, ErrorKind};
pub use identity::{ReleaseIdentity, ReleasePaths, DEPLOY_WITH};
pub use resources::ResourceValidator;
pub use state::{Attempt, AttemptState, Grab, Locked, Released, Validated};
pub use types::{Release, ReleaseError, ReleaseStatus, DEFAULT_BUCKET_PREFIX};
pub use validation::Freshness;
