//! Function and workflow service APIs.
//!
//! The deployer talks to the compute-function service and the workflow engine
//! only through these traits. [`MemoryFunctions`] and [`MemoryWorkflows`]
//! back tests and local runs.

mod memory;

pub use memory::{MemoryFunctions, MemoryWorkflows};

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ApiError;

/// Result type alias using [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

/// Live description of a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDescription {
    pub arn: String,
    /// ARN of the role the workflow executes as.
    pub role_arn: String,
}

/// Compute-function management.
#[async_trait]
pub trait FunctionApi: Send + Sync {
    /// Replace the code of the function at `arn` with a zip archive.
    async fn update_code(&self, arn: &str, zip: Bytes) -> ApiResult<()>;

    /// Tags currently set on the function at `arn`.
    async fn list_tags(&self, arn: &str) -> ApiResult<HashMap<String, String>>;
}

/// Workflow engine management.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Replace the definition of the workflow at `arn`.
    async fn update_definition(&self, arn: &str, definition: &str) -> ApiResult<()>;

    async fn describe(&self, arn: &str) -> ApiResult<WorkflowDescription>;
}
