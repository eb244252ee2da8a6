//! In-memory function and workflow services for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ApiError;

use super::{ApiResult, FunctionApi, WorkflowApi, WorkflowDescription};

fn poisoned() -> ApiError {
    ApiError::Transport("lock poisoned".to_owned())
}

#[derive(Debug, Default)]
struct Calls {
    /// Queued failures, each consumed by one call.
    failures: HashMap<&'static str, Vec<ApiError>>,
    /// Calls made, successful or not.
    counts: HashMap<&'static str, usize>,
}

/// Per-operation call accounting shared by the memory services.
#[derive(Debug, Default)]
struct CallLog(RwLock<Calls>);

impl CallLog {
    fn push_failure(&self, operation: &'static str, error: ApiError) -> ApiResult<()> {
        self.0
            .write()
            .map_err(|_| poisoned())?
            .failures
            .entry(operation)
            .or_default()
            .push(error);
        Ok(())
    }

    /// Record a call to `operation`, failing it if a failure is queued.
    fn record(&self, operation: &'static str) -> ApiResult<()> {
        let mut calls = self.0.write().map_err(|_| poisoned())?;
        *calls.counts.entry(operation).or_default() += 1;
        match calls.failures.get_mut(operation).and_then(|queue| queue.pop()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn count(&self, operation: &str) -> ApiResult<usize> {
        let calls = self.0.read().map_err(|_| poisoned())?;
        Ok(calls.counts.get(operation).copied().unwrap_or(0))
    }
}

#[derive(Debug, Clone, Default)]
struct FunctionRecord {
    tags: HashMap<String, String>,
    code: Option<Bytes>,
    updates: usize,
}

/// In-memory compute-function service.
///
/// Functions must be registered with [`MemoryFunctions::with_function`];
/// calls against unknown ARNs fail with [`ApiError::NotFound`].
#[derive(Debug, Default)]
pub struct MemoryFunctions {
    functions: RwLock<HashMap<String, FunctionRecord>>,
    calls: CallLog,
}

impl MemoryFunctions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function with the given tags.
    #[must_use]
    pub fn with_function<I, K, V>(self, arn: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let record = FunctionRecord {
            tags: tags
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..FunctionRecord::default()
        };
        if let Ok(mut functions) = self.functions.write() {
            functions.insert(arn.into(), record);
        }
        self
    }

    /// Make the next call to `operation` (`update_code` or `list_tags`) fail.
    pub fn fail_next(&self, operation: &'static str, error: ApiError) -> ApiResult<()> {
        self.calls.push_failure(operation, error)
    }

    /// Code most recently uploaded to the function.
    pub fn code(&self, arn: &str) -> ApiResult<Option<Bytes>> {
        let functions = self.functions.read().map_err(|_| poisoned())?;
        Ok(functions.get(arn).and_then(|f| f.code.clone()))
    }

    /// Number of successful code updates.
    pub fn update_count(&self, arn: &str) -> ApiResult<usize> {
        let functions = self.functions.read().map_err(|_| poisoned())?;
        Ok(functions.get(arn).map_or(0, |f| f.updates))
    }

    /// Number of calls made to `operation`, including failed ones.
    pub fn calls(&self, operation: &str) -> ApiResult<usize> {
        self.calls.count(operation)
    }
}

#[async_trait]
impl FunctionApi for MemoryFunctions {
    async fn update_code(&self, arn: &str, zip: Bytes) -> ApiResult<()> {
        self.calls.record("update_code")?;

        let mut functions = self.functions.write().map_err(|_| poisoned())?;
        let function = functions
            .get_mut(arn)
            .ok_or_else(|| ApiError::NotFound(arn.to_owned()))?;

        function.code = Some(zip);
        function.updates += 1;
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> ApiResult<HashMap<String, String>> {
        self.calls.record("list_tags")?;

        let functions = self.functions.read().map_err(|_| poisoned())?;
        functions
            .get(arn)
            .map(|f| f.tags.clone())
            .ok_or_else(|| ApiError::NotFound(arn.to_owned()))
    }
}

#[derive(Debug, Clone, Default)]
struct WorkflowRecord {
    role_arn: String,
    definition: Option<String>,
    updates: usize,
}

/// In-memory workflow engine.
#[derive(Debug, Default)]
pub struct MemoryWorkflows {
    workflows: RwLock<HashMap<String, WorkflowRecord>>,
    calls: CallLog,
}

impl MemoryWorkflows {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow executing as `role_arn`.
    #[must_use]
    pub fn with_workflow(self, arn: impl Into<String>, role_arn: impl Into<String>) -> Self {
        let record = WorkflowRecord {
            role_arn: role_arn.into(),
            ..WorkflowRecord::default()
        };
        if let Ok(mut workflows) = self.workflows.write() {
            workflows.insert(arn.into(), record);
        }
        self
    }

    /// Make the next call to `operation` (`update_definition` or `describe`) fail.
    pub fn fail_next(&self, operation: &'static str, error: ApiError) -> ApiResult<()> {
        self.calls.push_failure(operation, error)
    }

    pub fn definition(&self, arn: &str) -> ApiResult<Option<String>> {
        let workflows = self.workflows.read().map_err(|_| poisoned())?;
        Ok(workflows.get(arn).and_then(|w| w.definition.clone()))
    }

    pub fn update_count(&self, arn: &str) -> ApiResult<usize> {
        let workflows = self.workflows.read().map_err(|_| poisoned())?;
        Ok(workflows.get(arn).map_or(0, |w| w.updates))
    }

    /// Number of calls made to `operation`, including failed ones.
    pub fn calls(&self, operation: &str) -> ApiResult<usize> {
        self.calls.count(operation)
    }
}

#[async_trait]
impl WorkflowApi for MemoryWorkflows {
    async fn update_definition(&self, arn: &str, definition: &str) -> ApiResult<()> {
        self.calls.record("update_definition")?;

        let mut workflows = self.workflows.write().map_err(|_| poisoned())?;
        let workflow = workflows
            .get_mut(arn)
            .ok_or_else(|| ApiError::NotFound(arn.to_owned()))?;

        workflow.definition = Some(definition.to_owned());
        workflow.updates += 1;
        Ok(())
    }

    async fn describe(&self, arn: &str) -> ApiResult<WorkflowDescription> {
        self.calls.record("describe")?;

        let workflows = self.workflows.read().map_err(|_| poisoned())?;
        workflows
            .get(arn)
            .map(|w| WorkflowDescription {
                arn: arn.to_owned(),
                role_arn: w.role_arn.clone(),
            })
            .ok_or_else(|| ApiError::NotFound(arn.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FN: &str = "arn:aws:lambda:us-east-1:000000000000:function:fn";
    const WF: &str = "arn:aws:states:us-east-1:000000000000:stateMachine:wf";

    #[tokio::test]
    async fn functions_record_updates() {
        let functions = MemoryFunctions::new().with_function(FN, [("ProjectName", "p1")]);

        let tags = functions.list_tags(FN).await.unwrap();
        assert_eq!(tags.get("ProjectName").map(String::as_str), Some("p1"));

        functions.update_code(FN, Bytes::from_static(b"zip")).await.unwrap();
        assert_eq!(functions.code(FN).unwrap().unwrap().as_ref(), b"zip");
        assert_eq!(functions.update_count(FN).unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_function_is_not_found() {
        let functions = MemoryFunctions::new();
        let err = functions.list_tags(FN).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let workflows =
            MemoryWorkflows::new().with_workflow(WF, "arn:aws:iam::000000000000:role/r");
        workflows
            .fail_next("update_definition", ApiError::AccessDenied("no".to_owned()))
            .unwrap();

        assert!(workflows.update_definition(WF, "{}").await.is_err());
        assert_eq!(workflows.update_count(WF).unwrap(), 0);

        workflows.update_definition(WF, "{}").await.unwrap();
        assert_eq!(workflows.definition(WF).unwrap().as_deref(), Some("{}"));
        assert_eq!(workflows.calls("update_definition").unwrap(), 2);
    }

    #[tokio::test]
    async fn calls_are_counted_per_operation() {
        let functions = MemoryFunctions::new().with_function(FN, [("ProjectName", "p1")]);
        assert_eq!(functions.calls("list_tags").unwrap(), 0);

        functions.list_tags(FN).await.unwrap();
        functions.list_tags("arn:unknown").await.unwrap_err();
        functions.update_code(FN, Bytes::from_static(b"zip")).await.unwrap();

        assert_eq!(functions.calls("list_tags").unwrap(), 2);
        assert_eq!(functions.calls("update_code").unwrap(), 1);
        assert_eq!(functions.calls("describe").unwrap(), 0);
    }

    #[tokio::test]
    async fn describe_returns_role() {
        let role = "arn:aws:iam::000000000000:role/step/p1/c1/role";
        let workflows = MemoryWorkflows::new().with_workflow(WF, role);
        let description = workflows.describe(WF).await.unwrap();
        assert_eq!(description.role_arn, role);
    }
}
