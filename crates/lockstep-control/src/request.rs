//! Requests sent to the function and workflow services.
//!
//! Building these from a release and validating them before any network call
//! catches malformed names and addresses early.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;

use crate::definition::MAX_DEFINITION_BYTES;
use crate::error::{DeployError, DeployResult};

/// Maximum size of an inline function code upload.
pub const MAX_ZIP_BYTES: usize = 50 * 1024 * 1024;

static FUNCTION_ARN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:lambda:[a-z]{2}(-[a-z]+)+-\d:\d{12}:function:[A-Za-z0-9_-]{1,64}$")
        .ok()
});

static WORKFLOW_ARN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^arn:aws[a-z-]*:states:[a-z]{2}(-[a-z]+)+-\d:\d{12}:stateMachine:[A-Za-z0-9_-]{1,80}$",
    )
    .ok()
});

fn check_arn(
    pattern: &LazyLock<Option<Regex>>,
    request: &'static str,
    arn: &str,
) -> DeployResult<()> {
    let Some(re) = pattern.as_ref() else {
        return Err(DeployError::malformed(request, "ARN pattern unavailable"));
    };
    if re.is_match(arn) {
        Ok(())
    } else {
        Err(DeployError::malformed(request, format!("invalid ARN '{arn}'")))
    }
}

/// Replace a function's code with a zip archive.
#[derive(Debug, Clone)]
pub struct UpdateCodeRequest {
    pub function_arn: String,
    pub zip: Bytes,
}

impl UpdateCodeRequest {
    pub const NAME: &'static str = "update_function_code";

    #[must_use]
    pub fn new(function_arn: impl Into<String>, zip: Bytes) -> Self {
        Self {
            function_arn: function_arn.into(),
            zip,
        }
    }

    /// Check the request would be accepted by the function service.
    ///
    /// An empty zip is allowed here: validation happens before the artifact
    /// is fetched.
    pub fn validate(&self) -> DeployResult<()> {
        check_arn(&FUNCTION_ARN_PATTERN, Self::NAME, &self.function_arn)?;
        if self.zip.len() > MAX_ZIP_BYTES {
            return Err(DeployError::malformed(
                Self::NAME,
                format!("zip is {} bytes, limit {MAX_ZIP_BYTES}", self.zip.len()),
            ));
        }
        Ok(())
    }
}

/// Replace a workflow's definition.
#[derive(Debug, Clone)]
pub struct UpdateDefinitionRequest {
    pub workflow_arn: String,
    pub definition: String,
}

impl UpdateDefinitionRequest {
    pub const NAME: &'static str = "update_state_machine";

    #[must_use]
    pub fn new(workflow_arn: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            workflow_arn: workflow_arn.into(),
            definition: definition.into(),
        }
    }

    /// Check the request would be accepted by the workflow service.
    pub fn validate(&self) -> DeployResult<()> {
        check_arn(&WORKFLOW_ARN_PATTERN, Self::NAME, &self.workflow_arn)?;
        let len = self.definition.len();
        if len == 0 || len > MAX_DEFINITION_BYTES {
            return Err(DeployError::malformed(
                Self::NAME,
                format!("definition is {len} bytes, must be 1..={MAX_DEFINITION_BYTES}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::{function_arn, workflow_arn};

    #[test]
    fn accepts_well_formed_requests() {
        let code = UpdateCodeRequest::new(
            function_arn("us-east-1", "000000000000", "my-function_1"),
            Bytes::new(),
        );
        assert!(code.validate().is_ok());

        let definition = UpdateDefinitionRequest::new(
            workflow_arn("eu-west-2", "000000000000", "my-workflow"),
            "{}",
        );
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn rejects_bad_function_names() {
        let long = "f".repeat(65);
        for name in ["has space", "dots.bad", long.as_str()] {
            let arn = function_arn("us-east-1", "000000000000", name);
            let request = UpdateCodeRequest::new(arn, Bytes::new());
            let err = request.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedRequest, "{name}");
        }
    }

    #[test]
    fn rejects_bad_accounts_and_regions() {
        let request = UpdateCodeRequest::new(function_arn("us-east-1", "1234", "fn"), Bytes::new());
        assert!(request.validate().is_err());

        let request =
            UpdateDefinitionRequest::new(workflow_arn("nowhere", "000000000000", "wf"), "{}");
        assert!(request.validate().is_err());
    }

    #[test]
    fn workflow_names_may_be_longer_than_function_names() {
        let name = "w".repeat(80);
        let request =
            UpdateDefinitionRequest::new(workflow_arn("us-east-1", "000000000000", &name), "{}");
        assert!(request.validate().is_ok());

        let name = "w".repeat(81);
        let request =
            UpdateDefinitionRequest::new(workflow_arn("us-east-1", "000000000000", &name), "{}");
        assert!(request.validate().is_err());
    }

    #[test]
    fn rejects_empty_definition() {
        let request =
            UpdateDefinitionRequest::new(workflow_arn("us-east-1", "000000000000", "wf"), "");
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("definition is 0 bytes"));
    }
}
