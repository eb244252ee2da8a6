//! Workflow definition validation.
//!
//! Definitions are JSON state machines in the Amazon States Language shape.
//! The deployer only needs a yes/no answer with a readable reason, so the
//! validator is a trait; [`StatesLanguageValidator`] performs the structural
//! checks that catch the usual authoring mistakes before anything is pushed.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Maximum size of a definition accepted by the workflow service.
pub const MAX_DEFINITION_BYTES: usize = 1024 * 1024;

/// A workflow definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {message}")]
pub struct DefinitionError {
    /// Where in the definition the problem is (e.g. `States.Deploy.Next`).
    pub location: String,
    /// What is wrong.
    pub message: String,
}

impl DefinitionError {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Validates workflow definition text.
pub trait DefinitionValidator: Send + Sync {
    /// Check `definition`, returning the first problem found.
    fn validate(&self, definition: &str) -> Result<(), DefinitionError>;
}

/// Structural validator for States Language definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatesLanguageValidator;

impl DefinitionValidator for StatesLanguageValidator {
    fn validate(&self, definition: &str) -> Result<(), DefinitionError> {
        let value: Value = serde_json::from_str(definition)
            .map_err(|e| DefinitionError::new("$", format!("invalid JSON: {e}")))?;
        validate_machine(&value, "$")
    }
}

/// Re-serialise `definition` pretty-printed, or return it unchanged if it is
/// not valid JSON.
#[must_use]
pub fn pretty_definition(definition: &str) -> String {
    serde_json::from_str::<Value>(definition)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| definition.to_owned())
}

const STATE_TYPES: [&str; 8] = [
    "Pass", "Task", "Choice", "Wait", "Succeed", "Fail", "Parallel", "Map",
];

const WAIT_FIELDS: [&str; 4] = ["Seconds", "Timestamp", "SecondsPath", "TimestampPath"];

fn validate_machine(value: &Value, location: &str) -> Result<(), DefinitionError> {
    let machine = value
        .as_object()
        .ok_or_else(|| DefinitionError::new(location, "state machine must be an object"))?;

    let start_at = machine
        .get("StartAt")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DefinitionError::new(location, "StartAt must be a non-empty string"))?;

    let states = machine
        .get("States")
        .and_then(Value::as_object)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DefinitionError::new(location, "States must be a non-empty object"))?;

    let names: HashSet<&str> = states.keys().map(String::as_str).collect();

    if !names.contains(start_at) {
        return Err(DefinitionError::new(
            format!("{location}.StartAt"),
            format!("unknown state '{start_at}'"),
        ));
    }

    for (name, state) in states {
        let at = format!("{location}.States.{name}");
        if name.is_empty() || name.len() > 80 {
            return Err(DefinitionError::new(at, "state name must be 1-80 characters"));
        }
        validate_state(state, &at, &names)?;
    }

    Ok(())
}

fn validate_state(value: &Value, at: &str, names: &HashSet<&str>) -> Result<(), DefinitionError> {
    let state = value
        .as_object()
        .ok_or_else(|| DefinitionError::new(at, "state must be an object"))?;

    let state_type = state
        .get("Type")
        .and_then(Value::as_str)
        .ok_or_else(|| DefinitionError::new(at, "Type must be a string"))?;

    if !STATE_TYPES.contains(&state_type) {
        return Err(DefinitionError::new(
            format!("{at}.Type"),
            format!("unknown state type '{state_type}'"),
        ));
    }

    if let Some(next) = state.get("Next") {
        check_target(next, &format!("{at}.Next"), names)?;
    }

    match state_type {
        "Choice" => validate_choice(state, at, names)?,
        "Succeed" | "Fail" => {
            if state.contains_key("Next") || state.contains_key("End") {
                return Err(DefinitionError::new(
                    at,
                    format!("{state_type} state cannot have Next or End"),
                ));
            }
        }
        _ => {
            validate_transition(state, at)?;
            match state_type {
                "Task" => {
                    if state.get("Resource").and_then(Value::as_str).is_none() {
                        return Err(DefinitionError::new(at, "Task state requires Resource"));
                    }
                }
                "Wait" => {
                    let count = WAIT_FIELDS.iter().filter(|f| state.contains_key(**f)).count();
                    if count != 1 {
                        return Err(DefinitionError::new(
                            at,
                            "Wait state requires exactly one of \
                             Seconds, Timestamp, SecondsPath, TimestampPath",
                        ));
                    }
                }
                "Parallel" => validate_branches(state, at)?,
                "Map" => validate_iterator(state, at)?,
                _ => {}
            }
        }
    }

    if let Some(catchers) = state.get("Catch") {
        let catchers = catchers
            .as_array()
            .ok_or_else(|| DefinitionError::new(format!("{at}.Catch"), "Catch must be an array"))?;
        for (i, catcher) in catchers.iter().enumerate() {
            let next = catcher.get("Next").ok_or_else(|| {
                DefinitionError::new(format!("{at}.Catch[{i}]"), "catcher requires Next")
            })?;
            check_target(next, &format!("{at}.Catch[{i}].Next"), names)?;
        }
    }

    Ok(())
}

fn validate_transition(state: &Map<String, Value>, at: &str) -> Result<(), DefinitionError> {
    let has_next = state.contains_key("Next");
    let is_end = state.get("End").and_then(Value::as_bool).unwrap_or(false);

    match (has_next, is_end) {
        (true, false) | (false, true) => Ok(()),
        (true, true) => Err(DefinitionError::new(at, "state cannot have both Next and End")),
        (false, false) => Err(DefinitionError::new(at, "state requires Next or End")),
    }
}

fn validate_choice(
    state: &Map<String, Value>,
    at: &str,
    names: &HashSet<&str>,
) -> Result<(), DefinitionError> {
    if state.contains_key("Next") || state.contains_key("End") {
        return Err(DefinitionError::new(at, "Choice state cannot have Next or End"));
    }

    let choices = state
        .get("Choices")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            DefinitionError::new(at, "Choice state requires a non-empty Choices array")
        })?;

    for (i, choice) in choices.iter().enumerate() {
        let next = choice.get("Next").ok_or_else(|| {
            DefinitionError::new(format!("{at}.Choices[{i}]"), "choice rule requires Next")
        })?;
        check_target(next, &format!("{at}.Choices[{i}].Next"), names)?;
    }

    if let Some(default) = state.get("Default") {
        check_target(default, &format!("{at}.Default"), names)?;
    }

    Ok(())
}

fn validate_branches(state: &Map<String, Value>, at: &str) -> Result<(), DefinitionError> {
    let branches = state
        .get("Branches")
        .and_then(Value::as_array)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| {
            DefinitionError::new(at, "Parallel state requires a non-empty Branches array")
        })?;

    for (i, branch) in branches.iter().enumerate() {
        validate_machine(branch, &format!("{at}.Branches[{i}]"))?;
    }
    Ok(())
}

fn validate_iterator(state: &Map<String, Value>, at: &str) -> Result<(), DefinitionError> {
    let (key, iterator) = ["ItemProcessor", "Iterator"]
        .iter()
        .find_map(|k| state.get(*k).map(|v| (*k, v)))
        .ok_or_else(|| DefinitionError::new(at, "Map state requires ItemProcessor or Iterator"))?;

    validate_machine(iterator, &format!("{at}.{key}"))
}

fn check_target(target: &Value, at: &str, names: &HashSet<&str>) -> Result<(), DefinitionError> {
    let name = target
        .as_str()
        .ok_or_else(|| DefinitionError::new(at, "transition target must be a string"))?;

    if names.contains(name) {
        Ok(())
    } else {
        Err(DefinitionError::new(at, format!("unknown state '{name}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn check(definition: &str) -> Result<(), DefinitionError> {
        StatesLanguageValidator.validate(definition)
    }

    const MINIMAL: &str =
        r#"{"StartAt": "Hello", "States": {"Hello": {"Type": "Pass", "End": true}}}"#;

    #[test]
    fn accepts_minimal_machine() {
        assert_eq!(check(MINIMAL), Ok(()));
    }

    #[test]
    fn accepts_task_choice_and_catch() {
        let definition = r#"{
            "StartAt": "Validate",
            "States": {
                "Validate": {
                    "Type": "Task",
                    "Resource": "arn:aws:lambda:us-east-1:000000000000:function:fn",
                    "Next": "Decide",
                    "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Failed"}]
                },
                "Decide": {
                    "Type": "Choice",
                    "Choices": [{"Variable": "$.ok", "BooleanEquals": true, "Next": "Wait"}],
                    "Default": "Failed"
                },
                "Wait": {"Type": "Wait", "Seconds": 5, "Next": "Done"},
                "Done": {"Type": "Succeed"},
                "Failed": {"Type": "Fail", "Error": "Boom"}
            }
        }"#;
        assert_eq!(check(definition), Ok(()));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = check("{not json").unwrap_err();
        assert!(err.message.starts_with("invalid JSON"));
    }

    #[test]
    fn rejects_unknown_start() {
        let err = check(r#"{"StartAt": "Nope", "States": {"A": {"Type": "Pass", "End": true}}}"#)
            .unwrap_err();
        assert_eq!(err.location, "$.StartAt");
    }

    #[test]
    fn rejects_dangling_next() {
        let err = check(r#"{"StartAt": "A", "States": {"A": {"Type": "Pass", "Next": "B"}}}"#)
            .unwrap_err();
        assert_eq!(err.location, "$.States.A.Next");
        assert!(err.message.contains("'B'"));
    }

    #[test]
    fn rejects_state_without_transition() {
        let err =
            check(r#"{"StartAt": "A", "States": {"A": {"Type": "Pass"}}}"#).unwrap_err();
        assert_eq!(err.message, "state requires Next or End");
    }

    #[test]
    fn rejects_unknown_type() {
        let err = check(r#"{"StartAt": "A", "States": {"A": {"Type": "Sleep", "End": true}}}"#)
            .unwrap_err();
        assert_eq!(err.location, "$.States.A.Type");
    }

    #[test]
    fn rejects_task_without_resource() {
        let err = check(r#"{"StartAt": "A", "States": {"A": {"Type": "Task", "End": true}}}"#)
            .unwrap_err();
        assert_eq!(err.message, "Task state requires Resource");
    }

    #[test]
    fn validates_parallel_branches() {
        let definition = r#"{
            "StartAt": "P",
            "States": {
                "P": {
                    "Type": "Parallel",
                    "End": true,
                    "Branches": [{"StartAt": "X", "States": {"X": {"Type": "Pass", "Next": "Y"}}}]
                }
            }
        }"#;
        let err = check(definition).unwrap_err();
        assert_eq!(err.location, "$.States.P.Branches[0].States.X.Next");
    }

    #[test]
    fn pretty_prints_valid_json_only() {
        assert!(pretty_definition(MINIMAL).contains("\n"));
        assert_eq!(pretty_definition("{oops"), "{oops");
    }
}
