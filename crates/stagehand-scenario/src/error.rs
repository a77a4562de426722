//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Error taxonomy for scenario loading, templating, and dispatch."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::ScenarioResult;

/// A scenario could not be located, read, or parsed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("scenario '{name}' not found")]
    NotFound { name: String },
    #[error("invalid scenario name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("failed to parse scenario {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("io error on scenario {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("scenario plugin '{name}' failed: {message}")]
    Plugin { name: String, message: String },
}

/// Placeholder substitution failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated placeholder in '{text}'")]
    Unterminated { text: String },
    #[error("empty placeholder in '{text}'")]
    Empty { text: String },
    #[error("malformed expression '{expression}'")]
    Malformed { expression: String },
    #[error("'{expression}' is not defined in the template context")]
    Undefined { expression: String },
}

/// A task raised an error while being dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DispatchError {
    pub message: String,
}

impl DispatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A step that was required to fail did fail, but not with the expected text.
/// Only ever rendered into a failed step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected error containing '{expected}', but got '{actual}'")]
pub struct ExpectationMismatch {
    pub expected: String,
    pub actual: String,
}

/// Which hook list a failing hook belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Setup,
    Teardown,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Setup => f.write_str("setup"),
            HookPhase::Teardown => f.write_str("teardown"),
        }
    }
}

/// A setup or teardown hook failed, aborting its scenario.
///
/// `partial` holds the scenario result as it stood when the hook failed,
/// closed with a failed step describing the hook.
#[derive(Debug, Error)]
#[error("{phase} hook '{task}' failed in scenario '{}': {source}", .partial.name)]
pub struct HookError {
    pub phase: HookPhase,
    pub task: String,
    #[source]
    pub source: DispatchError,
    pub partial: Box<ScenarioResult>,
}

/// A batch stopped at a failing hook. Results of scenarios that finished
/// before it are kept in `completed`.
#[derive(Debug, Error)]
#[error("batch aborted after {} completed scenario(s): {failure}", .completed.len())]
pub struct BatchAbort {
    pub completed: Vec<ScenarioResult>,
    #[source]
    pub failure: HookError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_quotes_both_messages() {
        let mismatch = ExpectationMismatch {
            expected: "foo".into(),
            actual: "bar".into(),
        };
        let text = mismatch.to_string();
        assert!(text.contains("'foo'"));
        assert!(text.contains("'bar'"));
    }

    #[test]
    fn parse_error_names_path() {
        let err = LoadError::Parse {
            path: PathBuf::from("scenarios/a.json"),
            message: "expected value at line 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse scenario scenarios/a.json: expected value at line 1"
        );
    }
}
