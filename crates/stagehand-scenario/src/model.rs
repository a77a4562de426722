//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Scenario definitions and execution result trees."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
//! Value types shared by discovery, the engine, and the history store.
//!
//! Field names follow the camelCase JSON layout of the scenario files and the
//! persisted history document.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stagehand_common::elapsed_millis;

fn default_version() -> String {
    "1.0".to_owned()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One named action dispatched against the target system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub task: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "is_false")]
    pub should_fail: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_error: Option<String>,
}

impl OperationStep {
    pub fn new(task: impl Into<String>, params: Value) -> Self {
        Self {
            description: None,
            task: task.into(),
            params,
            should_fail: false,
            expected_error: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Require the dispatch to fail, optionally with a message containing `expected`.
    pub fn expect_failure(mut self, expected: Option<&str>) -> Self {
        self.should_fail = true;
        self.expected_error = expected.map(str::to_owned);
        self
    }

    /// Label used for the resulting [`ScenarioStep`].
    pub fn label(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| self.task.clone())
    }
}

/// A named, ordered list of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<OperationStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Execution settings carried by the schema. None of them are consulted by
/// the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Value>,
}

/// A task invocation run before or after the scenario body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub task: String,
    #[serde(default)]
    pub params: Value,
}

impl Hook {
    pub fn new(task: impl Into<String>, params: Value) -> Self {
        Self {
            task: task.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupHooks {
    #[serde(default)]
    pub before: Vec<Hook>,
    #[serde(default)]
    pub after: Vec<Hook>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSetup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contracts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<Value>,
    #[serde(default)]
    pub hooks: SetupHooks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTeardown {
    #[serde(default)]
    pub hooks: Vec<Hook>,
}

/// A complete scenario bundle: metadata, setup, ordered bodies, teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedScenario {
    #[serde(default = "default_version")]
    pub version: String,
    pub metadata: ScenarioMetadata,
    #[serde(default)]
    pub config: ScenarioConfig,
    #[serde(default)]
    pub setup: ScenarioSetup,
    #[serde(default)]
    pub scenarios: Vec<ScenarioDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown: Option<ScenarioTeardown>,
}

impl EnhancedScenario {
    /// Wrap a bare definition into a bundle without setup or teardown.
    pub fn from_definition(definition: ScenarioDefinition) -> Self {
        Self {
            version: default_version(),
            metadata: ScenarioMetadata {
                name: definition.name.clone(),
                description: definition.description.clone(),
                tags: Vec::new(),
            },
            config: ScenarioConfig::default(),
            setup: ScenarioSetup::default(),
            scenarios: vec![definition],
            teardown: None,
        }
    }

    /// Interpret a parsed document as either a full bundle (has `scenarios`)
    /// or a bare definition (has `steps`).
    pub fn from_document(document: Value) -> Result<Self, serde_json::Error> {
        let Some(object) = document.as_object() else {
            return Err(serde_json::Error::custom(
                "scenario document must be an object",
            ));
        };
        if object.contains_key("scenarios") || object.contains_key("metadata") {
            serde_json::from_value(document)
        } else if object.contains_key("steps") {
            serde_json::from_value::<ScenarioDefinition>(document).map(Self::from_definition)
        } else {
            Err(serde_json::Error::custom(
                "expected `scenarios` (enhanced scenario) or `steps` (simple scenario)",
            ))
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Iterate over every operation in body order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationStep> {
        self.scenarios.iter().flat_map(|scenario| scenario.steps.iter())
    }

    pub fn teardown_hooks(&self) -> &[Hook] {
        self.teardown
            .as_ref()
            .map(|teardown| teardown.hooks.as_slice())
            .unwrap_or_default()
    }
}

/// Status of a step or scenario result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Passed,
    Failed,
    Pending,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Pending => "pending",
        }
    }
}

/// Outcome of a single executed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub description: String,
    pub status: RunStatus,
    /// Wall-clock span of the dispatch attempt in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result tree for one scenario bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub name: String,
    pub status: RunStatus,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl ScenarioResult {
    /// A result that has started but holds no steps yet.
    pub fn running(name: impl Into<String>) -> Self {
        Self::with_status(name, RunStatus::Running)
    }

    /// A result for a scenario that never started.
    pub fn pending(name: impl Into<String>) -> Self {
        Self::with_status(name, RunStatus::Pending)
    }

    fn with_status(name: impl Into<String>, status: RunStatus) -> Self {
        Self {
            name: name.into(),
            status,
            steps: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            duration: None,
        }
    }

    pub fn has_failed_step(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.status == RunStatus::Failed)
    }

    /// Close the result: stamp the end time and derive the terminal status
    /// from the recorded steps.
    pub fn finish(&mut self) {
        let end = Utc::now();
        self.end_time = Some(end);
        self.duration = Some(elapsed_millis(self.start_time, end));
        self.status = if self.has_failed_step() {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };
    }
}

/// Status of a whole batch execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Pending,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Pending => "pending",
        }
    }
}

/// Per-status scenario counts. `total` always equals the sum of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
}

impl ExecutionSummary {
    /// Summary of a batch whose scenarios have all just started.
    pub fn started(total: usize) -> Self {
        Self {
            total,
            running: total,
            ..Self::default()
        }
    }

    pub fn from_results(results: &[ScenarioResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            match result.status {
                RunStatus::Passed => summary.passed += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::Running => summary.running += 1,
                RunStatus::Pending => summary.pending += 1,
            }
            summary
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.passed + self.failed + self.running + self.pending
    }
}

/// One batch request and its results, as kept by the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioExecution {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub summary: ExecutionSummary,
    #[serde(default)]
    pub scenarios: Vec<ScenarioResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Why the batch stopped early, when a hook aborted it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioExecution {
    /// Placeholder record written when a batch starts.
    pub fn started<S: AsRef<str>>(id: impl Into<String>, names: &[S]) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            status: ExecutionStatus::Running,
            summary: ExecutionSummary::started(names.len()),
            scenarios: names
                .iter()
                .map(|name| ScenarioResult::running(name.as_ref()))
                .collect(),
            duration: None,
            error: None,
        }
    }

    /// Replace the scenario results and derive summary, status, and duration.
    pub fn complete(&mut self, results: Vec<ScenarioResult>, error: Option<String>) {
        self.summary = ExecutionSummary::from_results(&results);
        self.status = if error.is_some() || self.summary.failed > 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        self.scenarios = results;
        self.duration = Some(elapsed_millis(self.timestamp, Utc::now()));
        self.error = error;
    }
}
