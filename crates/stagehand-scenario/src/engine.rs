//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Sequential scenario execution with expected-failure semantics."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
//! Runs scenarios one step at a time against a [`TaskDispatcher`].
//!
//! Results and steps move `running -> passed | failed` and never leave a
//! terminal state. Step dispatch failures are recorded on the step; hook
//! failures abort the scenario and, inside a batch, every scenario after it.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use stagehand_common::duration_to_millis;
use stagehand_logging::{sh_debug, sh_info, sh_warn, LogContext};
use tracing::Instrument;

use crate::dispatch::TaskDispatcher;
use crate::error::{BatchAbort, DispatchError, ExpectationMismatch, HookError, HookPhase};
use crate::model::{EnhancedScenario, Hook, OperationStep, RunStatus, ScenarioResult, ScenarioStep};
use crate::template::{resolve_params, TemplateContext};

/// Executes scenarios sequentially through an injected dispatcher.
#[derive(Clone)]
pub struct ScenarioEngine {
    dispatcher: Arc<dyn TaskDispatcher>,
    context: TemplateContext,
}

impl std::fmt::Debug for ScenarioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioEngine")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl ScenarioEngine {
    pub fn new(dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        Self {
            dispatcher,
            context: TemplateContext::default(),
        }
    }

    /// Variables made available to `${...}` placeholders in step params.
    pub fn with_context(mut self, context: TemplateContext) -> Self {
        self.context = context;
        self
    }

    /// Run setup hooks, every operation, then teardown hooks.
    pub async fn run(&self, scenario: &EnhancedScenario) -> Result<ScenarioResult, HookError> {
        let span = tracing::info_span!("scenario", name = %scenario.name());
        self.run_inner(scenario).instrument(span).await
    }

    async fn run_inner(&self, scenario: &EnhancedScenario) -> Result<ScenarioResult, HookError> {
        let ctx = LogContext::new().with_scenario(scenario.name());
        let mut result = ScenarioResult::running(scenario.name());
        sh_info!(context = ctx, "scenario started");

        self.run_hooks(HookPhase::Setup, &scenario.setup.hooks.before, &mut result)
            .await?;

        for (index, operation) in scenario.operations().enumerate() {
            let step = self.execute_in(ctx.with_step(index), operation).await;
            result.steps.push(step);
        }

        self.run_hooks(HookPhase::Teardown, scenario.teardown_hooks(), &mut result)
            .await?;

        result.finish();
        sh_info!(
            context = ctx,
            "scenario {} in {}ms",
            result.status.as_str(),
            result.duration.unwrap_or_default()
        );
        Ok(result)
    }

    /// Run each scenario in order. The first hook failure stops the batch.
    pub async fn run_batch(
        &self,
        scenarios: &[EnhancedScenario],
    ) -> Result<Vec<ScenarioResult>, BatchAbort> {
        let mut completed = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            match self.run(scenario).await {
                Ok(result) => completed.push(result),
                Err(failure) => return Err(BatchAbort { completed, failure }),
            }
        }
        Ok(completed)
    }

    /// Resolve params, dispatch, and judge the outcome of one operation.
    pub async fn execute_step(&self, step: &OperationStep) -> ScenarioStep {
        self.execute_in(LogContext::new(), step).await
    }

    async fn execute_in(&self, ctx: LogContext<'_>, step: &OperationStep) -> ScenarioStep {
        let ctx = ctx.with_task(&step.task);
        let timestamp = Utc::now();
        let mut logs = Vec::new();

        let params = match resolve_params(&step.params, &self.context) {
            Ok(params) => params,
            Err(err) => {
                sh_warn!(context = ctx, "parameter templating failed: {err}");
                return ScenarioStep {
                    description: step.label(),
                    status: RunStatus::Failed,
                    duration: None,
                    logs,
                    error: Some(format!("parameter templating failed: {err}")),
                    timestamp,
                };
            }
        };

        logs.push(format!("dispatching task '{}'", step.task));
        let started = Instant::now();
        let outcome = self.dispatcher.dispatch(&step.task, &params).await;
        let duration = duration_to_millis(started.elapsed());

        let verdict = judge(step, outcome.as_ref());
        match &outcome {
            Ok(value) if !value.is_null() => logs.push(format!("result: {value}")),
            Ok(_) => {}
            Err(err) => logs.push(format!("task raised: {err}")),
        }
        if let Some(note) = verdict.note {
            logs.push(note);
        }
        sh_debug!(context = ctx, "step {} in {duration}ms", verdict.status.as_str());

        ScenarioStep {
            description: step.label(),
            status: verdict.status,
            duration: Some(duration),
            logs,
            error: verdict.error,
            timestamp,
        }
    }

    async fn run_hooks(
        &self,
        phase: HookPhase,
        hooks: &[Hook],
        result: &mut ScenarioResult,
    ) -> Result<(), HookError> {
        for hook in hooks {
            if let Err(source) = self.dispatcher.dispatch(&hook.task, &hook.params).await {
                let ctx = LogContext::new()
                    .with_scenario(&result.name)
                    .with_task(&hook.task);
                sh_warn!(context = ctx, "{phase} hook failed: {source}");
                return Err(abort(phase, hook, source, result));
            }
        }
        Ok(())
    }
}

/// Close `result` with a failed step describing the hook so the partial
/// result still satisfies "failed iff a step failed".
fn abort(
    phase: HookPhase,
    hook: &Hook,
    source: DispatchError,
    result: &mut ScenarioResult,
) -> HookError {
    let placeholder = ScenarioResult::running(result.name.clone());
    let mut partial = std::mem::replace(result, placeholder);
    partial.steps.push(ScenarioStep {
        description: format!("{phase} hook '{}'", hook.task),
        status: RunStatus::Failed,
        duration: None,
        logs: Vec::new(),
        error: Some(source.message.clone()),
        timestamp: Utc::now(),
    });
    partial.finish();
    HookError {
        phase,
        task: hook.task.clone(),
        source,
        partial: Box::new(partial),
    }
}

struct Verdict {
    status: RunStatus,
    error: Option<String>,
    note: Option<String>,
}

/// Decide a step's status from its expectations and the dispatch outcome.
fn judge(step: &OperationStep, outcome: Result<&Value, &DispatchError>) -> Verdict {
    match (outcome, step.should_fail) {
        (Ok(_), false) => Verdict {
            status: RunStatus::Passed,
            error: None,
            note: None,
        },
        (Ok(_), true) => Verdict {
            status: RunStatus::Failed,
            error: Some(format!(
                "operation '{}' was expected to fail, but it succeeded",
                step.task
            )),
            note: None,
        },
        (Err(err), false) => Verdict {
            status: RunStatus::Failed,
            error: Some(err.message.clone()),
            note: None,
        },
        (Err(err), true) => match step.expected_error.as_deref() {
            Some(expected) if !err.message.contains(expected) => Verdict {
                status: RunStatus::Failed,
                error: Some(
                    ExpectationMismatch {
                        expected: expected.to_owned(),
                        actual: err.message.clone(),
                    }
                    .to_string(),
                ),
                note: None,
            },
            _ => Verdict {
                status: RunStatus::Passed,
                error: None,
                note: Some(format!("operation failed as expected: {}", err.message)),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_without_expectation_passes() {
        let step = OperationStep::new("transfer", Value::Null);
        let verdict = judge(&step, Ok(&json!({"hash": "0x1"})));
        assert_eq!(verdict.status, RunStatus::Passed);
        assert!(verdict.error.is_none());
    }

    #[test]
    fn unexpected_success_fails() {
        let step = OperationStep::new("transfer", Value::Null).expect_failure(None);
        let verdict = judge(&step, Ok(&Value::Null));
        assert_eq!(verdict.status, RunStatus::Failed);
        assert_eq!(
            verdict.error.as_deref(),
            Some("operation 'transfer' was expected to fail, but it succeeded")
        );
    }

    #[test]
    fn unexpected_failure_keeps_message() {
        let step = OperationStep::new("transfer", Value::Null);
        let err = DispatchError::new("execution reverted");
        let verdict = judge(&step, Err(&err));
        assert_eq!(verdict.status, RunStatus::Failed);
        assert_eq!(verdict.error.as_deref(), Some("execution reverted"));
    }

    #[test]
    fn any_failure_satisfies_bare_expectation() {
        let step = OperationStep::new("transfer", Value::Null).expect_failure(None);
        let err = DispatchError::new("whatever");
        let verdict = judge(&step, Err(&err));
        assert_eq!(verdict.status, RunStatus::Passed);
        assert!(verdict.note.unwrap().contains("expected"));
    }

    #[test]
    fn expected_error_is_a_substring_match() {
        let step =
            OperationStep::new("transfer", Value::Null).expect_failure(Some("insufficient"));
        let err = DispatchError::new("insufficient funds");
        assert_eq!(judge(&step, Err(&err)).status, RunStatus::Passed);

        let step = OperationStep::new("transfer", Value::Null).expect_failure(Some("foo"));
        let err = DispatchError::new("bar");
        let verdict = judge(&step, Err(&err));
        assert_eq!(verdict.status, RunStatus::Failed);
        let message = verdict.error.unwrap();
        assert!(message.contains("foo") && message.contains("bar"));
    }
}
