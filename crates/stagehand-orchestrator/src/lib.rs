//! ---
//! sh_section: "04-orchestration"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Batch orchestration kernel coordinating discovery, engine, and history."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Runs named scenarios as one batch and keeps its history record current.
//!
//! A batch is loaded all-or-nothing, recorded as `running`, executed
//! sequentially, and finally written back with recomputed counts.

use std::sync::Arc;

use stagehand_history::{ExecutionPatch, HistoryError, HistoryStore};
use stagehand_logging::{sh_error, sh_info, LogContext};
use stagehand_scenario::{
    BatchAbort, EnhancedScenario, LoadError, ScenarioCatalog, ScenarioEngine, ScenarioExecution,
    ScenarioResult,
};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::Instrument;
use uuid::Uuid;

pub mod metrics;

pub use metrics::OrchestratorMetrics;

/// Failures that stop a batch from being recorded or finalised.
#[derive(Debug, Error)]
pub enum BatchError {
    /// One of the requested scenarios could not be loaded; nothing ran.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The history store could not be read or written.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// The blocking history write was cancelled or panicked.
    #[error("history write task failed: {0}")]
    Task(#[from] JoinError),
}

/// A loaded batch whose placeholder record is already in history.
#[derive(Debug)]
pub struct PreparedBatch {
    names: Vec<String>,
    scenarios: Vec<EnhancedScenario>,
    execution: ScenarioExecution,
}

impl PreparedBatch {
    /// Identifier of the history record tracking this batch.
    pub fn execution_id(&self) -> &str {
        &self.execution.id
    }
}

/// Coordinates scenario loading, sequential execution, and history updates.
#[derive(Debug)]
pub struct BatchOrchestrator {
    catalog: Arc<ScenarioCatalog>,
    engine: Arc<ScenarioEngine>,
    history: Arc<HistoryStore>,
    metrics: Option<OrchestratorMetrics>,
}

impl BatchOrchestrator {
    /// Create an orchestrator from its collaborators.
    pub fn new(
        catalog: Arc<ScenarioCatalog>,
        engine: Arc<ScenarioEngine>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            catalog,
            engine,
            history,
            metrics: None,
        }
    }

    /// Publish batch metrics through `metrics`.
    pub fn with_metrics(mut self, metrics: OrchestratorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Scenario catalog the batches are loaded from.
    pub fn catalog(&self) -> &Arc<ScenarioCatalog> {
        &self.catalog
    }

    /// History store the batches are recorded in.
    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Load every named scenario and append a `running` placeholder record.
    ///
    /// Any load failure is returned before history is touched. Runs on the
    /// calling thread so `start_batch` can report load errors synchronously.
    pub fn prepare(
        &self,
        names: &[String],
        execution_id: impl Into<String>,
    ) -> Result<PreparedBatch, BatchError> {
        let scenarios = names
            .iter()
            .map(|name| self.catalog.load_scenario(name))
            .collect::<Result<Vec<_>, _>>()?;

        let execution = ScenarioExecution::started(execution_id, names);
        self.history.add_execution(execution.clone())?;
        if let Some(metrics) = &self.metrics {
            metrics.record_batch_started();
        }
        let ctx = LogContext::new().with_execution(&execution.id);
        sh_info!(context = ctx, "batch accepted with {} scenario(s)", names.len());

        Ok(PreparedBatch {
            names: names.to_vec(),
            scenarios,
            execution,
        })
    }

    /// Run a prepared batch and write the finished record back to history.
    pub async fn execute(&self, batch: PreparedBatch) -> Result<ScenarioExecution, BatchError> {
        let PreparedBatch {
            names,
            scenarios,
            mut execution,
        } = batch;
        let span = tracing::info_span!("batch", execution = %execution.id);
        let outcome = self.engine.run_batch(&scenarios).instrument(span).await;

        let (results, error) = match outcome {
            Ok(results) => (results, None),
            Err(abort) => {
                let message = abort.failure.to_string();
                (settle_aborted(abort, &names), Some(message))
            }
        };
        execution.complete(results, error);

        let ctx = LogContext::new().with_execution(&execution.id);
        match &execution.error {
            Some(error) => sh_error!(context = ctx, "batch aborted: {error}"),
            None => sh_info!(
                context = ctx,
                "batch {}: {} passed, {} failed",
                execution.status.as_str(),
                execution.summary.passed,
                execution.summary.failed
            ),
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_batch_finished(&execution);
        }

        let history = Arc::clone(&self.history);
        let id = execution.id.clone();
        let patch = ExecutionPatch::from(execution.clone());
        tokio::task::spawn_blocking(move || history.update_execution(&id, patch)).await??;
        Ok(execution)
    }

    /// Load, record, run, and finalise a batch under `execution_id`.
    pub async fn run_scenario_batch(
        &self,
        names: &[String],
        execution_id: &str,
    ) -> Result<ScenarioExecution, BatchError> {
        let prepared = self.prepare(names, execution_id)?;
        self.execute(prepared).await
    }

    /// Prepare a batch under a fresh id and run it in the background.
    ///
    /// Load and history failures are returned immediately; the outcome of
    /// the run itself is only visible through the history store.
    pub fn start_batch(self: &Arc<Self>, names: Vec<String>) -> Result<String, BatchError> {
        let execution_id = Uuid::new_v4().to_string();
        let prepared = self.prepare(&names, execution_id.clone())?;
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let id = prepared.execution_id().to_owned();
            if let Err(err) = orchestrator.execute(prepared).await {
                let ctx = LogContext::new().with_execution(&id);
                sh_error!(context = ctx, "failed to finalise batch: {err}");
            }
        });
        Ok(execution_id)
    }
}

/// Results for an aborted batch: completed ones, the aborted scenario's
/// partial result, and a pending placeholder for each scenario never started.
fn settle_aborted(abort: BatchAbort, names: &[String]) -> Vec<ScenarioResult> {
    let BatchAbort {
        mut completed,
        failure,
    } = abort;
    let skipped = completed.len() + 1;
    completed.push(*failure.partial);
    completed.extend(names.iter().skip(skipped).map(ScenarioResult::pending));
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_scenario::{DispatchError, HookError, HookPhase, RunStatus};

    #[test]
    fn aborted_batch_marks_unstarted_scenarios_pending() {
        let mut first = ScenarioResult::running("first");
        first.finish();
        let mut partial = ScenarioResult::running("second");
        partial.finish();
        let abort = BatchAbort {
            completed: vec![first],
            failure: HookError {
                phase: HookPhase::Setup,
                task: "deploy".into(),
                source: DispatchError::new("no gas"),
                partial: Box::new(partial),
            },
        };
        let names: Vec<String> = ["first", "second", "third", "fourth"]
            .into_iter()
            .map(String::from)
            .collect();

        let results = settle_aborted(abort, &names);
        let statuses: Vec<_> = results.iter().map(|r| (r.name.as_str(), r.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("first", RunStatus::Passed),
                ("second", RunStatus::Passed),
                ("third", RunStatus::Pending),
                ("fourth", RunStatus::Pending),
            ]
        );
    }
}
