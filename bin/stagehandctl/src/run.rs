//! ---
//! sh_section: "05-interfaces"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Synchronous batch execution from the command line."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use stagehand_common::config::AppConfig;
use stagehand_history::HistoryStore;
use stagehand_orchestrator::BatchOrchestrator;
use stagehand_scenario::{
    ExecutionStatus, HttpTaskDispatcher, ScenarioEngine, ScenarioExecution, TaskDispatcher,
    UnconfiguredDispatcher,
};
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::scenarios::catalog;

/// Options for a command-line batch run.
#[derive(Debug, Args)]
pub struct RunOptions {
    /// Scenario names, executed in the order given.
    #[arg(required = true, num_args = 1..)]
    pub names: Vec<String>,
    /// Execution id to record the batch under. A UUID is generated when absent.
    #[arg(long)]
    pub id: Option<String>,
}

pub fn run(options: RunOptions, config: &AppConfig) -> Result<()> {
    let dispatcher: Arc<dyn TaskDispatcher> = match &config.dispatcher.endpoint {
        Some(endpoint) => Arc::new(
            HttpTaskDispatcher::new(endpoint)
                .with_context(|| format!("invalid dispatcher endpoint {endpoint}"))?,
        ),
        None => Arc::new(UnconfiguredDispatcher),
    };
    let history = HistoryStore::new(&config.scenarios.history_path);
    history.ensure_store()?;
    let orchestrator = BatchOrchestrator::new(
        Arc::new(catalog(config)),
        Arc::new(ScenarioEngine::new(dispatcher)),
        Arc::new(history),
    );

    let execution_id = options
        .id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let runtime = Runtime::new()?;
    let execution =
        runtime.block_on(orchestrator.run_scenario_batch(&options.names, &execution_id))?;
    render_execution(&execution);

    if execution.status == ExecutionStatus::Failed {
        bail!("batch {} failed", execution.id);
    }
    Ok(())
}

pub fn render_execution(execution: &ScenarioExecution) {
    println!(
        "Execution {} [{}] {} passed, {} failed, {} pending ({}ms)",
        execution.id,
        execution.status.as_str(),
        execution.summary.passed,
        execution.summary.failed,
        execution.summary.pending,
        execution.duration.unwrap_or_default()
    );
    if let Some(error) = &execution.error {
        println!("  aborted: {error}");
    }
    for result in &execution.scenarios {
        println!("  {} [{}]", result.name, result.status.as_str());
        for step in &result.steps {
            match &step.error {
                Some(error) => println!(
                    "    - {} [{}]: {error}",
                    step.description,
                    step.status.as_str()
                ),
                None => println!("    - {} [{}]", step.description, step.status.as_str()),
            }
        }
    }
}
