//! ---
//! sh_section: "04-orchestration"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Prometheus metrics for batch execution."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{self, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use stagehand_scenario::ScenarioExecution;

/// Metrics published by the batch orchestrator.
#[derive(Clone)]
pub struct OrchestratorMetrics {
    batches_started: IntCounter,
    batches_finished: IntCounterVec,
    scenarios: IntCounterVec,
    step_duration: HistogramVec,
}

impl std::fmt::Debug for OrchestratorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorMetrics").finish_non_exhaustive()
    }
}

impl OrchestratorMetrics {
    /// Register all orchestrator metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let batches_started = IntCounter::with_opts(Opts::new(
            "stagehand_batches_started_total",
            "Total number of scenario batches accepted for execution",
        ))?;
        registry.register(Box::new(batches_started.clone()))?;

        let batches_finished = IntCounterVec::new(
            Opts::new(
                "stagehand_batches_finished_total",
                "Total number of scenario batches that finished, by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(batches_finished.clone()))?;

        let scenarios = IntCounterVec::new(
            Opts::new(
                "stagehand_scenarios_total",
                "Total number of scenario results recorded, by status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(scenarios.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "stagehand_step_duration_seconds",
            "Wall-clock time spent dispatching a scenario step",
        )
        .buckets(prometheus::exponential_buckets(0.005, 2.0, 12)?);
        let step_duration = HistogramVec::new(histogram_opts, &["status"])?;
        registry.register(Box::new(step_duration.clone()))?;

        Ok(Self {
            batches_started,
            batches_finished,
            scenarios,
            step_duration,
        })
    }

    /// Count a batch accepted for execution.
    pub fn record_batch_started(&self) {
        self.batches_started.inc();
    }

    /// Record the final state of a batch and every step it ran.
    pub fn record_batch_finished(&self, execution: &ScenarioExecution) {
        self.batches_finished
            .with_label_values(&[execution.status.as_str()])
            .inc();
        for result in &execution.scenarios {
            self.scenarios
                .with_label_values(&[result.status.as_str()])
                .inc();
            for step in &result.steps {
                if let Some(duration) = step.duration {
                    self.step_duration
                        .with_label_values(&[step.status.as_str()])
                        .observe(duration as f64 / 1000.0);
                }
            }
        }
    }
}
