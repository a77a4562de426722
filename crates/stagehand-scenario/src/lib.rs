//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Scenario model, discovery, templating, dispatch, and execution."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
//! Scenario runtime for contract-interaction test suites.
//!
//! Scenarios are discovered under a directory ([`ScenarioCatalog`]), their
//! step parameters are resolved against a [`TemplateContext`], and the
//! [`ScenarioEngine`] runs them step by step through a [`TaskDispatcher`].

pub mod discovery;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod plugin;
pub mod template;

pub use discovery::ScenarioCatalog;
pub use dispatch::{HttpTaskDispatcher, TaskDispatcher, UnconfiguredDispatcher};
pub use engine::ScenarioEngine;
pub use error::{
    BatchAbort, DispatchError, ExpectationMismatch, HookError, HookPhase, LoadError,
    TemplateError,
};
pub use model::{
    EnhancedScenario, ExecutionStatus, ExecutionSummary, Hook, OperationStep, RunStatus,
    ScenarioConfig, ScenarioDefinition, ScenarioExecution, ScenarioMetadata, ScenarioResult,
    ScenarioSetup, ScenarioStep, ScenarioTeardown, SetupHooks,
};
pub use plugin::{PluginCapabilities, PluginError, PluginRegistry, ScenarioPlugin};
pub use template::{resolve_params, TemplateContext};
