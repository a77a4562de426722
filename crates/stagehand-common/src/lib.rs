//! ---
//! sh_section: "03-configuration"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Shared primitives and utilities for the scenario runtime."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
//! Shared primitives for the Stagehand workspace.
//! This crate exposes configuration loading, tracing bootstrap, and the
//! millisecond time helpers used by the engine and the history store.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    ApiConfig, AppConfig, DispatcherConfig, LoadedAppConfig, LoggingConfig, MetricsConfig,
    PluginConfig, ScenarioStoreConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::{duration_to_millis, elapsed_millis};
