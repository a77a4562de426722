//! ---
//! sh_section: "04-orchestration"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Binary entrypoint for the Stagehand daemon."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prometheus::Registry;
use stagehand_api::{spawn_api_server, ApiServer, ApiState};
use stagehand_common::config::{AppConfig, LoadedAppConfig};
use stagehand_common::logging::init_tracing;
use stagehand_history::HistoryStore;
use stagehand_logging::{log_system_event, SystemEventOutcome};
use stagehand_orchestrator::{BatchOrchestrator, OrchestratorMetrics};
use stagehand_scenario::{
    HttpTaskDispatcher, PluginCapabilities, PluginRegistry, ScenarioCatalog, ScenarioEngine,
    TaskDispatcher, UnconfiguredDispatcher,
};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Stagehand scenario daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Serve the scenario API")]
    Run,
    #[command(about = "Load and validate the configuration, then exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("stagehand.toml"));
    candidates.push(PathBuf::from("configs/stagehand.toml"));

    let LoadedAppConfig { config, source } = AppConfig::load_or_default(&candidates)?;
    init_tracing("stagehandd", &config.logging)?;
    match &source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config).await?,
        Commands::CheckConfig => {
            println!(
                "configuration ok ({})",
                source
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "defaults".into())
            );
        }
    }

    Ok(())
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let registry = config.metrics.enabled.then(|| Arc::new(Registry::new()));
    let orchestrator = Arc::new(build_orchestrator(&config, registry.clone())?);

    let mut api_server: Option<ApiServer> = None;
    if config.api.enabled {
        let mut state = ApiState::new(orchestrator.clone());
        if let Some(registry) = &registry {
            state = state.with_registry(registry.clone());
        }
        let server = spawn_api_server(Arc::new(state), config.api.listen)?;
        info!(address = %server.addr(), "api server listening");
        api_server = Some(server);
    } else {
        warn!("api server disabled by configuration; nothing will accept batches");
    }

    log_system_event(
        None,
        "daemon_started",
        "stagehand daemon running; waiting for termination signal",
        SystemEventOutcome::Success,
    );
    shutdown_signal().await?;
    info!("termination signal received; shutting down");

    if let Some(server) = api_server {
        server.shutdown().await?;
    }
    log_system_event(
        None,
        "daemon_stopped",
        "stagehand daemon stopped",
        SystemEventOutcome::Success,
    );
    Ok(())
}

/// Wire the catalog, engine, and history store described by `config`.
fn build_orchestrator(
    config: &AppConfig,
    registry: Option<Arc<Registry>>,
) -> Result<BatchOrchestrator> {
    let dispatcher: Arc<dyn TaskDispatcher> = match &config.dispatcher.endpoint {
        Some(endpoint) => {
            let dispatcher = HttpTaskDispatcher::new(endpoint)
                .with_context(|| format!("invalid dispatcher endpoint {endpoint}"))?;
            info!(endpoint = %dispatcher.endpoint(), "dispatching tasks over http");
            Arc::new(dispatcher)
        }
        None => {
            warn!("no dispatcher endpoint configured; every step will fail");
            Arc::new(UnconfiguredDispatcher)
        }
    };

    let plugins = PluginRegistry::new(PluginCapabilities::new(config.plugins.grants.clone()));
    let catalog = ScenarioCatalog::new(&config.scenarios.directory).with_plugins(plugins);
    let history = HistoryStore::new(&config.scenarios.history_path);
    history
        .ensure_store()
        .context("failed to initialise execution history")?;
    info!(
        scenarios = %config.scenarios.directory.display(),
        history = %config.scenarios.history_path.display(),
        "scenario store ready"
    );

    let mut orchestrator = BatchOrchestrator::new(
        Arc::new(catalog),
        Arc::new(ScenarioEngine::new(dispatcher)),
        Arc::new(history),
    );
    if let Some(registry) = registry {
        orchestrator = orchestrator.with_metrics(
            OrchestratorMetrics::new(registry).context("failed to register orchestrator metrics")?,
        );
    }
    Ok(orchestrator)
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => result.context("failed to listen for ctrl-c")?,
            _ = terminate.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("failed to listen for ctrl-c")
    }
}
