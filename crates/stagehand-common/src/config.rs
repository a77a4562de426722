//! ---
//! sh_section: "03-configuration"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Shared primitives and utilities for the scenario runtime."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

fn default_scenarios_directory() -> PathBuf {
    PathBuf::from("scenarios")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/scenario-history.json")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4000))
}

/// Primary configuration object for the Stagehand runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scenarios: ScenarioStoreConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub plugins: PluginConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "STAGEHAND_CONFIG";

    /// Load configuration from disk, respecting the `STAGEHAND_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Some(loaded) = Self::try_load(candidates)? {
            return Ok(loaded);
        }
        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Like [`AppConfig::load_with_source`] but falls back to defaults when no
    /// candidate exists. An explicit `STAGEHAND_CONFIG` that cannot be read is
    /// still an error.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        match Self::try_load(candidates)? {
            Some(loaded) => Ok(loaded),
            None => {
                let config = AppConfig::default();
                config.validate()?;
                Ok(LoadedAppConfig {
                    config,
                    source: None,
                })
            }
        }
    }

    fn try_load<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<LoadedAppConfig>> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path),
                }));
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: Some(path),
                }));
            }
        }
        Ok(None)
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.scenarios.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Where scenario definitions and the execution history live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStoreConfig {
    #[serde(default = "default_scenarios_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
}

impl Default for ScenarioStoreConfig {
    fn default() -> Self {
        Self {
            directory: default_scenarios_directory(),
            history_path: default_history_path(),
        }
    }
}

impl ScenarioStoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(anyhow!("scenarios.directory must not be empty"));
        }
        if self.history_path.file_name().is_none() {
            return Err(anyhow!(
                "scenarios.history_path {} must name a file",
                self.history_path.display()
            ));
        }
        Ok(())
    }
}

/// Remote task dispatcher used to execute scenario operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Base URL of the contract-interaction runtime. Tasks are posted to
    /// `<endpoint>/tasks/<task>`.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(anyhow!(
                    "dispatcher.endpoint '{}' must be an http(s) URL",
                    endpoint
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Values granted to compiled scenario plugins. Plugins see these and
/// nothing else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub grants: IndexMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.scenarios.directory, PathBuf::from("scenarios"));
        assert_eq!(
            config.scenarios.history_path,
            PathBuf::from("data/scenario-history.json")
        );
        assert!(config.api.enabled);
        assert!(config.dispatcher.endpoint.is_none());
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn parses_full_document() {
        let config: AppConfig = r#"
            [scenarios]
            directory = "fixtures/scenarios"
            history_path = "state/history.json"

            [dispatcher]
            endpoint = "http://127.0.0.1:8545"

            [api]
            listen = "0.0.0.0:9000"

            [logging]
            format = "pretty"

            [plugins.grants]
            network = "localhost"
            chain_id = 31337
        "#
        .parse()
        .unwrap();
        assert_eq!(
            config.dispatcher.endpoint.as_deref(),
            Some("http://127.0.0.1:8545")
        );
        assert_eq!(config.api.listen.port(), 9000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.plugins.grants["chain_id"], serde_json::json!(31337));
    }

    #[test]
    fn rejects_non_http_dispatcher() {
        let err = r#"
            [dispatcher]
            endpoint = "ws://localhost:8545"
        "#
        .parse::<AppConfig>()
        .unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn load_or_default_falls_back_without_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let loaded = AppConfig::load_or_default(&[missing]).unwrap();
        assert!(loaded.source.is_none());
    }

    #[test]
    fn load_with_source_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagehand.toml");
        fs::write(&path, "[api]\nenabled = false\n").unwrap();
        let loaded = AppConfig::load_with_source(&[path.clone()]).unwrap();
        assert_eq!(loaded.source, Some(path));
        assert!(!loaded.config.api.enabled);
    }
}
