//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Compiled scenario plugins and their capability allowlist."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
//! Programmatic scenarios are compiled into the host and registered by name.
//! A plugin only sees the values explicitly granted through
//! [`PluginCapabilities`]; there is no filesystem, network, or environment
//! access beyond what the host puts there.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::model::EnhancedScenario;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("capability '{0}' was not granted")]
    MissingCapability(String),
    #[error("{0}")]
    Failed(String),
}

/// Named values a plugin is allowed to read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginCapabilities {
    grants: IndexMap<String, Value>,
}

impl PluginCapabilities {
    pub fn new(grants: IndexMap<String, Value>) -> Self {
        Self { grants }
    }

    pub fn grant(mut self, name: impl Into<String>, value: Value) -> Self {
        self.grants.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.grants.get(name)
    }

    /// Like [`PluginCapabilities::get`] but a missing grant is an error.
    pub fn require(&self, name: &str) -> Result<&Value, PluginError> {
        self.get(name)
            .ok_or_else(|| PluginError::MissingCapability(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.grants.keys().map(String::as_str)
    }
}

/// A scenario produced by compiled code instead of a structured file.
pub trait ScenarioPlugin: Send + Sync {
    fn build(&self, capabilities: &PluginCapabilities) -> Result<EnhancedScenario, PluginError>;
}

impl<F> ScenarioPlugin for F
where
    F: Fn(&PluginCapabilities) -> Result<EnhancedScenario, PluginError> + Send + Sync,
{
    fn build(&self, capabilities: &PluginCapabilities) -> Result<EnhancedScenario, PluginError> {
        self(capabilities)
    }
}

/// Plugins keyed by logical scenario name, plus the capabilities they share.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Arc<dyn ScenarioPlugin>>,
    capabilities: PluginCapabilities,
}

impl PluginRegistry {
    pub fn new(capabilities: PluginCapabilities) -> Self {
        Self {
            plugins: IndexMap::new(),
            capabilities,
        }
    }

    pub fn register<P>(mut self, name: impl Into<String>, plugin: P) -> Self
    where
        P: ScenarioPlugin + 'static,
    {
        self.plugins.insert(name.into(), Arc::new(plugin));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn capabilities(&self) -> &PluginCapabilities {
        &self.capabilities
    }

    /// Run the named plugin. `None` when nothing is registered under `name`.
    pub fn build(&self, name: &str) -> Option<Result<EnhancedScenario, PluginError>> {
        self.plugins
            .get(name)
            .map(|plugin| plugin.build(&self.capabilities))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("capabilities", &self.capabilities.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OperationStep, ScenarioDefinition};
    use serde_json::json;

    fn network_probe(caps: &PluginCapabilities) -> Result<EnhancedScenario, PluginError> {
        let network = caps.require("network")?.clone();
        Ok(EnhancedScenario::from_definition(ScenarioDefinition {
            name: "probe".into(),
            description: None,
            steps: vec![OperationStep::new("block-number", json!({"network": network}))],
        }))
    }

    #[test]
    fn plugin_reads_granted_capabilities() {
        let registry = PluginRegistry::new(
            PluginCapabilities::default().grant("network", json!("anvil")),
        )
        .register("probe", network_probe);
        let scenario = registry.build("probe").unwrap().unwrap();
        assert_eq!(
            scenario.operations().next().unwrap().params,
            json!({"network": "anvil"})
        );
    }

    #[test]
    fn plugin_without_grant_fails() {
        let registry = PluginRegistry::default().register("probe", network_probe);
        assert_eq!(
            registry.build("probe").unwrap().unwrap_err(),
            PluginError::MissingCapability("network".into())
        );
        assert!(registry.build("other").is_none());
    }
}
