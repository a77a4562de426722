//! ---
//! sh_section: "01-scenario-engine"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Scenario discovery, loading, and persistence."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::LoadError;
use crate::model::EnhancedScenario;
use crate::plugin::PluginRegistry;

/// Structured formats in lookup preference order.
const STRUCTURED_SUFFIXES: [(&str, StructuredFormat); 3] = [
    (".json", StructuredFormat::Json),
    (".yaml", StructuredFormat::Yaml),
    (".yml", StructuredFormat::Yaml),
];

/// File names that mark a compiled scenario. Loading one requires a plugin
/// registered under the same logical name.
const CODE_SUFFIXES: [&str; 6] = [
    ".scenario.rs",
    ".scenario.ts",
    ".scenario.js",
    ".test.rs",
    ".test.ts",
    ".test.js",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StructuredFormat {
    Json,
    Yaml,
}

/// Finds, parses, and writes scenario definitions under one directory.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    root: PathBuf,
    plugins: PluginRegistry,
}

impl ScenarioCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            plugins: PluginRegistry::default(),
        }
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Logical names of every recognised scenario, sorted and de-duplicated.
    /// A missing directory yields only plugin names.
    pub fn list_scenarios(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.plugins.names().map(str::to_owned).collect();
        if !self.root.is_dir() {
            return names.into_iter().collect();
        }

        for entry in WalkDir::new(&self.root).min_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(root = %self.root.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if let Some(name) = logical_name(relative) {
                names.insert(name);
            }
        }
        names.into_iter().collect()
    }

    /// Load a scenario, preferring structured files over compiled plugins.
    pub fn load_scenario(&self, name: &str) -> Result<EnhancedScenario, LoadError> {
        validate_name(name)?;

        for (suffix, format) in STRUCTURED_SUFFIXES {
            let path = self.root.join(format!("{name}{suffix}"));
            if path.is_file() {
                debug!(scenario = name, path = %path.display(), "loading structured scenario");
                return read_structured(&path, format);
            }
        }

        if let Some(built) = self.plugins.build(name) {
            debug!(scenario = name, "building scenario from plugin");
            return built.map_err(|err| LoadError::Plugin {
                name: name.to_owned(),
                message: err.to_string(),
            });
        }

        let code_file = CODE_SUFFIXES
            .iter()
            .map(|suffix| self.root.join(format!("{name}{suffix}")))
            .find(|path| path.is_file());
        match code_file {
            Some(path) => Err(LoadError::Plugin {
                name: name.to_owned(),
                message: format!(
                    "executable scenario {} has no registered plugin",
                    path.display()
                ),
            }),
            None => Err(LoadError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    /// Write `content` to `<name>.json`, replacing any existing file.
    ///
    /// `content` may be the scenario document itself or a string holding its
    /// JSON text. It is validated before anything is written.
    pub fn save_scenario(&self, name: &str, content: Value) -> Result<PathBuf, LoadError> {
        validate_name(name)?;
        let path = self.root.join(format!("{name}.json"));
        let document = match content {
            Value::String(text) => {
                serde_json::from_str(&text).map_err(|err| LoadError::Parse {
                    path: path.clone(),
                    message: err.to_string(),
                })?
            }
            other => other,
        };
        EnhancedScenario::from_document(document.clone()).map_err(|err| LoadError::Parse {
            path: path.clone(),
            message: err.to_string(),
        })?;

        let io_err = |source| LoadError::Io {
            path: path.clone(),
            source,
        };
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent).map_err(io_err)?;
        let serialized = serde_json::to_vec_pretty(&document).map_err(|err| LoadError::Parse {
            path: path.clone(),
            message: err.to_string(),
        })?;
        let mut staged = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        staged.write_all(&serialized).map_err(io_err)?;
        staged.flush().map_err(io_err)?;
        staged.persist(&path).map_err(|err| io_err(err.error))?;
        debug!(scenario = name, path = %path.display(), "scenario saved");
        Ok(path)
    }
}

fn read_structured(path: &Path, format: StructuredFormat) -> Result<EnhancedScenario, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let document: Value = match format {
        StructuredFormat::Json => {
            serde_json::from_str(&text).map_err(|err| parse_err(err.to_string()))?
        }
        StructuredFormat::Yaml => {
            serde_yaml::from_str(&text).map_err(|err| parse_err(err.to_string()))?
        }
    };
    EnhancedScenario::from_document(document).map_err(|err| parse_err(err.to_string()))
}

/// Strip a recognised suffix and join the relative path with `/`.
fn logical_name(relative: &Path) -> Option<String> {
    let file_name = relative.file_name()?.to_str()?;
    let stem = STRUCTURED_SUFFIXES
        .iter()
        .map(|(suffix, _)| *suffix)
        .chain(CODE_SUFFIXES)
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())?;

    let mut parts: Vec<&str> = Vec::new();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            parts.push(component.as_os_str().to_str()?);
        }
    }
    parts.push(stem);
    Some(parts.join("/"))
}

fn validate_name(name: &str) -> Result<(), LoadError> {
    let invalid = |reason| LoadError::InvalidName {
        name: name.to_owned(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    let path = Path::new(name);
    if path.is_absolute() || name.starts_with('/') {
        return Err(invalid("absolute paths are not allowed"));
    }
    if !path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(invalid("only plain relative path segments are allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_names_strip_suffixes() {
        assert_eq!(logical_name(Path::new("transfer.json")).as_deref(), Some("transfer"));
        assert_eq!(
            logical_name(Path::new("erc20/approve.yml")).as_deref(),
            Some("erc20/approve")
        );
        assert_eq!(
            logical_name(Path::new("mint.scenario.ts")).as_deref(),
            Some("mint")
        );
        assert_eq!(logical_name(Path::new("burn.test.rs")).as_deref(), Some("burn"));
        assert_eq!(logical_name(Path::new("README.md")), None);
        assert_eq!(logical_name(Path::new("helpers.ts")), None);
        assert_eq!(logical_name(Path::new(".json")), None);
    }

    #[test]
    fn rejects_traversal_and_absolute_names() {
        for name in ["", "  ", "../secrets", "a/../../b", "/etc/passwd", "./a"] {
            assert!(
                matches!(validate_name(name), Err(LoadError::InvalidName { .. })),
                "{name} should be rejected"
            );
        }
        assert!(validate_name("erc20/transfer").is_ok());
    }
}
