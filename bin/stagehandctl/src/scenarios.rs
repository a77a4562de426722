//! ---
//! sh_section: "05-interfaces"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Scenario listing, inspection, and saving commands."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Subcommand, ValueEnum};
use serde_json::Value;
use stagehand_common::config::AppConfig;
use stagehand_scenario::{PluginCapabilities, PluginRegistry, ScenarioCatalog};

/// Scenario catalog commands.
#[derive(Debug, Subcommand)]
pub enum ScenariosCommand {
    /// List every discoverable scenario name.
    List,
    /// Print a scenario as it would be executed.
    Show {
        name: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Save a JSON or YAML file as `<name>.json` in the scenarios directory.
    Save { name: String, file: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Catalog rooted at the configured directory with the configured grants.
pub fn catalog(config: &AppConfig) -> ScenarioCatalog {
    let plugins = PluginRegistry::new(PluginCapabilities::new(config.plugins.grants.clone()));
    ScenarioCatalog::new(&config.scenarios.directory).with_plugins(plugins)
}

pub fn run(command: ScenariosCommand, config: &AppConfig) -> Result<()> {
    let catalog = catalog(config);
    match command {
        ScenariosCommand::List => {
            let names = catalog.list_scenarios();
            if names.is_empty() {
                println!("no scenarios under {}", catalog.root().display());
            }
            for name in names {
                println!("{name}");
            }
        }
        ScenariosCommand::Show { name, format } => {
            let scenario = catalog.load_scenario(&name)?;
            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&scenario)?,
                OutputFormat::Yaml => serde_yaml::to_string(&scenario)?,
            };
            println!("{rendered}");
        }
        ScenariosCommand::Save { name, file } => {
            let content = read_document(&file)?;
            let path = catalog.save_scenario(&name, content)?;
            println!("saved scenario '{name}' to {}", path.display());
        }
    }
    Ok(())
}

fn read_document(file: &Path) -> Result<Value> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("unable to read {}", file.display()))?;
    let document = match file.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse {} as YAML", file.display()))?,
        Some("json") | None => serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {} as JSON", file.display()))?,
        Some(other) => bail!("unsupported scenario file extension '.{other}'"),
    };
    Ok(document)
}
