//! ---
//! sh_section: "05-interfaces"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Execution history browsing commands."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use anyhow::{anyhow, Result};
use clap::Subcommand;
use stagehand_common::config::AppConfig;
use stagehand_history::HistoryStore;

use crate::run::render_execution;

/// History commands.
#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List recorded executions, newest first.
    List {
        /// Show at most this many executions.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print one execution with every scenario and step.
    Show {
        id: String,
        /// Emit the raw JSON record.
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: HistoryCommand, config: &AppConfig) -> Result<()> {
    let store = HistoryStore::new(&config.scenarios.history_path);
    match command {
        HistoryCommand::List { limit } => {
            let executions = store.get_all()?;
            if executions.is_empty() {
                println!("no executions recorded in {}", store.path().display());
            }
            for execution in executions.iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "{}  {}  {:<9}  {}/{} passed",
                    execution.timestamp.to_rfc3339(),
                    execution.id,
                    execution.status.as_str(),
                    execution.summary.passed,
                    execution.summary.total
                );
            }
        }
        HistoryCommand::Show { id, json } => {
            let execution = store
                .get_by_id(&id)?
                .ok_or_else(|| anyhow!("execution '{id}' not found"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&execution)?);
            } else {
                render_execution(&execution);
            }
        }
    }
    Ok(())
}
