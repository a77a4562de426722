//! ---
//! sh_section: "05-interfaces"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Control CLI for authoring and running scenarios."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use stagehand_common::config::AppConfig;
use stagehand_logging as logging;

mod history;
mod run;
mod scenarios;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Stagehand scenario control utility",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Path to the configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    fn load_config(&self) -> Result<AppConfig> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.config {
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from("stagehand.toml"));
        candidates.push(PathBuf::from("configs/stagehand.toml"));
        Ok(AppConfig::load_or_default(&candidates)?.config)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Inspect and edit scenario definitions")]
    Scenarios(scenarios::ScenariosCommand),
    #[command(about = "Run scenarios as one batch and record the result")]
    Run(run::RunOptions),
    #[command(subcommand, about = "Browse recorded batch executions")]
    History(history::HistoryCommand),
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = cli.global.load_config()?;
    match cli.command {
        Commands::Scenarios(cmd) => scenarios::run(cmd, &config)?,
        Commands::Run(options) => run::run(options, &config)?,
        Commands::History(cmd) => history::run(cmd, &config)?,
    }
    Ok(())
}
