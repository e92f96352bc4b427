//! flowchart - Command-line front end for flowchart-core
//!
//! Validates, exports and drives flow definitions, one-shot or from a REPL.

mod commands;
mod config;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use flowchart_core::{DefinitionFormat, MemoryAsset};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowchart")]
#[command(about = "Drive assets through condition-routed flows")]
#[command(version)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "FLOWCHART_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a flow definition
    Check {
        /// Definition file (.json, .yaml or .yml)
        file: PathBuf,

        /// Reject overlapping outcomes and dangling stages
        #[arg(long)]
        strict: bool,
    },

    /// Print a definition in canonical form
    Export {
        /// Definition file
        file: PathBuf,

        /// Output format (defaults to output.format from config)
        #[arg(short, long)]
        format: Option<DefinitionFormat>,
    },

    /// Apply actions to an in-memory asset
    Run {
        /// Definition file
        file: PathBuf,

        /// Starting stage
        #[arg(short, long)]
        stage: String,

        /// Asset flag, as name or name=bool (repeatable)
        #[arg(short, long = "flag", value_parser = commands::parse_flag)]
        flags: Vec<(String, bool)>,

        /// Seal the flow strictly
        #[arg(long)]
        strict: bool,

        /// Actions to apply, in order
        actions: Vec<String>,
    },

    /// Start interactive REPL
    Repl {
        /// Definition file
        file: PathBuf,

        /// Starting stage (defaults to the first stage in the file)
        #[arg(short, long)]
        stage: Option<String>,

        /// Asset flag, as name or name=bool (repeatable)
        #[arg(short, long = "flag", value_parser = commands::parse_flag)]
        flags: Vec<(String, bool)>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &cli.config {
        tracing::debug!("loaded config from {}", path.display());
    }

    if let Err(e) = execute(cli.command, &config) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
    Ok(())
}

fn execute(command: Commands, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Check { file, strict } => {
            println!("{}", commands::check(&file, strict || config.flow.strict)?);
        }
        Commands::Export { file, format } => {
            let format = format.unwrap_or(config.output.format);
            print!("{}", commands::export(&file, format)?);
        }
        Commands::Run {
            file,
            stage,
            flags,
            strict,
            actions,
        } => {
            let flow = commands::load_definition(&file)?.build(strict || config.flow.strict)?;
            let mut asset = new_asset(stage, flags);
            match commands::run(&flow, &mut asset, &actions) {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    for line in &e.transcript {
                        println!("{}", line);
                    }
                    return Err(e.into());
                }
            }
        }
        Commands::Repl { file, stage, flags } => {
            let definition = commands::load_definition(&file)?;
            let stage = match stage.or_else(|| definition.stages.first().map(|s| s.name.clone())) {
                Some(stage) => stage,
                None => return Err(format!("'{}' defines no stages", file.display()).into()),
            };
            let flow = definition.build(config.flow.strict)?;
            let session = repl::Session::new(flow, new_asset(stage, flags));
            repl::run(session, &config.repl.history_path())?;
        }
    }
    Ok(())
}

fn new_asset(stage: String, flags: Vec<(String, bool)>) -> MemoryAsset {
    let mut asset = MemoryAsset::new(stage);
    for (name, value) in flags {
        asset.set_flag(name, value);
    }
    asset
}
