//! dashcheck CLI - Main Entry Point
//!
//! Exit codes: 0 when every scenario passed, 1 when any failed or
//! errored, 2 when the configuration or scenarios could not be loaded.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use dashcheck_cli::commands::{list, run, validate};
use dashcheck_cli::output::{self, OutputFormat};
use dashcheck_cli::{Config, DEFAULT_CONFIG_FILE};

/// dashcheck - browser-driven acceptance scenarios for web dashboards
#[derive(Parser)]
#[command(name = "dashcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, env = "DASHCHECK_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios against the target application
    Run(run::RunArgs),

    /// List registered scenarios
    List {
        /// Only scenarios carrying this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Parse and register every scenario file
    Validate,
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let config = Config::load(&cli.config)?;
    match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await,
        Commands::List { tag } => list::execute(&config, tag.as_deref(), cli.format).map(|_| true),
        Commands::Validate => validate::execute(&config).map(|_| true),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            ExitCode::from(2)
        }
    }
}
