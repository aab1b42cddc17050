//! docqa CLI
//!
//! Main entry point for the docqa command-line tool: ingest documents into
//! a local knowledge base and ask questions answered from them.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{
    AskCommand, CleanCommand, IngestCommand, RemoveCommand, SearchCommand, SourcesCommand,
    StatsCommand,
};
use docqa_core::{config::AppConfig, logging};
use docqa_knowledge::ServiceRegistry;
use std::path::PathBuf;

/// docqa - answer questions from your documents with a confidence score
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Answer questions from your documents with a confidence score", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Text generation provider
    #[arg(short, long, global = true, env = "DOCQA_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "DOCQA_MODEL")]
    model: Option<String>,

    /// Knowledge base name
    #[arg(short, long, global = true, default_value = "default")]
    base: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index files or directories into the knowledge base
    Ingest(IngestCommand),

    /// Ask a question answered from the knowledge base
    Ask(AskCommand),

    /// Retrieve and score chunks without generating an answer
    Search(SearchCommand),

    /// List ingested documents
    Sources(SourcesCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),

    /// Remove one document from the knowledge base
    Remove(RemoveCommand),

    /// Remove all documents from the knowledge base
    Clean(CleanCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("docqa starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Search(_) => "search",
        Commands::Sources(_) => "sources",
        Commands::Stats(_) => "stats",
        Commands::Remove(_) => "remove",
        Commands::Clean(_) => "clean",
    };
    let _span = tracing::info_span!("command", name = command_name, base = %cli.base).entered();

    let registry = ServiceRegistry::new();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config, &cli.base).await,
        Commands::Ask(cmd) => cmd.execute(&config, &registry, &cli.base).await,
        Commands::Search(cmd) => cmd.execute(&config, &registry, &cli.base).await,
        Commands::Sources(cmd) => cmd.execute(&config, &cli.base),
        Commands::Stats(cmd) => cmd.execute(&config, &cli.base),
        Commands::Remove(cmd) => cmd.execute(&config, &cli.base),
        Commands::Clean(cmd) => cmd.execute(&config, &cli.base),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
