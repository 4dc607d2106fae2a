//! Docrag CLI
//!
//! Main entry point for the docrag command-line tool.
//! Ingests local documents into an in-memory vector collection and ranks
//! passages by similarity to a query.

mod commands;

use clap::{Parser, Subcommand};
use commands::{IngestCommand, SearchCommand};
use docrag_core::config::{AppConfig, ConfigOverrides};
use docrag_core::{logging, DistanceMetric};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Docrag - retrieval over local documents
#[derive(Parser, Debug)]
#[command(name = "docrag")]
#[command(about = "Similarity search over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "DOCRAG_CONFIG")]
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

    /// Embedding provider (openai, trigram)
    #[arg(short, long, global = true, env = "DOCRAG_PROVIDER")]
    provider: Option<String>,

    /// Embedding API base URL
    #[arg(long, global = true, env = "EMBEDD_ENDPOINT")]
    endpoint: Option<String>,

    /// Embedding model identifier
    #[arg(short, long, global = true, env = "EMBEDD_MODEL")]
    model: Option<String>,

    /// Distance metric (inner_product, l2)
    #[arg(long, global = true, env = "DOCRAG_METRIC")]
    metric: Option<DistanceMetric>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a corpus and search it
    Search(SearchCommand),

    /// Ingest a corpus and show collection statistics
    Ingest(IngestCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(ConfigOverrides {
        config_file: cli.config,
        provider: cli.provider,
        endpoint: cli.endpoint,
        model: cli.model,
        metric: cli.metric,
        log_level: cli.log_level,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("docrag starting");
    tracing::debug!("Provider: {}", config.embedding.provider);
    tracing::debug!("Model: {:?}", config.embedding.model);
    tracing::debug!("Metric: {}", config.retrieval.metric);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    let command_name = match &cli.command {
        Commands::Search(_) => "search",
        Commands::Ingest(_) => "ingest",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Search(cmd) => cmd.execute(&config, &cancel).await,
        Commands::Ingest(cmd) => cmd.execute(&config, &cancel).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
