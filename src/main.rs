use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codexr::commands::{AskOptions, ask, ingest, serve, show_status};
use codexr::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codexr")]
#[command(about = "A retrieval-augmented coding assistant for AR/VR developers")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.codexr)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embeddings, language model and API keys
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Fetch documentation pages and rebuild the index
    Ingest {
        /// Pages to index; the default AR/VR documentation set when omitted
        urls: Vec<String>,
    },
    /// Ask a coding question or explain an error log
    Ask {
        /// Natural-language coding question
        #[arg(long)]
        query: Option<String>,
        /// Error log to explain; takes precedence over the query
        #[arg(long)]
        error_log: Option<String>,
        /// WAV recording to transcribe and use as the query
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Model name shown in responses, e.g. "GPT-4o-mini"
        #[arg(long)]
        model: Option<String>,
    },
    /// Start the HTTP server
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show the state of the index and backends
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir().context("Failed to determine config directory")?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest { urls } => {
            ingest(&Config::load(&config_dir)?, urls).await?;
        }
        Commands::Ask {
            query,
            error_log,
            audio,
            model,
        } => {
            let options = AskOptions {
                query,
                error_log,
                audio,
                model,
            };
            let response = ask(&Config::load(&config_dir)?, options).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Serve { bind, port } => {
            serve(&Config::load(&config_dir)?, bind, port).await?;
        }
        Commands::Status => {
            show_status(&Config::load(&config_dir)?).await?;
        }
    }

    Ok(())
}
