use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docrag::cli;
use docrag::config::Settings;
use docrag::models::DevicePreference;

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "docrag - Document loading, prompts and local LLM completion", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the dataset directory and list its documents
    Dataset {
        /// Dataset directory (overrides settings)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Show the system prompt and query-wrapper template
    Prompts {
        /// Render the wrapper template for this query
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Load the tokenizer and print the stop-token ids
    StopIds {
        /// Model name or path (overrides settings)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Load the model and answer a query
    Complete {
        /// Query text
        #[arg(short, long)]
        query: String,

        /// Model name or path (overrides settings)
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum new tokens (overrides settings)
        #[arg(long)]
        max_new_tokens: Option<usize>,

        /// Device: auto, cpu, cuda, or metal
        #[arg(long)]
        device: Option<DevicePreference>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docrag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Dataset { dir } => cli::dataset(&settings, dir)?,
        Commands::Prompts { query } => cli::prompts(&settings, query)?,
        Commands::StopIds { model } => cli::stop_ids(&settings, model)?,
        Commands::Complete {
            query,
            model,
            max_new_tokens,
            device,
        } => cli::complete(&settings, query, model, max_new_tokens, device)?,
    }

    Ok(())
}
