//! # Embedding Backfill CLI (`embedfill`)
//!
//! One-shot batch tool that populates an embedding vector field on MongoDB
//! documents that lack one, using the OpenAI embeddings API.
//!
//! ## Usage
//!
//! ```bash
//! export MONGODB_URI="mongodb://localhost:27017"
//! export MONGODB_DATABASE="demo"
//! export MONGODB_COLLECTION="products"
//! export OPENAI_API_KEY="sk-..."
//!
//! embedfill                 # backfill everything pending
//! embedfill run --limit 100 # backfill at most 100 documents
//! embedfill run --dry-run   # count pending documents only
//! embedfill status          # coverage summary
//! ```
//!
//! ## Configuration
//!
//! All settings come from the environment. Required:
//!
//! | Variable | Purpose |
//! |----------|---------|
//! | `MONGODB_URI` | connection string for the deployment |
//! | `MONGODB_DATABASE` | target database |
//! | `MONGODB_COLLECTION` | target collection |
//! | `OPENAI_API_KEY` | embeddings API bearer token |
//!
//! Optional: `EMBEDDING_FIELD` (default `embedding`), `EMBEDDING_MODEL`
//! (default `text-embedding-ada-002`), `REQUEST_DELAY_MS` (default `200`),
//! `REQUEST_TIMEOUT_SECS` (default `30`).
//!
//! ## Exit status
//!
//! `0` on a completed run, even if every document was skipped or failed;
//! non-zero for missing configuration or an unreachable deployment.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;

use embed_backfill::backfill::{run_backfill_and_close, BackfillOptions};
use embed_backfill::config::Config;
use embed_backfill::embedding::OpenAiEmbedder;
use embed_backfill::stats::run_status;
use embed_backfill::store::{DocumentStore, MongoStore};

/// Backfill OpenAI embeddings onto MongoDB documents that lack them.
#[derive(Parser)]
#[command(
    name = "embedfill",
    about = "Backfill OpenAI embeddings onto MongoDB documents that lack them",
    version,
    long_about = "embedfill scans a MongoDB collection for documents whose embedding field \
    does not exist, embeds each document's title via the OpenAI embeddings API, and writes \
    the vector back onto the document. Documents without a usable title are skipped; a \
    per-document provider or write failure is logged and never aborts the batch."
)]
struct Cli {
    /// Invoked with no subcommand, `embedfill` runs the backfill with
    /// default options — the job is designed to be cron-able as-is.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the backfill over all pending documents.
    ///
    /// Streams documents missing the embedding field and processes them
    /// strictly one at a time, pausing between provider calls.
    Run {
        /// Maximum number of pending documents to process this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Show how many documents need embeddings without calling the provider.
        #[arg(long)]
        dry_run: bool,

        /// Override the pause between embedding calls, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Show pending/embedded counts for the target collection.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration errors are fatal before any connection attempt.
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Run {
        limit: None,
        dry_run: false,
        delay_ms: None,
    }) {
        Commands::Run {
            limit,
            dry_run,
            delay_ms,
        } => {
            let embedder = OpenAiEmbedder::new(&config)?;
            let store = MongoStore::connect(&config).await?;
            println!("Connected to MongoDB");

            let options = BackfillOptions {
                delay: delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.request_delay()),
                limit,
                dry_run,
            };

            run_backfill_and_close(&store, &embedder, &options).await?;
        }
        Commands::Status => {
            let store = MongoStore::connect(&config).await?;
            // Capture the result first so the connection is released on the
            // error path too.
            let result = run_status(&store, &config.database, &config.collection).await;
            store.close().await;
            result?;
        }
    }

    Ok(())
}
