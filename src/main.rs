//! # Context Relay CLI (`relay`)
//!
//! ## Usage
//!
//! ```bash
//! relay --config ./config/relay.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `relay init` | Create the SQLite database and run schema migrations |
//! | `relay ingest "<content>"` | Embed and store one document |
//! | `relay retrieve "<query>"` | Tiered retrieval, printed as a JSON array |
//! | `relay ask "<input>"` | Contextual answer with its sources |
//! | `relay keywords "<text>"` | Extract the most important keywords |
//! | `relay docs` | List every stored document's content |
//! | `relay serve` | Start the HTTP server |
//!
//! Results go to stdout as JSON; logs go to stderr. Set `RUST_LOG` to
//! change the log level (default `info`).

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use context_relay::config;
use context_relay::relay::Relay;
use context_relay::{db, migrate, server};
use context_relay_core::store::DOCUMENTS_TABLE;
use context_relay_core::Metadata;

/// Context Relay: multi-tier document retrieval and contextual answers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/relay.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "relay", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/relay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Embed a document and store it.
    ///
    /// Content comes from the argument, `--file`, or stdin, in that order.
    Ingest {
        content: Option<String>,

        /// Read content from this file.
        #[arg(long, conflicts_with = "content")]
        file: Option<PathBuf>,

        /// Metadata as a JSON object.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Retrieve supporting documents for a query.
    Retrieve {
        query: String,

        /// Escalation threshold (defaults to `retrieval.min_results`).
        #[arg(long)]
        min_results: Option<usize>,

        /// Run a single tier instead of the escalating pipeline.
        #[arg(long, value_enum, default_value_t = TierArg::All)]
        tier: TierArg,
    },

    /// Answer an input using retrieved documents as context.
    Ask { input: String },

    /// Extract the most important keywords of a text.
    Keywords { text: String },

    /// List the content of every stored document.
    Docs,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    All,
    Hybrid,
    Keyword,
    Fulltext,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            content,
            file,
            metadata,
        } => {
            let content = read_content(content, file)?;
            let metadata = parse_metadata(metadata.as_deref())?;
            let relay = Relay::open(&cfg).await?;
            let doc = relay
                .ingestor
                .store_embedding(&content, metadata.as_ref())
                .await?;
            print_json(&doc)?;
        }
        Commands::Retrieve {
            query,
            min_results,
            tier,
        } => {
            let relay = Relay::open(&cfg).await?;
            let retriever = &relay.retriever;
            let results = match tier {
                TierArg::All => {
                    let min_results = min_results.unwrap_or_else(|| retriever.min_results());
                    let cancel = cancel_on_ctrl_c();
                    retriever
                        .retrieve_with_cancel(&query, min_results, &cancel)
                        .await?
                        .into_vec()
                }
                TierArg::Hybrid => retriever.hybrid_tier(&query).await?,
                TierArg::Keyword => retriever.keyword_tier(&query).await?,
                TierArg::Fulltext => retriever.fulltext_tier(&query).await?,
            };
            print_json(&results)?;
        }
        Commands::Ask { input } => {
            let relay = Relay::open(&cfg).await?;
            let cancel = cancel_on_ctrl_c();
            let response = relay.responder.answer_with_cancel(&input, &cancel).await?;
            print_json(&response)?;
        }
        Commands::Keywords { text } => {
            let relay = Relay::open(&cfg).await?;
            let keywords = relay.keywords.extract_keywords(&text).await?;
            print_json(&keywords)?;
        }
        Commands::Docs => {
            let relay = Relay::open(&cfg).await?;
            let documents = relay.retriever.all_documents(DOCUMENTS_TABLE).await?;
            print_json(&documents)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn read_content(content: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read content from stdin")?;
    Ok(buf)
}

fn parse_metadata(raw: Option<&str>) -> Result<Option<Metadata>> {
    raw.map(|json| serde_json::from_str::<Metadata>(json).context("--metadata must be a JSON object"))
        .transpose()
}

/// A token that fires on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
