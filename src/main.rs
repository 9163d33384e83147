//! # Answer Relay CLI (`relay`)
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
//! | `relay serve` | Start the webhook server |
//! | `relay ask "<question>"` | Answer one question from the index and print it |
//! | `relay sign <file>` | Print the `x-line-signature` for a payload file |
//!
//! Secrets are read from the environment (and from `.env` when present):
//! `OPENAI_API_KEY`, `OA_CHANNEL_ACCESS_TOKEN`, `OA_CHANNEL_SECRET`.

use answer_relay::config::{self, Secrets};
use answer_relay::{answer, server, signature};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Answer Relay: answers LINE chat messages from a pre-built retrieval index.
#[derive(Parser)]
#[command(name = "relay", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/relay.toml`. A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/relay.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    ///
    /// Fails before binding if any secret is missing or the index cannot
    /// be opened.
    Serve,

    /// Answer a single question and print the result.
    Ask {
        /// The question text.
        question: String,
    },

    /// Compute the webhook signature for a payload.
    ///
    /// Reads the file byte-for-byte (`-` for stdin) and signs it with
    /// `OA_CHANNEL_SECRET`.
    Sign {
        /// Payload file.
        path: PathBuf,
    },
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("answer_relay={log_level},tower_http={log_level},warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            let secrets = Secrets::from_env()?;
            server::run_server(&cfg, secrets).await?;
        }
        Commands::Ask { question } => {
            let cfg = config::load_config(&cli.config)?;
            answer::run_ask(&cfg, &question).await?;
        }
        // Signing needs neither the config file nor the serving secrets.
        Commands::Sign { path } => {
            signature::run_sign(&path)?;
        }
    }

    Ok(())
}
