//! # mdgate CLI
//!
//! The `mdgate` binary serves the MCP-compatible document conversion API and
//! provides operator commands for exercising the pipeline locally.
//!
//! ## Usage
//!
//! ```bash
//! mdgate --config ./config/mdgate.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mdgate serve` | Start the MCP-compatible HTTP server |
//! | `mdgate convert <path>` | Convert a local file to Markdown |
//! | `mdgate check-url <url>` | Validate a URL against the SSRF deny-list |
//!
//! ## Examples
//!
//! ```bash
//! # Start the server with default limits
//! mdgate serve
//!
//! # Check a document locally without going through the server
//! mdgate convert report.docx
//!
//! # Verify what the deny-list would say about a URL
//! mdgate check-url http://169.254.169.254/latest/meta-data/
//! ```

mod config;
mod convert;
mod decode;
mod error;
mod events;
mod fetch;
mod ingest;
mod netguard;
mod server;
mod staging;
mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::convert::{Converter, MarkdownConverter};
use crate::events::{LogTelemetry, Telemetry};
use crate::ingest::Ingestor;

/// mdgate — a hardened MCP gateway that fetches untrusted documents and
/// converts them to Markdown.
#[derive(Parser)]
#[command(
    name = "mdgate",
    about = "A hardened MCP gateway that fetches untrusted documents and converts them to Markdown",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file falls back to
    /// built-in defaults.
    #[arg(long, global = true, default_value = "./config/mdgate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP-compatible HTTP server.
    ///
    /// Exposes `convert_to_markdown` via `POST /tools/convert_to_markdown`
    /// and the tool listing via `GET /tools/list`.
    Serve,

    /// Convert a local file to Markdown and print it.
    ///
    /// Bypasses the network pipeline and runs the bundled converter
    /// directly. The format is taken from the file extension.
    Convert {
        /// Path of the document to convert.
        path: PathBuf,
    },

    /// Validate a URL against the scheme whitelist and address deny-list.
    ///
    /// Prints the verdict without downloading anything. Useful for checking
    /// what the server would do with a given document URL.
    CheckUrl {
        /// The URL to validate.
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let telemetry: Arc<dyn Telemetry> = Arc::new(LogTelemetry);
            telemetry.charge("server-start");
            let ingestor = Arc::new(Ingestor::new(
                Arc::new(cfg.clone()),
                Arc::new(MarkdownConverter),
                telemetry,
            ));
            server::run_server(&cfg, ingestor).await?;
        }
        Commands::Convert { path } => {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(fetch::DEFAULT_EXTENSION)
                .to_ascii_lowercase();
            let markdown = MarkdownConverter
                .convert(&path, &extension)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{}", markdown);
        }
        Commands::CheckUrl { url } => match validate::validate_url(&url, &cfg.security).await {
            Ok(validated) => {
                println!("ok: {} resolves to a public address", validated);
            }
            Err(e) => {
                println!("blocked: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
