//! Taleforge headless player.
//!
//! Builds a world stage by stage, generates a character, then plays the
//! story over stdin/stdout:
//!
//! ```bash
//! cargo run -p taleforge -- --seed "a city on the back of a turtle" --concept "a disgraced cartographer"
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change the level.

mod headless;

use clap::Parser;
use std::time::Duration;
use taleforge_core::{ClaudeGateway, GeneratorConfig};
use tracing_subscriber::EnvFilter;

/// Play an interactive story in a freshly generated world.
#[derive(Debug, Parser)]
#[command(name = "taleforge", version, about)]
struct Cli {
    /// Model to use (overrides TALEFORGE_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// An idea for the world
    #[arg(long)]
    seed: Option<String>,

    /// An idea for the player character
    #[arg(long)]
    concept: Option<String>,

    /// Request timeout in seconds (overrides TALEFORGE_TIMEOUT_SECS)
    #[arg(long)]
    timeout: Option<u64>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = GeneratorConfig::from_env()?;
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }

    let gateway = match ClaudeGateway::from_config(&config) {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Please set ANTHROPIC_API_KEY in a .env file or with: export ANTHROPIC_API_KEY=your_key_here");
            std::process::exit(1);
        }
    };

    let options = headless::Options {
        seed: cli.seed,
        concept: cli.concept,
    };
    headless::run(gateway, config, options).await?;
    Ok(())
}
