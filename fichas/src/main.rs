//! Headless front end for the fichas character sheet engine.
//!
//! Every command prints JSON to stdout; logs go to stderr.
//!
//! ```bash
//! cargo run -p fichas -- sample --name Ayla > ayla.json
//! cargo run -p fichas -- roll --sheet ayla.json --attr FOR --arm advantages/furia
//! cargo run -p fichas -- import batch.json --store db.json --mode create-only
//! ```

mod cli;
mod commands;

use anyhow::Result;
use fichas_core::EngineConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = match cli::parse_args(&args) {
        Ok(cli::Command::Help) => {
            cli::print_help();
            return Ok(());
        }
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            cli::print_help();
            std::process::exit(2);
        }
    };

    let config = EngineConfig::from_env()?;
    let output = commands::run(command, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
