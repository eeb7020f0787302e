//! MarginKit CLI — attach margins to purchase line items.
//!
//! Reads a JSON array of items, looks up each item's reference document,
//! and writes the enriched array to stdout.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
