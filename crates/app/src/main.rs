//! BaiNian command-line front end.
//!
//! Plays the roles of the extension's surfaces: `lookup` is the context
//! action on a page, `history` the popup, `editor` and `config` the options
//! page.

mod cli;
mod commands;
mod history_view;
mod paths;
mod terminal_canvas;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    commands::run(cli).await
}
