use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deepdelve::config::Cli;
use deepdelve::data::items;
use deepdelve::{Registry, server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.dump_items {
        let catalog = serde_json::to_string_pretty(&items::catalog())?;
        println!("{catalog}");
        return Ok(());
    }

    let addr = cli.bind_addr().context("invalid listen address")?;
    let registry = Registry::new(cli.settings());
    server::serve(addr, registry).await
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with_target(false)
        .init();
}
