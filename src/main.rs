//! nova CLI entrypoint

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nova::cli::Cli;
use nova::core::log_filter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries run results, logs go to stderr
    tracing_subscriber::registry()
        .with(log_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Cli::parse().execute().await
}
