// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod cmd;
mod config;
mod generator;
mod plan;
mod progress;
mod schema;
mod seeder;
mod workload;

use clap::Parser;
use cmd::Cli;
use tracing_subscriber::EnvFilter;

/// Log to stderr; `-v` flags override RUST_LOG, which overrides `info`
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = cmd::run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
