//! hostns CLI
//!
//! Runs commands and filesystem operations inside the namespaces of another
//! process, typically the host's, from inside a container.

use std::process;

use clap::Parser;
use hostns_namespace::reexec;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

fn main() {
    // Must run before the async runtime starts any thread: a multi-threaded
    // process cannot enter a mount namespace.
    reexec::maybe_run_child();
    run();
}

#[tokio::main]
async fn run() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::dispatch(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
