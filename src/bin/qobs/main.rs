//! Qobs CLI - a cargo-like build orchestrator for C and C++

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("qobs=debug")
    } else if cli.quiet {
        EnvFilter::new("qobs=error")
    } else {
        EnvFilter::new("qobs=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::Add(args) => commands::add::execute(args),
        Commands::Remove(args) => commands::remove::execute(args),
        Commands::Clean(args) => commands::clean::execute(args),
    }
}
