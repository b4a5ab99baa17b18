// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmlink CLI
//!
//! Demo creator (`serve`) and attacher (`send`) for the shmlink segment.
//! Start `serve` first; it blocks until `send` writes.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

/// shmlink - Two-process shared memory handshake demo
#[derive(Parser)]
#[command(name = "shmlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults apply if the default file is absent)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the segment, wait for data, print it transformed
    Serve,

    /// Attach to the segment and write the alphabet into it
    Send,

    /// Validate a configuration file
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Could not load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Dispatch to command handlers
    let (role, result) = match cli.command {
        Commands::Serve => ("Server", commands::serve::execute(&config)),
        Commands::Send => ("Client", commands::send::execute(&config)),
        Commands::Validate => ("Validate", commands::validate::execute(&config)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", role, e);
            ExitCode::FAILURE
        }
    }
}
