//! Command dispatch.

/// Clap argument definitions
mod args;

/// Config command handlers
mod config;

/// Document commands (create, append, read, delete, list)
mod document;

use clap::Parser;
use serde::Serialize;

use blocksync_core::error::Result;

pub use args::Cli;
use args::Commands;

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Config { command } => config::handle_config_command(command),
        command => document::handle_document_command(command, cli.workspace),
    };

    if let Err(e) = outcome {
        log::debug!("Command failed: {e:?}");
        let error = e.to_serializable();
        match serde_json::to_string_pretty(&error) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("✗ {e}"),
        }
        std::process::exit(1);
    }
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
