//! # AtomSpace CLI Module
//!
//! This module implements the CLI interface for AtomSpace snapshots.
//!
//! ## Available Commands
//!
//! - `init` - Write an empty snapshot
//! - `inspect` - Show counts, types and repositories of a snapshot
//! - `export` - Convert a snapshot to a JSON dump
//! - `import` - Build a snapshot from a JSON dump
//! - `verify` - Check that a snapshot loads completely and re-saves stably

mod commands;

use crate::config::Settings;
use atomspace_core::PersistError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// AtomSpace snapshot tool
///
/// Saves, loads and converts binary snapshots of an AtomSpace hypergraph.
#[derive(Parser, Debug)]
#[command(name = "atomspace")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Report load and save progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML config file (default: ./atomspace.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Report progress every N records
    #[arg(long, global = true)]
    pub progress_interval: Option<u64>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an empty snapshot
    Init {
        /// Output snapshot path
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show what a snapshot contains
    Inspect {
        /// Snapshot to inspect
        file: PathBuf,
    },

    /// Convert a snapshot to a JSON dump
    Export {
        /// Snapshot to read
        file: PathBuf,

        /// Output JSON path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build a snapshot from a JSON dump
    Import {
        /// JSON dump to read
        dump: PathBuf,

        /// Output snapshot path
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Load a snapshot, re-save it and check the result is stable
    Verify {
        /// Snapshot to verify
        file: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved settings.
pub fn execute(cli: Cli, settings: &Settings) -> Result<(), PersistError> {
    let options = RunOptions {
        progress_interval: settings.progress_interval,
        verbose: cli.verbose,
        json: cli.json,
    };

    match cli.command {
        Commands::Init { output, force } => cmd_init(&output, force),
        Commands::Inspect { file } => cmd_inspect(&file, &options),
        Commands::Export { file, output } => cmd_export(&file, &output, &options),
        Commands::Import {
            dump,
            output,
            force,
        } => cmd_import(&dump, &output, force, &options),
        Commands::Verify { file } => cmd_verify(&file, &options),
    }
}
