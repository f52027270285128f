//! # AtomSpace - Snapshot Tool
//!
//! The main binary for working with AtomSpace snapshot files.
//!
//! ## Usage
//!
//! ```bash
//! # Create an empty snapshot
//! atomspace init -o graph.atsp
//!
//! # Inspect and verify
//! atomspace inspect graph.atsp --json
//! atomspace verify graph.atsp
//!
//! # Convert to and from JSON
//! atomspace export graph.atsp -o graph.json
//! atomspace import graph.json -o rebuilt.atsp
//! ```

use atomspace::cli;
use atomspace::config::{FileConfig, LOG_FORMAT_ENV, LogFormat, Settings};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // Config is read before logging exists; a failure is reported once the
    // subscriber is installed.
    let file_config = FileConfig::load(cli.config.as_deref());
    let env_format = std::env::var(LOG_FORMAT_ENV).ok();
    let settings = Settings::resolve(
        file_config.as_ref().unwrap_or(&FileConfig::default()),
        cli.progress_interval,
        env_format.as_deref(),
    );

    init_tracing(settings.log_format);

    if let Err(e) = file_config {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = cli::execute(cli, &settings) {
        tracing::error!(kind = ?e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber on stderr, keeping stdout for command
/// output. `RUST_LOG` overrides the default filter.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atomspace=info,atomspace_core=info".into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
