//! # modelgraph - Model Graph Tooling
//!
//! The main binary for the modelgraph persistence engine.
//!
//! ## Usage
//!
//! ```bash
//! # Header summary without building the graph
//! modelgraph inspect model.graph
//!
//! # Load and check save -> load -> save stability
//! modelgraph verify model.graph
//!
//! # Partition into redb, then look up lazily
//! modelgraph partition model.graph -o objs.redb
//! modelgraph lookup -d objs.redb -k Class model::Person --resolve
//! ```

use clap::Parser;
use modelgraph::cli;
use modelgraph::config::{Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config.with_overrides(cli.max_node_count, cli.max_array_length),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(&config, cli.verbose);
    tracing::debug!(limits = ?config.limits, "configuration loaded");

    if let Err(e) = cli::execute(cli, config.limits) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. MODELGRAPH_LOG_FORMAT=json enables machine-parseable output.
fn init_tracing(config: &Config, verbose: bool) {
    let format = std::env::var("MODELGRAPH_LOG_FORMAT")
        .ok()
        .and_then(|value| LogFormat::parse(&value))
        .unwrap_or(config.logging.format);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter(verbose).into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
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
