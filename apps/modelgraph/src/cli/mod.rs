//! # modelgraph CLI Module
//!
//! This module implements the command-line interface for modelgraph.
//!
//! ## Available Commands
//!
//! - `inspect` - Summarize a serialized graph without building it
//! - `verify` - Load a graph and check that it re-serializes byte-identically
//! - `partition` - Split a graph into classifier partitions in a redb database
//! - `lookup` - Load one instance lazily from a partitioned database
//! - `store` - Write a serialized graph into a module store
//! - `load` - Read a module back from a module store

mod commands;

use clap::{Parser, Subcommand};
use modelgraph_core::{GraphError, Limits};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// modelgraph - persistence tooling for classified object graphs
#[derive(Parser, Debug)]
#[command(name = "modelgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a modelgraph.toml configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the maximum declared node count
    #[arg(long, global = true)]
    pub max_node_count: Option<u32>,

    /// Override the maximum length prefix
    #[arg(long, global = true)]
    pub max_array_length: Option<u32>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a serialized graph without building it
    Inspect {
        /// Serialized graph file
        file: PathBuf,
    },

    /// Load a serialized graph and check that saving it again gives the same bytes
    Verify {
        /// Serialized graph file
        file: PathBuf,
    },

    /// Partition a serialized graph into a redb instance database
    Partition {
        /// Serialized graph file
        file: PathBuf,

        /// Database to create or extend
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Look up one instance in a partitioned database
    Lookup {
        /// Partitioned database
        #[arg(short, long)]
        database: PathBuf,

        /// Classifier name, e.g. Class
        #[arg(short = 'k', long)]
        classifier: String,

        /// Instance identifier, e.g. model::Person
        id: String,

        /// Also load every instance the properties refer to
        #[arg(short, long)]
        resolve: bool,
    },

    /// Store a serialized graph as a module
    Store {
        /// Serialized graph file
        file: PathBuf,

        /// Module store root directory
        #[arg(short, long)]
        root: PathBuf,

        /// Module name
        #[arg(short, long)]
        module: String,
    },

    /// Read a module back from a module store
    Load {
        /// Module store root directory
        #[arg(short, long)]
        root: PathBuf,

        /// Module name
        #[arg(short, long)]
        module: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved limits.
pub fn execute(cli: Cli, limits: Limits) -> Result<(), GraphError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Inspect { file } => cmd_inspect(&file, limits, json_mode),
        Commands::Verify { file } => cmd_verify(&file, limits, json_mode),
        Commands::Partition { file, output } => cmd_partition(&file, &output, limits, json_mode),
        Commands::Lookup {
            database,
            classifier,
            id,
            resolve,
        } => cmd_lookup(&database, &classifier, &id, resolve, json_mode),
        Commands::Store { file, root, module } => {
            cmd_store(&file, &root, &module, limits, json_mode)
        }
        Commands::Load { root, module } => cmd_load(&root, &module, limits, json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "modelgraph",
            "inspect",
            "model.graph",
            "--json-mode",
            "--max-node-count",
            "12",
        ])
        .unwrap();
        assert!(cli.json_mode);
        assert_eq!(cli.max_node_count, Some(12));
        match cli.command {
            Commands::Inspect { file } => assert_eq!(file, PathBuf::from("model.graph")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn lookup_arguments() {
        let cli = Cli::try_parse_from([
            "modelgraph",
            "lookup",
            "-d",
            "objs.redb",
            "-k",
            "Class",
            "model::Person",
            "--resolve",
        ])
        .unwrap();
        match cli.command {
            Commands::Lookup {
                database,
                classifier,
                id,
                resolve,
            } => {
                assert_eq!(database, PathBuf::from("objs.redb"));
                assert_eq!(classifier, "Class");
                assert_eq!(id, "model::Person");
                assert!(resolve);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn a_subcommand_is_required() {
        assert!(Cli::try_parse_from(["modelgraph"]).is_err());
    }
}
