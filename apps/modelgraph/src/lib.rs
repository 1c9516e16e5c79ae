//! # modelgraph
//!
//! Command-line tooling over `modelgraph-core`: inspect, verify, partition
//! and look up serialized model graphs.
//!
//! - `cli`: clap command tree and command implementations
//! - `config`: `modelgraph.toml` loading

pub mod cli;
pub mod config;
