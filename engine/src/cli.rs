//! CLI interface for TiaBridge
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TiaBridge query engine
///
/// Answers natural-language questions about the Celestia network by planning
/// multi-step queries over the Cosmos REST API and the local analytics API.
#[derive(Parser, Debug)]
#[command(name = "tiabridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web chat server
    Serve,

    /// Answer one question and exit
    Ask {
        /// The question to answer
        question: String,
    },

    /// List the operations in the catalog
    Catalog,

    /// Validate configuration and check provider availability
    Doctor,
}
