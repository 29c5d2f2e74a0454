//! CLI module - Command-line interface for the S2 admin backend
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// S2 Design Interior admin backend
/// Authentication and password recovery API for the admin panel
#[derive(Parser)]
#[command(name = "s2admin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    Init,

    /// Load and validate configuration, then report problems
    #[command(alias = "check")]
    CheckConfig,
}

pub use commands::*;
