//! Command-line interface.

mod commands;

use clap::{Parser, Subcommand};

pub use commands::*;

/// Download lifecycle reconciliation and import daemon
#[derive(Parser)]
#[command(name = "fetcharr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the download monitor until interrupted
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Run a single reconciliation cycle
    #[command(alias = "-c", alias = "--check")]
    Check,

    /// Test connectivity of every enabled download client
    Clients,

    /// Cancel a tracked download
    Cancel {
        /// Download ID
        id: i32,
        /// Also delete downloaded data on the client
        #[arg(long)]
        delete_files: bool,
    },

    /// Show recently blacklisted releases
    Blacklist {
        /// Number of entries to show
        #[arg(long, default_value_t = crate::constants::limits::DEFAULT_BLACKLIST_LIMIT)]
        limit: u64,
    },

    /// Show recent downloads
    #[command(alias = "h")]
    History {
        /// Number of entries to show
        #[arg(default_value = "10")]
        limit: u64,
    },
}
