//! CLI definitions for WebRefactor.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// WebRefactor CLI.
#[derive(Parser)]
#[command(name = "webrefactor")]
#[command(about = "Rewrite web pages from natural-language prompts, safely")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    /// Data directory (storage and logs); overrides `[storage] data_dir`
    #[arg(long, global = true, env = "WEBREFACTOR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Refactor a page (http(s) URL or local file) with a prompt
    Refactor {
        /// Page URL or file path
        page: String,

        /// What to change, in plain language
        #[arg(short, long)]
        prompt: String,

        /// Write the resulting document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the successful batch as the page's domain memory
        #[arg(long)]
        save: bool,
    },

    /// Load a page the way a browser would, replaying domain memory when
    /// auto-refactor is enabled
    Replay {
        /// Page URL or file path
        page: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Domain memory commands
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Send a trivial request with the stored settings
    TestConnection,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum MemoryAction {
    /// Refactor a page and save the batch for its hostname
    Save {
        page: String,

        #[arg(short, long)]
        prompt: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply a hostname's memory to a page
    Apply {
        page: String,

        /// Hostname whose memory to use (default: the page's own)
        #[arg(long)]
        domain: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the replayable entry for a hostname
    Show { domain: String },

    /// Show the save history for a hostname
    History {
        domain: String,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Delete a hostname's entry and history
    Forget { domain: String },

    /// List hostnames with memory
    List,
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Validate the configuration file
    Check,

    /// Print the settings currently in storage
    Show,

    /// Overwrite stored settings with the configuration file's `[settings]`
    Apply,

    /// Turn automatic replay on or off
    AutoRefactor {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}
