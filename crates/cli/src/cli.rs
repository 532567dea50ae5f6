// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for inspection commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "inline-sync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep a local message cache in sync with the realtime server")]
pub struct Cli {
    /// Config file (default: <data dir>/inline-sync/config.toml)
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Cache database (overrides the config file)
    #[arg(long, global = true, value_name = "path")]
    pub db: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and keep the cache live until interrupted
    Run {
        /// Realtime endpoint (overrides the config file)
        #[arg(long)]
        url: Option<String>,

        /// Session token
        #[arg(long, env = "INLINE_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// List persisted bucket positions
    Buckets {
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// List cached dialogs with unread counters
    Dialogs {
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Clear all synced state (as on logout)
    Reset,
}
