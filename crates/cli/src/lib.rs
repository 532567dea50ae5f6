// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! inline-sync: operator tool for the realtime sync cache.
//!
//! `run` keeps a local cache in sync with the realtime server. `buckets`,
//! `dialogs` and `reset` inspect or clear that cache offline.

mod cli;
mod commands;

pub mod config;
pub mod error;

pub use cli::{Cli, Command, OutputFormat};
pub use config::Config;
pub use error::{Error, Result};

/// Executes a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());

    match cli.command {
        Command::Run { url, token } => {
            let mut sync = config.sync;
            if let Some(url) = url {
                sync.url = url;
            }
            commands::run::run(sync, &db_path, token)
        }
        Command::Buckets { output } => commands::inspect::buckets(&db_path, output),
        Command::Dialogs { output } => commands::inspect::dialogs(&db_path, output),
        Command::Reset => commands::reset::run(&db_path),
    }
}
