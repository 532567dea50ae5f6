// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use inl_core::Database;
use inl_sync::{SyncConfig, SyncRunner, WebSocketTransport};

use crate::error::{Error, Result};

/// Connects and syncs until Ctrl-C or a fatal session error.
pub fn run(config: SyncConfig, db_path: &Path, token: String) -> Result<()> {
    if let Some(msg) = config.validate_url() {
        return Err(Error::InvalidUrl(msg));
    }
    let db = Database::open(db_path)?;
    tracing::info!(db = %db_path.display(), url = %config.url, "starting sync");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(config, db, token))
}

async fn run_async(config: SyncConfig, db: Database, token: String) -> Result<()> {
    let mut runner = SyncRunner::new(config, WebSocketTransport::new(), db, token)?;
    let engine = runner.engine();

    let shutdown = runner.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, shutting down");
            shutdown.cancel();
        }
    });

    let result = runner.run().await;

    let stats = serde_json::to_string(&engine.get_sync_stats())?;
    tracing::info!(%stats, "final sync stats");
    Ok(result?)
}
