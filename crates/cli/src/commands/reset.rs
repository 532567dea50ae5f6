// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use inl_core::Store;

use crate::commands::open_existing;
use crate::error::Result;

/// Clears every synced row and bucket position.
pub fn run(db_path: &Path) -> Result<()> {
    let mut db = open_existing(db_path)?;
    db.reset()?;
    println!("Cleared sync state in {}", db_path.display());
    Ok(())
}
