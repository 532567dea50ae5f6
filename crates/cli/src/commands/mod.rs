// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod inspect;
pub mod reset;
pub mod run;

use std::path::Path;

use inl_core::Database;

use crate::error::{Error, Result};

/// Opens the cache, refusing to create one that does not exist yet.
pub(crate) fn open_existing(db_path: &Path) -> Result<Database> {
    if !db_path.exists() {
        return Err(Error::NoCache(db_path.to_path_buf()));
    }
    Ok(Database::open(db_path)?)
}
