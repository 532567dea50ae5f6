// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline views of the cache.

use std::io::{self, Write};
use std::path::Path;

use inl_core::{Dialog, Store, StoredCursor};

use crate::cli::OutputFormat;
use crate::commands::open_existing;
use crate::error::Result;

pub fn buckets(db_path: &Path, output: OutputFormat) -> Result<()> {
    let cursors = open_existing(db_path)?.load_cursors()?;
    write_buckets(&mut io::stdout().lock(), &cursors, output)
}

pub fn dialogs(db_path: &Path, output: OutputFormat) -> Result<()> {
    let dialogs = open_existing(db_path)?.list_dialogs()?;
    write_dialogs(&mut io::stdout().lock(), &dialogs, output)
}

pub(crate) fn write_buckets(
    out: &mut impl Write,
    cursors: &[StoredCursor],
    output: OutputFormat,
) -> Result<()> {
    match output {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, cursors)?;
            writeln!(out)?;
        }
        OutputFormat::Text if cursors.is_empty() => writeln!(out, "No buckets tracked")?,
        OutputFormat::Text => {
            for cursor in cursors {
                writeln!(
                    out,
                    "{:<24} {:>10}  {}",
                    cursor.bucket.to_string(),
                    cursor.sequence,
                    cursor.date.to_rfc3339()
                )?;
            }
        }
    }
    Ok(())
}

fn dialog_line(dialog: &Dialog) -> String {
    let read = dialog
        .read_inbox_max_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let mut line = format!(
        "{:<16} unread {:>4}  read {:>8}",
        dialog.peer.to_string(),
        dialog.unread_count,
        read
    );
    for (set, flag) in [
        (dialog.unread_mark, "marked"),
        (dialog.pinned, "pinned"),
        (dialog.archived, "archived"),
    ] {
        if set {
            line.push_str("  [");
            line.push_str(flag);
            line.push(']');
        }
    }
    line
}

pub(crate) fn write_dialogs(
    out: &mut impl Write,
    dialogs: &[Dialog],
    output: OutputFormat,
) -> Result<()> {
    match output {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, dialogs)?;
            writeln!(out)?;
        }
        OutputFormat::Text if dialogs.is_empty() => writeln!(out, "No dialogs cached")?,
        OutputFormat::Text => {
            for dialog in dialogs {
                writeln!(out, "{}", dialog_line(dialog))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "inspect_tests.rs"]
mod tests;
