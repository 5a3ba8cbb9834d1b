pub mod export;
pub mod init;
pub mod paginate;
pub mod sort;
pub mod validate;

pub use export::{export, ExportArgs};
pub use init::{init, InitArgs};
pub use paginate::{paginate, PaginateArgs};
pub use sort::{sort, SortArgs};
pub use validate::{validate, ValidateArgs};

use crate::config::resolve;
use anyhow::{Context, Result};
use colored::Colorize;
use sop_editor::{import_from_json, DocumentState, IdGenerator};
use std::fs;
use std::path::Path;

/// Read and sanitize a document file. Returns the raw text alongside.
pub(crate) fn read_document(path: &str, cwd: &str) -> Result<(DocumentState, String)> {
    let full_path = resolve(cwd, Path::new(path));
    let source = fs::read_to_string(&full_path)
        .with_context(|| format!("Cannot read {}", full_path.display()))?;

    let mut ids = IdGenerator::new(path);
    let state = import_from_json(&source, &mut ids)
        .with_context(|| format!("Cannot import {}", full_path.display()))?;
    Ok((state, source))
}

/// Write to `out` (relative to cwd) or stdout
pub(crate) fn write_output(out: Option<&str>, cwd: &str, content: &str) -> Result<()> {
    match out {
        Some(out) => {
            let out_path = resolve(cwd, Path::new(out));
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out_path, content)
                .with_context(|| format!("Cannot write {}", out_path.display()))?;
            eprintln!("  {} Wrote {}", "✓".green(), out_path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

pub(crate) fn now_millis() -> i64 {
    use sop_editor::Clock;
    sop_editor::SystemClock.now_millis()
}
