use anyhow::Result;
use clap::Args;
use sop_editor::export_as_json;

use super::{now_millis, read_document, write_output};

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Document JSON file, possibly from an older editor
    pub document: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub out: Option<String>,
}

/// Re-export a document in the current format with fresh metadata
pub fn export(args: ExportArgs, cwd: &str) -> Result<()> {
    let (state, _) = read_document(&args.document, cwd)?;
    let json = export_as_json(&state, now_millis())?;
    write_output(args.out.as_deref(), cwd, &json)
}
