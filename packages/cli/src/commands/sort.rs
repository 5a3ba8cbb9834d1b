use anyhow::Result;
use clap::Args;
use colored::Colorize;
use sop_editor::{export_as_json, sort_content_boxes_by_category, IdGenerator};

use super::{now_millis, read_document, write_output};

#[derive(Debug, Args)]
pub struct SortArgs {
    /// Document JSON file
    pub document: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub out: Option<String>,
}

pub fn sort(args: SortArgs, cwd: &str) -> Result<()> {
    let (state, _) = read_document(&args.document, cwd)?;
    let mut ids = IdGenerator::new(&args.document);
    ids.observe(state.all_ids());
    let sorted = sort_content_boxes_by_category(&state, &mut ids);

    if sorted == state {
        eprintln!("  {} Content boxes already in order", "✓".green());
    }

    let json = export_as_json(&sorted, now_millis())?;
    write_output(args.out.as_deref(), cwd, &json)
}
