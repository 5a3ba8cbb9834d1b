use crate::config::resolve;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sop_editor::{EditorConfig, HeightTable, Paginator};
use std::fs;
use std::path::Path;

use super::{read_document, write_output};

#[derive(Debug, Args)]
pub struct PaginateArgs {
    /// Document JSON file
    pub document: String,

    /// Measured heights: `{"rows": {...}, "columns": {...}, "footers": {...}}`
    #[arg(long)]
    pub heights: Option<String>,

    /// Print the page layout as JSON
    #[arg(long)]
    pub json: bool,

    /// Write JSON output here instead of stdout
    #[arg(short, long, requires = "json")]
    pub out: Option<String>,
}

pub fn paginate(args: PaginateArgs, config: &EditorConfig, cwd: &str) -> Result<()> {
    let (state, _) = read_document(&args.document, cwd)?;

    let heights = match &args.heights {
        Some(path) => {
            let full_path = resolve(cwd, Path::new(path));
            let source = fs::read_to_string(&full_path)
                .with_context(|| format!("Cannot read {}", full_path.display()))?;
            serde_json::from_str::<HeightTable>(&source)
                .with_context(|| format!("Invalid height table {}", full_path.display()))?
        }
        None => HeightTable::new(),
    };

    let mut paginator = Paginator::new(config.page.clone(), 0);
    paginator.measure(&heights, &state, 0);
    let layout = paginator.settle(&state);

    if args.json {
        let json = serde_json::to_string_pretty(layout)?;
        return write_output(args.out.as_deref(), cwd, &json);
    }

    let unmeasured = state
        .rows
        .iter()
        .filter(|row| !heights.rows.contains_key(&row.id))
        .count();

    println!(
        "{} {} ({} rows)",
        "📄".bright_blue(),
        args.document.bright_white(),
        state.rows.len()
    );
    for page in &layout.pages {
        let usage = format!("{:.1} / {:.1} px", page.used_height, page.budget);
        let usage = if page.overflows() {
            format!("{} {}", usage.red(), "(oversized row)".red())
        } else {
            usage.normal().to_string()
        };
        println!(
            "  {} Page {}: {} rows, {}",
            "✓".green(),
            page.number,
            page.row_ids.len(),
            usage
        );
    }

    if unmeasured > 0 {
        println!(
            "  {} {} rows have no measured height and count as 0px",
            "⚠️".yellow(),
            unmeasured
        );
    }

    println!();
    println!(
        "{}",
        format!("✅ {} page(s)", layout.page_count()).green().bold()
    );

    Ok(())
}
