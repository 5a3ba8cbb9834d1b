use anyhow::Result;
use clap::Args;
use colored::Colorize;
use sop_editor::DocumentState;

use super::read_document;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Document JSON files
    #[arg(required = true)]
    pub documents: Vec<String>,
}

pub fn validate(args: ValidateArgs, cwd: &str) -> Result<()> {
    let mut failures = 0;

    for document in &args.documents {
        match read_document(document, cwd) {
            Ok((state, source)) => {
                // Strict parse tells canonical files apart from repaired ones
                let canonical = serde_json::from_str::<DocumentState>(&source)
                    .map(|strict| strict == state)
                    .unwrap_or(false);
                let marker = if canonical {
                    "✓".green()
                } else {
                    "~".yellow()
                };
                println!(
                    "  {} {} ({} rows, {} blocks, {} title){}",
                    marker,
                    document,
                    state.rows.len(),
                    state.block_count(),
                    state.title_count(),
                    if canonical { "" } else { " repaired on import" }
                );
            }
            Err(e) => {
                failures += 1;
                println!("  {} {}", "✗".red(), document);
                println!("    {:#}", e);
            }
        }
    }

    println!();
    if failures > 0 {
        anyhow::bail!("{} of {} documents failed", failures, args.documents.len());
    }
    println!("{}", "✅ All documents valid".green().bold());

    Ok(())
}
