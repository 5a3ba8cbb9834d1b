use anyhow::Result;
use clap::Args;
use colored::Colorize;
use sop_editor::{export_as_json, DocumentState, EditorConfig, DEFAULT_CONFIG_NAME};
use std::fs;
use std::path::PathBuf;

use super::now_millis;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Also write a starter document with this file name
    #[arg(short, long)]
    pub document: Option<String>,

    /// Force overwrite existing files
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing SOP workspace...".bright_blue().bold());

    let config_json = serde_json::to_string_pretty(&EditorConfig::default())?;
    fs::write(&config_path, config_json)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    if let Some(document) = &args.document {
        let document_path = PathBuf::from(cwd).join(document);
        if document_path.exists() && !args.force {
            println!("  {} {} exists, skipped", "⚠️".yellow(), document);
        } else {
            let content = export_as_json(&DocumentState::initial(), now_millis())?;
            fs::write(&document_path, content)?;
            println!("  {} Created {}", "✓".green(), document);
        }
    }

    println!();
    println!("{}", "✅ Workspace initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Adjust page geometry in {}", DEFAULT_CONFIG_NAME);
    println!("  2. Run: sop paginate <document.json> --heights <heights.json>");

    Ok(())
}
