mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    export, init, paginate, sort, validate, ExportArgs, InitArgs, PaginateArgs, SortArgs,
    ValidateArgs,
};
use tracing_subscriber::EnvFilter;

/// SOP editor toolkit - paginate, validate and normalize SOP documents
#[derive(Parser, Debug)]
#[command(name = "sop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./sop.config.json when present)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default sop.config.json (and optionally a starter document)
    Init(InitArgs),

    /// Compute page breaks for a document against measured row heights
    Paginate(PaginateArgs),

    /// Check that a JSON file imports cleanly and report what was repaired
    Validate(ValidateArgs),

    /// Re-export a document in canonical form with export metadata
    Export(ExportArgs),

    /// Reorder content boxes into the canonical category order
    Sort(SortArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SOP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();
    let config = config::load(&cwd, cli.config.as_deref())?;

    match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Paginate(args) => paginate(args, &config, &cwd),
        Command::Validate(args) => validate(args, &cwd),
        Command::Export(args) => export(args, &cwd),
        Command::Sort(args) => sort(args, &cwd),
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
