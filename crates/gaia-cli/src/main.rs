//! GAIA CLI - adversarial multi-agent ESG analysis from the command line
//!
//! # Usage
//!
//! ```bash
//! # Analyse a company with the simulated workers
//! gaia analyze "Acme Mining"
//!
//! # Two debate rounds, machine-readable output
//! gaia analyze "Acme Mining" --rounds 2 --json
//!
//! # Show the effective configuration
//! gaia info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod workers;

use commands::{analyze, info};

/// GAIA - adversarial consensus over independent analysis workers
#[derive(Parser)]
#[command(
    name = "gaia",
    version,
    about = "GAIA CLI - Multi-agent ESG analysis",
    long_about = "GAIA runs independent analysis workers against a company,\n\
                  lets them challenge each other's findings with counter-evidence,\n\
                  and reduces the survivors into an auditable consensus score."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis and print the consensus
    #[command(name = "analyze")]
    Analyze(analyze::AnalyzeArgs),

    /// Show version and effective configuration
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Analyze(args) => analyze::run(args).await,
        Commands::Info(args) => info::run(args),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

/// Print a success message with a checkmark
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message with an X
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
