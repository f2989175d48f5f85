//! Info command - Show version and effective configuration
//!
//! Usage:
//! ```bash
//! gaia info
//! gaia info --json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use gaia_runtime::EngineConfig;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Print the configuration as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the info command
pub fn run(args: InfoArgs) -> Result<()> {
    let config = EngineConfig::from_env()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let version = env!("CARGO_PKG_VERSION");

    println!("{}", "GAIA - Adversarial ESG Analysis".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    println!("  {} {}", "CLI Version:".dimmed(), version.green());
    println!();

    println!("{}", "Runtime:".bold());
    println!(
        "  {} {} ms",
        "Per-worker timeout:".dimmed(),
        config.per_worker_timeout_ms
    );
    println!(
        "  {} {} ms",
        "Total deadline:".dimmed(),
        config.total_deadline_ms
    );
    println!(
        "  {} {}",
        "Max concurrent workers:".dimmed(),
        config.max_concurrent_workers
    );
    println!(
        "  {} {}",
        "Subscriber buffer:".dimmed(),
        config.subscriber_buffer
    );
    println!();

    let debate = &config.debate;
    println!("{}", "Debate:".bold());
    println!("  {} {}", "Rounds:".dimmed(), debate.rounds);
    println!(
        "  {} {:.2}",
        "Challenge threshold:".dimmed(),
        debate.challenge_threshold
    );
    println!(
        "  {} {:.2}",
        "Rejection threshold:".dimmed(),
        debate.rejection_threshold
    );
    println!(
        "  {} {:?}",
        "Minimum challenge severity:".dimmed(),
        debate.min_challenge_severity
    );
    println!(
        "  {} {} days",
        "Contradiction slack:".dimmed(),
        debate.contradiction_slack_days
    );
    println!();

    let confidence = &config.confidence;
    println!("{}", "Confidence:".bold());
    println!(
        "  {} {} days",
        "Recency half-life:".dimmed(),
        confidence.recency_half_life_days
    );
    println!(
        "  {} {:.2}",
        "Volume bonus max:".dimmed(),
        confidence.volume_bonus_max
    );
    println!(
        "  {} {:.2} / {:.2}",
        "Cross / same domain weight:".dimmed(),
        confidence.cross_domain_weight,
        confidence.same_domain_weight
    );
    println!();

    println!("{}", "Configuration:".bold());
    println!(
        "  {} Override with GAIA_DEBATE_ROUNDS, GAIA_WORKER_TIMEOUT_MS, GAIA_TOTAL_DEADLINE_MS,",
        "ℹ".blue()
    );
    println!("    GAIA_MAX_CONCURRENT_WORKERS, GAIA_CHALLENGE_THRESHOLD, GAIA_REJECTION_THRESHOLD");
    println!();

    Ok(())
}
