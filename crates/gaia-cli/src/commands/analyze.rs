//! Analyze command - Run the simulated workers against a target
//!
//! Usage:
//! ```bash
//! gaia analyze "Acme Mining"
//! gaia analyze "Acme Mining" --rounds 1 --worker-timeout-ms 500 --slow-worker
//! gaia analyze "Acme Mining" --json
//! ```

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use colored::{ColoredString, Colorize};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use futures::StreamExt;
use std::sync::Arc;

use gaia_core::{ConsensusResult, RiskLevel};
use gaia_runtime::{
    Engine, EngineConfig, ProgressEvent, ProgressUpdate, RunStatus, TracingSink, WorkerRegistry,
};

use crate::workers;
use crate::{print_error, print_info, print_success, print_warning};

/// Arguments for the analyze command
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Company or entity to analyse
    pub target: String,

    /// Maximum debate rounds
    #[arg(long)]
    pub rounds: Option<u32>,

    /// Per-worker timeout in milliseconds
    #[arg(long)]
    pub worker_timeout_ms: Option<u64>,

    /// Deadline for the whole run in milliseconds
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Print the result as JSON instead of tables
    #[arg(long)]
    pub json: bool,

    /// Make one worker hang so the timeout path is visible
    #[arg(long)]
    pub slow_worker: bool,
}

/// Run the analyze command
pub async fn run(args: AnalyzeArgs) -> Result<()> {
    let mut config = EngineConfig::from_env()?;
    if let Some(rounds) = args.rounds {
        config.debate.rounds = rounds;
    }
    if let Some(ms) = args.worker_timeout_ms {
        config.per_worker_timeout_ms = ms;
    }
    if let Some(ms) = args.deadline_ms {
        config.total_deadline_ms = ms;
    }
    config.validate()?;
    let options = config.run_options();

    let registry = WorkerRegistry::from_workers(workers::roster(Utc::now(), args.slow_worker))?;
    let engine = Engine::builder()
        .config(config)
        .registry(registry)
        .sink(Arc::new(TracingSink))
        .build()?;

    let run = engine.start_run(&args.target, options).await?;
    let mut progress = engine.subscribe(run).await?;
    while let Some(update) = progress.next().await {
        if !args.json {
            print_progress(&update);
        }
    }

    match engine.wait(run).await? {
        RunStatus::Completed(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(result.as_ref())?);
            } else {
                print_result(&result);
            }
            Ok(())
        }
        RunStatus::Failed { reason, partial } => {
            if args.json {
                let body = serde_json::json!({
                    "status": "failed",
                    "reason": &reason,
                    "partial": partial.as_deref(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else if let Some(partial) = &partial {
                print_warning("Showing partial result");
                print_result(partial);
            }
            bail!("run {} failed: {}", run, reason)
        }
        RunStatus::Pending => bail!("run {} ended without a result", run),
    }
}

fn print_progress(update: &ProgressUpdate) {
    match &update.event {
        ProgressEvent::RunStarted { target, workers } => {
            print_info(&format!(
                "Analysing {} with {}",
                target.bold(),
                workers.join(", ")
            ));
            println!();
        }
        ProgressEvent::WorkerCompleted {
            worker_id,
            findings,
            attempts,
        } => print_success(&format!(
            "{} returned {} finding(s) after {} attempt(s)",
            worker_id.green(),
            findings,
            attempts
        )),
        ProgressEvent::WorkerTimeout {
            worker_id,
            partial_findings,
        } => print_warning(&format!(
            "{} timed out, kept {} partial finding(s)",
            worker_id.yellow(),
            partial_findings
        )),
        ProgressEvent::WorkerError {
            worker_id, error, ..
        } => print_error(&format!("{} failed: {}", worker_id.red(), error)),
        ProgressEvent::DebateRoundStarted { round } => {
            println!("{} Debate round {}", "⚔".cyan(), round)
        }
        ProgressEvent::DebateRoundCompleted {
            round,
            challenges_accepted,
        } => println!(
            "  {} round {}: {} challenge(s) accepted",
            "→".dimmed(),
            round,
            challenges_accepted
        ),
        ProgressEvent::RunCompleted { .. } | ProgressEvent::RunFailed { .. } => {}
    }
}

fn risk_label(risk: RiskLevel) -> ColoredString {
    let label = risk.as_str().to_uppercase();
    match risk {
        RiskLevel::Critical | RiskLevel::High => label.red().bold(),
        RiskLevel::Moderate => label.yellow().bold(),
        RiskLevel::Low | RiskLevel::Minimal => label.green().bold(),
    }
}

fn score_color(score: f64) -> Color {
    if score < 40.0 {
        Color::Red
    } else if score < 60.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn print_result(result: &ConsensusResult) {
    println!();
    println!(
        "{} {}",
        "🌍 Consensus for".bold().cyan(),
        result.target.bold()
    );
    println!();

    let mut scores = Table::new();
    scores
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Category").fg(Color::Cyan),
            Cell::new("Score").fg(Color::Cyan),
            Cell::new("Weight").fg(Color::Cyan),
            Cell::new("Findings").fg(Color::Cyan),
            Cell::new("Agreement").fg(Color::Cyan),
            Cell::new("Dissenting").fg(Color::Cyan),
        ]);
    for category in &result.category_scores {
        scores.add_row(vec![
            Cell::new(category.category.as_str()),
            Cell::new(format!("{:.1}", category.score)).fg(score_color(category.score)),
            Cell::new(format!("{:.2}", category.weight)),
            Cell::new(category.findings.len()),
            Cell::new(format!("{:.0}%", category.agreement * 100.0)),
            Cell::new(category.dissenting_workers.join(", ")).fg(Color::Yellow),
        ]);
    }
    println!("{scores}");
    println!();

    println!(
        "{} {:.1}  {} {}  {} {:?}",
        "Overall:".bold(),
        result.overall_score,
        "Risk:".bold(),
        risk_label(result.risk_level),
        "Grade:".bold(),
        result.grade
    );
    println!(
        "{} {:.0}/100",
        "Greenwashing risk:".bold(),
        result.greenwashing_risk
    );
    println!();

    if !result.signals.is_empty() {
        println!("{}", "Unresolved contradictions:".bold());
        let mut signals = Table::new();
        signals
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Category").fg(Color::Cyan),
                Cell::new("Kept").fg(Color::Cyan),
                Cell::new("Superseded").fg(Color::Cyan),
                Cell::new("Severity").fg(Color::Cyan),
                Cell::new("Pattern").fg(Color::Cyan),
            ]);
        for signal in &result.signals {
            signals.add_row(vec![
                Cell::new(signal.category.as_str()),
                Cell::new(format!(
                    "{} ({:.2})",
                    signal.authoritative, signal.authoritative_confidence
                ))
                .fg(Color::Green),
                Cell::new(format!(
                    "{} ({:.2})",
                    signal.superseded, signal.superseded_confidence
                ))
                .fg(Color::Red),
                Cell::new(format!("{:?}", signal.severity)),
                Cell::new(
                    signal
                        .pattern
                        .map(|p| format!("{:?}", p))
                        .unwrap_or_else(|| "-".into()),
                ),
            ]);
        }
        println!("{signals}");
        println!();
    }

    println!("{}", "Findings:".bold());
    let mut findings = Table::new();
    findings
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Id").fg(Color::Cyan),
            Cell::new("Claim").fg(Color::Cyan),
            Cell::new("Polarity").fg(Color::Cyan),
            Cell::new("Severity").fg(Color::Cyan),
            Cell::new("Confidence").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
        ]);
    for finding in &result.audit.findings {
        findings.add_row(vec![
            Cell::new(&finding.id).fg(Color::Green),
            Cell::new(&finding.title),
            Cell::new(format!("{:?}", finding.polarity)),
            Cell::new(format!("{:?}", finding.severity)),
            Cell::new(format!(
                "{:.2} (from {:.2})",
                finding.confidence(),
                finding.initial_confidence()
            )),
            Cell::new(format!("{:?}", finding.status())),
        ]);
    }
    println!("{findings}");
    println!();

    println!(
        "{} {} ({} rounds, {} evidence items)",
        "Audit digest:".dimmed(),
        result.audit.digest.to_hex(),
        result.audit.rounds.len(),
        result.audit.evidence.len()
    );
}
