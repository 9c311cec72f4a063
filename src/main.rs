use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod alerts;
mod error;
mod ingest;
mod merge;
mod models;
mod normalize;
mod pipeline;
mod report;
mod risk;
mod trend;

use alerts::{AlertTransport, DryRunTransport, OutboxTransport};
use models::{text, RiskLabel, NAME};
use pipeline::AnalysisSession;

#[derive(Parser)]
#[command(name = "dropout-risk")]
#[command(about = "Rule-based student dropout risk triage from attendance, marks and fees CSVs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Attendance CSV (student_id, attendance, ...)
    #[arg(long)]
    attendance: PathBuf,
    /// Marks CSV (student_id, marks, previous_marks or marks_trend, ...)
    #[arg(long)]
    marks: PathBuf,
    /// Fees CSV (student_id, fees_due, ...)
    #[arg(long)]
    fees: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every student and print the result
    Analyze {
        #[command(flatten)]
        inputs: Inputs,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Notify mentors of high-risk students
    Alerts {
        #[command(flatten)]
        inputs: Inputs,
        /// Deliver alerts instead of only logging them
        #[arg(long, env = "ENABLE_ALERTS")]
        enable_alerts: bool,
        #[arg(long, env = "ALERT_SENDER", default_value = "alerts@localhost")]
        sender: String,
        /// Directory that receives one .eml file per alert
        #[arg(long, env = "ALERT_OUTBOX", default_value = "outbox")]
        outbox: PathBuf,
    },
}

fn load_session(inputs: &Inputs) -> anyhow::Result<AnalysisSession> {
    let attendance = ingest::read_csv(&inputs.attendance)?;
    let marks = ingest::read_csv(&inputs.marks)?;
    let fees = ingest::read_csv(&inputs.fees)?;
    let mut session = AnalysisSession::upload(attendance, marks, fees)?;
    session.analyze().context("failed to merge uploaded records")?;
    Ok(session)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            inputs,
            json,
            limit,
        } => {
            let session = load_session(&inputs)?;
            let analysis = session.latest()?;

            if json {
                let document = json!({
                    "session_id": session.id(),
                    "analyzed_at": session.analyzed_at(),
                    "records": analysis.records,
                    "counts": analysis.counts,
                });
                println!("{}", serde_json::to_string_pretty(&document)?);
                return Ok(());
            }

            if analysis.records.is_empty() {
                println!("No students found in the uploaded records.");
                return Ok(());
            }

            println!("Students by risk:");
            let mut ranked: Vec<_> = analysis.records.iter().collect();
            ranked.sort_by_key(|scored| scored.assessment.risk_label);
            for scored in ranked.iter().take(limit) {
                println!(
                    "- {} (ID {}) {} risk, score {}",
                    text(&scored.record, NAME).unwrap_or_else(|| "Student".to_string()),
                    scored
                        .assessment
                        .student_id
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "n/a".to_string()),
                    scored.assessment.risk_label,
                    scored.assessment.risk_score
                );
            }
            for label in RiskLabel::ALL {
                println!("{label}: {}", analysis.counts.get(label));
            }
        }
        Commands::Report { inputs, out } => {
            let session = load_session(&inputs)?;
            let analysis = session.latest()?;
            let analyzed_at = session.analyzed_at().unwrap_or_else(|| session.created_at());
            let report = report::build_report(session.id(), analyzed_at, analysis);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Alerts {
            inputs,
            enable_alerts,
            sender,
            outbox,
        } => {
            let session = load_session(&inputs)?;
            let analysis = session.latest()?;
            let high = risk::select_high_risk(&analysis.records);

            let mut transport: Box<dyn AlertTransport> = if enable_alerts {
                Box::new(OutboxTransport::new(outbox)?)
            } else {
                Box::new(DryRunTransport)
            };
            let summary = alerts::dispatch_alerts(&high, &sender, transport.as_mut());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
