// src/cli.rs
use crate::agent::{AgentRunner, RunOptions, RunOutcome};
use crate::browser::ChromiumLauncher;
use crate::core::{ConfigManager, Database};
use crate::linkedin_analysis::{LlmClient, LlmProfileAnalyzer};
use crate::types::{MissionParameters, PersistedRecord};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_JOB_NAME: &str = "linkedin_recruiter_search";

#[derive(Parser)]
#[command(name = "linkedin-agent")]
#[command(about = "Search LinkedIn, score profiles against a mission with an LLM, keep the results")]
pub struct AgentCli {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Run a job once, if it is active and due
    Run {
        #[arg(default_value = DEFAULT_JOB_NAME)]
        job_name: String,
        /// Analyze profiles again even when already stored
        #[arg(long)]
        reprocess: bool,
    },
    /// Initialize the database
    Init,
    /// Create or update a job and its mission parameters
    AddJob {
        job_name: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Show a job schedule
    ShowJob { job_name: String },
    /// List the best-scored profiles
    Results {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Write the listed profiles to a CSV file instead of the terminal
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

/// One exported CSV line
#[derive(Serialize)]
struct ResultRow<'a> {
    profile_url: &'a str,
    alignment_score: i64,
    recommendation: &'static str,
    summary: &'a str,
    justification: &'a str,
    search_query: &'a str,
    location: &'a str,
    analyzed_at: String,
}

impl<'a> From<&'a PersistedRecord> for ResultRow<'a> {
    fn from(record: &'a PersistedRecord) -> Self {
        Self {
            profile_url: &record.profile_url,
            alignment_score: record.alignment_score,
            recommendation: record.analysis.recommendation.as_str(),
            summary: &record.analysis.summary,
            justification: &record.analysis.justification,
            search_query: &record.mission_parameters.search_query,
            location: &record.mission_parameters.location,
            analyzed_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Write records as CSV with a header row, handing the writer back
pub fn write_results_csv<W: std::io::Write>(records: &[PersistedRecord], writer: W) -> Result<W> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer
            .serialize(ResultRow::from(record))
            .with_context(|| format!("Failed to write CSV row for {}", record.profile_url))?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    csv_writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to finish CSV output: {}", e.error()))
}

pub async fn handle_command(cli: AgentCli, config: ConfigManager) -> Result<()> {
    match cli.command {
        AgentCommand::Run {
            job_name,
            reprocess,
        } => run_job(&config, &job_name, reprocess).await?,

        AgentCommand::Init => {
            let db = Database::new(&config.database_path).await?;
            db.health_check().await?;
            println!(
                "✅ Database initialized at: {}",
                config.database_path.display()
            );
            println!("   Tables: job_schedules, validated_profiles");
            println!();
            println!("Next steps:");
            println!("  linkedin-agent add-job {} --query \"Technical Recruiter\" --location Madrid", DEFAULT_JOB_NAME);
            println!("  linkedin-agent run {}", DEFAULT_JOB_NAME);
        }

        AgentCommand::AddJob {
            job_name,
            query,
            location,
            inactive,
        } => {
            let mission = MissionParameters::new(&query, location.as_deref())?;
            let db = Database::new(&config.database_path).await?;
            db.jobs()
                .upsert(&job_name, &mission, !inactive, None)
                .await
                .with_context(|| format!("Failed to save job '{}'", job_name))?;

            println!("✅ Job saved: {}", job_name);
            println!("   Query: {}", mission.search_query);
            println!("   Location: {}", mission.location);
            println!("   Active: {}", if inactive { "no" } else { "yes" });
        }

        AgentCommand::ShowJob { job_name } => {
            let db = Database::new(&config.database_path).await?;
            match db.jobs().find_by_name(&job_name).await? {
                Some(job) => {
                    println!("Job: {}", job.job_name);
                    println!("   Active: {}", job.is_active);
                    println!(
                        "   Last run: {} {}",
                        job.last_run_status.as_deref().unwrap_or("never"),
                        job.last_run_message.as_deref().unwrap_or("")
                    );
                    match job.next_run_timestamp_ms {
                        Some(ms) => println!("   Next run: {} ms since epoch", ms),
                        None => println!("   Next run: due now"),
                    }
                    match &job.mission_parameters {
                        Some(mission) => println!(
                            "   Mission: {}",
                            serde_json::to_string_pretty(mission)?
                        ),
                        None => println!("   Mission: missing or invalid"),
                    }
                    println!(
                        "   Updated: {}",
                        job.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                None => eprintln!("❌ Job not found: {}", job_name),
            }
        }

        AgentCommand::Results { limit, csv } => {
            let db = Database::new(&config.database_path).await?;
            let records = db.profiles().top_results(limit).await?;

            if records.is_empty() {
                println!("No analyzed profiles yet.");
                return Ok(());
            }

            if let Some(path) = csv {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_results_csv(&records, file)?;
                println!("✅ Exported {} profiles to {}", records.len(), path.display());
                return Ok(());
            }

            println!(
                "{:<6} {:<18} {:<55} {:<16}",
                "Score", "Recommendation", "Profile", "Analyzed"
            );
            println!("{}", "-".repeat(97));
            for record in records {
                println!(
                    "{:<6} {:<18} {:<55} {:<16}",
                    record.alignment_score,
                    record.analysis.recommendation.as_str(),
                    record.profile_url,
                    record.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}

async fn run_job(config: &ConfigManager, job_name: &str, reprocess: bool) -> Result<()> {
    let credentials = config.require_credentials()?.clone();
    let db = Database::new(&config.database_path).await?;

    let client = LlmClient::new(&config.llm)?;
    let analyzer = LlmProfileAnalyzer::new(client, config.settings.max_profile_chars);
    let launcher =
        ChromiumLauncher::new(config.chrome_executable.clone(), config.settings.clone());

    info!("Using model {} at {}", config.llm.model, config.llm.base_url);

    let outcome = AgentRunner::new(
        &launcher,
        &analyzer,
        &db,
        credentials,
        config.settings.clone(),
    )
    .with_options(RunOptions { reprocess })
    .run(job_name)
    .await?;

    match outcome {
        RunOutcome::JobNotFound => eprintln!("❌ Job '{}' does not exist", job_name),
        RunOutcome::MissingMission => {
            eprintln!("❌ Job '{}' has no valid mission parameters", job_name)
        }
        RunOutcome::Inactive => println!("Job '{}' is inactive, nothing to do", job_name),
        RunOutcome::NotDue {
            next_run_timestamp_ms,
        } => println!(
            "Job '{}' is not due until {} ms since epoch",
            job_name, next_run_timestamp_ms
        ),
        RunOutcome::Completed(summary) => println!("✅ Run complete: {}", summary),
        RunOutcome::Aborted { reason, summary } => {
            eprintln!("❌ Run aborted: {}", reason);
            eprintln!("   Progress before abort: {}", summary);
        }
    }

    Ok(())
}
