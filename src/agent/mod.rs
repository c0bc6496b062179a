// src/agent/mod.rs
//! Scrape → analyze → persist orchestration and the seams it runs against

use anyhow::Result;
use async_trait::async_trait;

use crate::core::Database;
use crate::types::{Analysis, FewShotExample, JobSchedule, MissionParameters, RunStatus};

pub mod runner;

pub use runner::{AgentRunner, RunOptions};

#[async_trait]
pub trait ProfileAnalyzer: Send + Sync {
    /// `None` on any failure; the caller skips the profile
    async fn analyze(
        &self,
        profile_text: &str,
        mission: &MissionParameters,
        examples: &[FewShotExample],
    ) -> Option<Analysis>;
}

/// Persistence the orchestrator needs
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn job_schedule(&self, job_name: &str) -> Result<Option<JobSchedule>>;
    async fn high_scoring_examples(&self, limit: u32) -> Result<Vec<FewShotExample>>;
    async fn profile_exists(&self, profile_url: &str) -> Result<bool>;
    async fn upsert_profile(
        &self,
        profile_url: &str,
        profile_text: &str,
        mission: &MissionParameters,
        analysis: &Analysis,
    ) -> Result<()>;
    async fn record_run(
        &self,
        job_name: &str,
        status: RunStatus,
        message: &str,
        next_run_timestamp_ms: i64,
    ) -> Result<bool>;
}

#[async_trait]
impl AgentStore for Database {
    async fn job_schedule(&self, job_name: &str) -> Result<Option<JobSchedule>> {
        self.jobs().find_by_name(job_name).await
    }

    async fn high_scoring_examples(&self, limit: u32) -> Result<Vec<FewShotExample>> {
        self.profiles().high_scoring_examples(limit).await
    }

    async fn profile_exists(&self, profile_url: &str) -> Result<bool> {
        self.profiles().exists(profile_url).await
    }

    async fn upsert_profile(
        &self,
        profile_url: &str,
        profile_text: &str,
        mission: &MissionParameters,
        analysis: &Analysis,
    ) -> Result<()> {
        self.profiles()
            .upsert(profile_url, profile_text, mission, analysis)
            .await
    }

    async fn record_run(
        &self,
        job_name: &str,
        status: RunStatus,
        message: &str,
        next_run_timestamp_ms: i64,
    ) -> Result<bool> {
        self.jobs()
            .record_run(job_name, status, message, next_run_timestamp_ms)
            .await
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_visited: u32,
    pub links_seen: u32,
    pub skipped_existing: u32,
    pub scrape_failures: u32,
    pub analysis_failures: u32,
    pub persistence_failures: u32,
    pub persisted: u32,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pages, {} links, {} persisted, {} already known, {} scrape / {} analysis / {} persistence failures",
            self.pages_visited,
            self.links_seen,
            self.persisted,
            self.skipped_existing,
            self.scrape_failures,
            self.analysis_failures,
            self.persistence_failures
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    JobNotFound,
    MissingMission,
    Inactive,
    NotDue { next_run_timestamp_ms: i64 },
    Completed(RunSummary),
    Aborted { reason: String, summary: RunSummary },
}

impl RunOutcome {
    /// True when the run was skipped before any browser work
    pub fn skipped(&self) -> bool {
        matches!(
            self,
            RunOutcome::JobNotFound
                | RunOutcome::MissingMission
                | RunOutcome::Inactive
                | RunOutcome::NotDue { .. }
        )
    }
}
