// src/agent/runner.rs
//! Single-session run: login once, search once, then page by page
//! skip known links and fetch → analyze → persist the rest.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{AgentStore, ProfileAnalyzer, RunOutcome, RunSummary};
use crate::browser::{BrowserLauncher, BrowserSession};
use crate::core::config_manager::{AgentSettings, SiteCredentials};
use crate::core::errors::AgentError;
use crate::types::{FewShotExample, MissionParameters, RunStatus};
use crate::utils::now_ms;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Process links even when a record for them already exists
    pub reprocess: bool,
}

enum LinkOutcome {
    Skipped,
    Persisted,
}

pub struct AgentRunner<'a> {
    launcher: &'a dyn BrowserLauncher,
    analyzer: &'a dyn ProfileAnalyzer,
    store: &'a dyn AgentStore,
    credentials: SiteCredentials,
    settings: AgentSettings,
    options: RunOptions,
}

impl<'a> AgentRunner<'a> {
    pub fn new(
        launcher: &'a dyn BrowserLauncher,
        analyzer: &'a dyn ProfileAnalyzer,
        store: &'a dyn AgentStore,
        credentials: SiteCredentials,
        settings: AgentSettings,
    ) -> Self {
        Self {
            launcher,
            analyzer,
            store,
            credentials,
            settings,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(&self, job_name: &str) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("agent_run", job = job_name, run_id = %run_id);
        self.run_job(job_name).instrument(span).await
    }

    async fn run_job(&self, job_name: &str) -> Result<RunOutcome> {
        info!("Starting agent for job: {}", job_name);

        let Some(schedule) = self
            .store
            .job_schedule(job_name)
            .await
            .context("Failed to load job schedule")?
        else {
            warn!("Job '{}' does not exist", job_name);
            return Ok(RunOutcome::JobNotFound);
        };

        let Some(mission) = schedule.mission_parameters.clone() else {
            warn!("Could not load mission parameters for '{}'", job_name);
            return Ok(RunOutcome::MissingMission);
        };

        if !schedule.is_active {
            info!("Job '{}' is inactive", job_name);
            return Ok(RunOutcome::Inactive);
        }

        if !schedule.is_due(now_ms()) {
            let next_run_timestamp_ms = schedule.next_run_timestamp_ms.unwrap_or_default();
            info!(
                "Job '{}' is not scheduled to run until {}",
                job_name, next_run_timestamp_ms
            );
            return Ok(RunOutcome::NotDue {
                next_run_timestamp_ms,
            });
        }

        info!(
            "Loaded mission: '{}' in '{}'",
            mission.search_query, mission.location
        );

        let examples = match self
            .store
            .high_scoring_examples(self.settings.few_shot_limit)
            .await
        {
            Ok(examples) => {
                info!("Using {} few-shot examples", examples.len());
                examples
            }
            Err(e) => {
                warn!("Could not fetch few-shot examples, continuing without: {:#}", e);
                Vec::new()
            }
        };

        let mut summary = RunSummary::default();
        let outcome = match self.open_session().await {
            Ok(mut session) => {
                let result = self
                    .drive(session.as_mut(), &mission, &examples, &mut summary)
                    .await;
                session.close().await;

                match result {
                    Ok(()) => RunOutcome::Completed(summary),
                    Err(e) => {
                        error!("Run aborted: {:#}", e);
                        RunOutcome::Aborted {
                            reason: format!("{:#}", e),
                            summary,
                        }
                    }
                }
            }
            Err(e) => {
                error!("Browser setup failed: {}", e);
                RunOutcome::Aborted {
                    reason: e.to_string(),
                    summary,
                }
            }
        };

        self.record_outcome(job_name, &outcome).await;
        Ok(outcome)
    }

    /// Driver setup with a bounded number of attempts. A missing binary is not retried.
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, AgentError> {
        let attempts = self.settings.driver_attempts.max(1);
        let delay = Duration::from_secs(self.settings.driver_retry_delay_secs);
        let mut attempt = 1;

        loop {
            info!(
                "Setting up browser session (attempt {}/{})",
                attempt, attempts
            );
            match self.launcher.open().await {
                Ok(session) => return Ok(session),
                Err(AgentError::Driver(reason)) if attempt < attempts => {
                    warn!(
                        "Driver setup failed on attempt {}: {}. Retrying in {:?}",
                        attempt, reason, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        mission: &MissionParameters,
        examples: &[FewShotExample],
        summary: &mut RunSummary,
    ) -> Result<()> {
        if !session.login(&self.credentials).await {
            anyhow::bail!("Could not log in");
        }

        if let Err(e) = session.search(mission).await {
            if !e.is_per_item() {
                return Err(e.into());
            }
            warn!("{}; retrying search once", e);
            session
                .search(mission)
                .await
                .context("Failed to load initial search results")?;
        }

        let max_pages = self.settings.max_pages.max(1);
        loop {
            summary.pages_visited += 1;
            info!("Processing page {}", summary.pages_visited);

            let links = session.extract_links().await;
            if links.is_empty() {
                info!("No profile URLs found on this page");
            }

            for url in links {
                summary.links_seen += 1;
                self.process_link(session, &url, mission, examples, summary)
                    .await;
            }

            if summary.pages_visited >= max_pages {
                warn!("Reached the page limit ({}), stopping", max_pages);
                break;
            }
            if !session.next_page().await {
                break;
            }
        }

        info!("Finished: {}", summary);
        Ok(())
    }

    /// Any failure here costs only this link
    async fn process_link(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        mission: &MissionParameters,
        examples: &[FewShotExample],
        summary: &mut RunSummary,
    ) {
        match self.try_process_link(session, url, mission, examples).await {
            Ok(LinkOutcome::Skipped) => summary.skipped_existing += 1,
            Ok(LinkOutcome::Persisted) => summary.persisted += 1,
            Err(e) => {
                match e {
                    AgentError::Analysis(_) => summary.analysis_failures += 1,
                    AgentError::Persistence { .. } => summary.persistence_failures += 1,
                    _ => summary.scrape_failures += 1,
                }
                warn!("Skipping {}: {}", url, e);
            }
        }
    }

    async fn try_process_link(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        mission: &MissionParameters,
        examples: &[FewShotExample],
    ) -> Result<LinkOutcome, AgentError> {
        if !self.options.reprocess {
            let exists = self.store.profile_exists(url).await.map_err(|e| {
                AgentError::Persistence {
                    url: url.to_string(),
                    reason: format!("existence check failed: {:#}", e),
                }
            })?;
            if exists {
                info!("Skipping profile {} as it has already been processed", url);
                return Ok(LinkOutcome::Skipped);
            }
        }

        info!("Processing profile: {}", url);
        let profile = session
            .fetch_profile(url)
            .await
            .ok_or_else(|| AgentError::Scrape {
                url: url.to_string(),
                reason: "no profile text".to_string(),
            })?;

        let analysis = self
            .analyzer
            .analyze(&profile.raw_text, mission, examples)
            .await
            .ok_or_else(|| AgentError::Analysis(format!("no usable analysis for {}", url)))?;

        info!(
            score = analysis.alignment_score,
            recommendation = analysis.recommendation.as_str(),
            "Analysis complete for {}",
            url
        );

        self.store
            .upsert_profile(&profile.url, &profile.raw_text, mission, &analysis)
            .await
            .map_err(|e| AgentError::Persistence {
                url: url.to_string(),
                reason: format!("{:#}", e),
            })?;
        info!("Saved analysis for {}", url);

        if self.settings.profile_pause_secs > 0 {
            tokio::time::sleep(Duration::from_secs(self.settings.profile_pause_secs)).await;
        }

        Ok(LinkOutcome::Persisted)
    }

    async fn record_outcome(&self, job_name: &str, outcome: &RunOutcome) {
        let (status, message) = match outcome {
            RunOutcome::Completed(summary) => (RunStatus::Success, summary.to_string()),
            RunOutcome::Aborted { reason, .. } => (RunStatus::Failed, reason.clone()),
            _ => return,
        };

        let next_run = now_ms().saturating_add(self.settings.run_interval_ms());
        match self
            .store
            .record_run(job_name, status, &message, next_run)
            .await
        {
            Ok(true) => info!("Next run of '{}' scheduled at {}", job_name, next_run),
            Ok(false) => warn!("Job '{}' vanished before its run could be recorded", job_name),
            Err(e) => warn!("Failed to record run for '{}': {:#}", job_name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Database;
    use crate::types::{Analysis, JobSchedule, Recommendation, ScrapedProfile};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const JOB: &str = "linkedin_recruiter_search";

    fn profile_url(slug: &str) -> String {
        format!("https://www.linkedin.com/in/{}", slug)
    }

    // ── Browser fake ─────────────────────────────────────────────────────────

    #[derive(Default)]
    struct BrowserLog {
        opens: usize,
        closes: usize,
        fetched: Vec<String>,
        returns_to_results: usize,
    }

    struct FakeLauncher {
        pages: Vec<Vec<String>>,
        login_ok: bool,
        endless_pagination: bool,
        unavailable: bool,
        failing_opens: Mutex<usize>,
        log: Arc<Mutex<BrowserLog>>,
    }

    impl FakeLauncher {
        fn with_pages(pages: Vec<Vec<&str>>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|page| page.into_iter().map(profile_url).collect())
                    .collect(),
                login_ok: true,
                endless_pagination: false,
                unavailable: false,
                failing_opens: Mutex::new(0),
                log: Arc::new(Mutex::new(BrowserLog::default())),
            }
        }

        fn opens(&self) -> usize {
            self.log.lock().unwrap().opens
        }

        fn closes(&self) -> usize {
            self.log.lock().unwrap().closes
        }

        fn fetched(&self) -> Vec<String> {
            self.log.lock().unwrap().fetched.clone()
        }

        fn returns_to_results(&self) -> usize {
            self.log.lock().unwrap().returns_to_results
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn open(&self) -> Result<Box<dyn BrowserSession>, AgentError> {
            self.log.lock().unwrap().opens += 1;
            if self.unavailable {
                return Err(AgentError::DriverUnavailable("no browser".to_string()));
            }
            {
                let mut failing = self.failing_opens.lock().unwrap();
                if *failing > 0 {
                    *failing -= 1;
                    return Err(AgentError::Driver("launch failed".to_string()));
                }
            }
            Ok(Box::new(FakeSession {
                pages: self.pages.clone(),
                tab: TabLocation::Blank,
                results_page: None,
                login_ok: self.login_ok,
                endless_pagination: self.endless_pagination,
                log: self.log.clone(),
            }))
        }
    }

    /// Where the session's single tab points, like a real `Page`
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum TabLocation {
        Blank,
        Results(usize),
        Profile,
    }

    struct FakeSession {
        pages: Vec<Vec<String>>,
        tab: TabLocation,
        results_page: Option<usize>,
        login_ok: bool,
        endless_pagination: bool,
        log: Arc<Mutex<BrowserLog>>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn login(&mut self, _credentials: &SiteCredentials) -> bool {
            self.login_ok
        }

        async fn search(&mut self, _mission: &MissionParameters) -> Result<(), AgentError> {
            self.tab = TabLocation::Results(0);
            self.results_page = Some(0);
            Ok(())
        }

        async fn extract_links(&mut self) -> Vec<String> {
            match self.tab {
                TabLocation::Results(page) => self.pages.get(page).cloned().unwrap_or_default(),
                _ => Vec::new(),
            }
        }

        async fn next_page(&mut self) -> bool {
            let Some(page) = self.results_page else {
                return false;
            };
            // The "Next" control only exists on the results page
            if self.tab != TabLocation::Results(page) {
                self.tab = TabLocation::Results(page);
                self.log.lock().unwrap().returns_to_results += 1;
            }

            if self.endless_pagination {
                return true;
            }
            if page + 1 < self.pages.len() {
                self.tab = TabLocation::Results(page + 1);
                self.results_page = Some(page + 1);
                true
            } else {
                false
            }
        }

        async fn fetch_profile(&mut self, url: &str) -> Option<ScrapedProfile> {
            self.tab = TabLocation::Profile;
            self.log.lock().unwrap().fetched.push(url.to_string());
            if url.contains("broken") {
                return None;
            }
            Some(ScrapedProfile {
                url: url.to_string(),
                raw_text: format!("profile text of {}", url),
            })
        }

        async fn close(&mut self) {
            self.log.lock().unwrap().closes += 1;
        }
    }

    // ── Analyzer fake ────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeAnalyzer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfileAnalyzer for FakeAnalyzer {
        async fn analyze(
            &self,
            profile_text: &str,
            _mission: &MissionParameters,
            _examples: &[FewShotExample],
        ) -> Option<Analysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if profile_text.contains("bad-analysis") {
                return None;
            }
            Some(Analysis {
                summary: "Recruiter".to_string(),
                alignment_score: 8,
                justification: "Matches query".to_string(),
                recommendation: Recommendation::Recommend,
            })
        }
    }

    // ── Store wrapper counting writes ────────────────────────────────────────

    struct CountingStore {
        db: Database,
        upserts: AtomicUsize,
        failing_upsert: Option<String>,
    }

    impl CountingStore {
        async fn with_job(next_run_timestamp_ms: Option<i64>, is_active: bool) -> Self {
            let db = Database::in_memory().await.unwrap();
            db.jobs()
                .upsert(
                    JOB,
                    &mission(),
                    is_active,
                    next_run_timestamp_ms,
                )
                .await
                .unwrap();
            Self {
                db,
                upserts: AtomicUsize::new(0),
                failing_upsert: None,
            }
        }

        async fn seed(&self, slug: &str) {
            self.db
                .profiles()
                .upsert(&profile_url(slug), "old text", &mission(), &analysis(5))
                .await
                .unwrap();
        }

        fn upserts(&self) -> usize {
            self.upserts.load(Ordering::SeqCst)
        }

        async fn schedule(&self) -> JobSchedule {
            self.db.jobs().find_by_name(JOB).await.unwrap().unwrap()
        }
    }

    #[async_trait]
    impl AgentStore for CountingStore {
        async fn job_schedule(&self, job_name: &str) -> Result<Option<JobSchedule>> {
            self.db.job_schedule(job_name).await
        }

        async fn high_scoring_examples(&self, limit: u32) -> Result<Vec<FewShotExample>> {
            self.db.high_scoring_examples(limit).await
        }

        async fn profile_exists(&self, profile_url: &str) -> Result<bool> {
            self.db.profile_exists(profile_url).await
        }

        async fn upsert_profile(
            &self,
            profile_url: &str,
            profile_text: &str,
            mission: &MissionParameters,
            analysis: &Analysis,
        ) -> Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.failing_upsert.as_deref() == Some(profile_url) {
                anyhow::bail!("database is locked");
            }
            self.db
                .upsert_profile(profile_url, profile_text, mission, analysis)
                .await
        }

        async fn record_run(
            &self,
            job_name: &str,
            status: RunStatus,
            message: &str,
            next_run_timestamp_ms: i64,
        ) -> Result<bool> {
            self.db
                .record_run(job_name, status, message, next_run_timestamp_ms)
                .await
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn mission() -> MissionParameters {
        MissionParameters::new("Technical Recruiter", Some("Madrid")).unwrap()
    }

    fn analysis(score: u8) -> Analysis {
        Analysis {
            summary: "seeded".to_string(),
            alignment_score: score,
            justification: "seeded".to_string(),
            recommendation: Recommendation::DoNotRecommend,
        }
    }

    fn settings() -> AgentSettings {
        AgentSettings {
            profile_pause_secs: 0,
            driver_retry_delay_secs: 0,
            run_interval_hours: 0,
            ..AgentSettings::default()
        }
    }

    fn credentials() -> SiteCredentials {
        SiteCredentials {
            username: "agent@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    async fn run(
        launcher: &FakeLauncher,
        analyzer: &FakeAnalyzer,
        store: &CountingStore,
        settings: AgentSettings,
    ) -> RunOutcome {
        AgentRunner::new(launcher, analyzer, store, credentials(), settings)
            .run(JOB)
            .await
            .unwrap()
    }

    fn completed(outcome: RunOutcome) -> RunSummary {
        match outcome {
            RunOutcome::Completed(summary) => summary,
            other => panic!("expected completed run, got {:?}", other),
        }
    }

    // ── Scenarios ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_already_persisted_link_is_skipped() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice", "bob", "carol"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;
        store.seed("bob").await;

        let summary = completed(run(&launcher, &analyzer, &store, settings()).await);

        assert_eq!(summary.persisted, 2);
        assert_eq!(summary.skipped_existing, 1);
        assert_eq!(launcher.fetched(), vec![profile_url("alice"), profile_url("carol")]);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.upserts(), 2);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_analysis_failure_skips_persistence_and_continues() {
        let launcher =
            FakeLauncher::with_pages(vec![vec!["alice", "bad-analysis", "carol"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let summary = completed(run(&launcher, &analyzer, &store, settings()).await);

        assert_eq!(summary.analysis_failures, 1);
        assert_eq!(summary.persisted, 2);
        assert_eq!(store.upserts(), 2);
        assert!(!store
            .db
            .profiles()
            .exists(&profile_url("bad-analysis"))
            .await
            .unwrap());
        assert!(store.db.profiles().exists(&profile_url("carol")).await.unwrap());
    }

    #[tokio::test]
    async fn test_scrape_failure_skips_analysis() {
        let launcher = FakeLauncher::with_pages(vec![vec!["broken", "alice"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let summary = completed(run(&launcher, &analyzer, &store, settings()).await);

        assert_eq!(summary.scrape_failures, 1);
        assert_eq!(summary.persisted, 1);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_future_schedule_opens_no_browser() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        let analyzer = FakeAnalyzer::default();
        let future = now_ms() + 3_600_000;
        let store = CountingStore::with_job(Some(future), true).await;

        let outcome = run(&launcher, &analyzer, &store, settings()).await;

        assert_eq!(
            outcome,
            RunOutcome::NotDue {
                next_run_timestamp_ms: future
            }
        );
        assert!(outcome.skipped());
        assert_eq!(launcher.opens(), 0);
        assert!(store.schedule().await.last_run_status.is_none());
    }

    #[tokio::test]
    async fn test_missing_and_inactive_jobs_open_no_browser() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        let analyzer = FakeAnalyzer::default();

        let inactive = CountingStore::with_job(None, false).await;
        assert_eq!(
            run(&launcher, &analyzer, &inactive, settings()).await,
            RunOutcome::Inactive
        );

        let store = CountingStore::with_job(None, true).await;
        let outcome = AgentRunner::new(&launcher, &analyzer, &store, credentials(), settings())
            .run("unknown_job")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::JobNotFound);

        assert_eq!(launcher.opens(), 0);
    }

    #[tokio::test]
    async fn test_pagination_stops_when_no_next_page() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice"], vec!["bob"], vec![], vec!["carol"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let summary = completed(run(&launcher, &analyzer, &store, settings()).await);

        assert_eq!(summary.pages_visited, 4);
        assert_eq!(summary.persisted, 3);
    }

    #[tokio::test]
    async fn test_pagination_continues_after_profile_visits() {
        let launcher =
            FakeLauncher::with_pages(vec![vec!["alice", "bob"], vec!["carol"], vec!["dave"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let summary = completed(run(&launcher, &analyzer, &store, settings()).await);

        assert_eq!(summary.pages_visited, 3);
        assert_eq!(summary.persisted, 4);
        assert_eq!(launcher.fetched().len(), 4);
        assert_eq!(launcher.returns_to_results(), 3);
    }

    #[tokio::test]
    async fn test_persistence_failure_skips_link_and_continues() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice", "bob", "carol"]]);
        let analyzer = FakeAnalyzer::default();
        let mut store = CountingStore::with_job(None, true).await;
        store.failing_upsert = Some(profile_url("bob"));

        let summary = completed(run(&launcher, &analyzer, &store, settings()).await);

        assert_eq!(summary.persistence_failures, 1);
        assert_eq!(summary.persisted, 2);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 3);
        assert!(!store.db.profiles().exists(&profile_url("bob")).await.unwrap());
        assert!(store.db.profiles().exists(&profile_url("carol")).await.unwrap());
    }

    #[tokio::test]
    async fn test_page_limit_bounds_endless_pagination() {
        let mut launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        launcher.endless_pagination = true;
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let settings = AgentSettings {
            max_pages: 5,
            ..settings()
        };
        let summary = completed(run(&launcher, &analyzer, &store, settings).await);

        assert_eq!(summary.pages_visited, 5);
        assert_eq!(summary.persisted, 1);
        assert_eq!(summary.skipped_existing, 4);
    }

    #[tokio::test]
    async fn test_login_failure_aborts_and_closes_session() {
        let mut launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        launcher.login_ok = false;
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let outcome = run(&launcher, &analyzer, &store, settings()).await;

        assert!(matches!(outcome, RunOutcome::Aborted { ref reason, .. } if reason.contains("log in")));
        assert_eq!(launcher.closes(), 1);
        assert!(launcher.fetched().is_empty());
        let schedule = store.schedule().await;
        assert_eq!(schedule.last_run_status.as_deref(), Some("failed"));
    }

    #[tokio::test]
    async fn test_driver_setup_is_retried_a_bounded_number_of_times() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        *launcher.failing_opens.lock().unwrap() = 2;
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let summary = completed(run(&launcher, &analyzer, &store, settings()).await);
        assert_eq!(summary.persisted, 1);
        assert_eq!(launcher.opens(), 3);

        let launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        *launcher.failing_opens.lock().unwrap() = 10;
        let store = CountingStore::with_job(None, true).await;
        let outcome = run(&launcher, &analyzer, &store, settings()).await;
        assert!(matches!(outcome, RunOutcome::Aborted { .. }));
        assert_eq!(launcher.opens(), 3);
        assert_eq!(launcher.closes(), 0);
    }

    #[tokio::test]
    async fn test_missing_driver_is_not_retried() {
        let mut launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        launcher.unavailable = true;
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let outcome = run(&launcher, &analyzer, &store, settings()).await;
        assert!(matches!(outcome, RunOutcome::Aborted { .. }));
        assert_eq!(launcher.opens(), 1);
    }

    #[tokio::test]
    async fn test_second_pass_does_not_refetch() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice", "bob"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        completed(run(&launcher, &analyzer, &store, settings()).await);
        let second = completed(run(&launcher, &analyzer, &store, settings()).await);

        assert_eq!(second.skipped_existing, 2);
        assert_eq!(second.persisted, 0);
        assert_eq!(launcher.fetched().len(), 2);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.upserts(), 2);
    }

    #[tokio::test]
    async fn test_reprocess_overwrites_existing_record() {
        let launcher = FakeLauncher::with_pages(vec![vec!["bob"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;
        store.seed("bob").await;

        let summary = completed(
            AgentRunner::new(&launcher, &analyzer, &store, credentials(), settings())
                .with_options(RunOptions { reprocess: true })
                .run(JOB)
                .await
                .unwrap(),
        );

        assert_eq!(summary.persisted, 1);
        assert_eq!(store.db.profiles().count().await.unwrap(), 1);
        let record = store
            .db
            .profiles()
            .find_by_url(&profile_url("bob"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.alignment_score, 8);
    }

    #[tokio::test]
    async fn test_completed_run_updates_schedule() {
        let launcher = FakeLauncher::with_pages(vec![vec!["alice"]]);
        let analyzer = FakeAnalyzer::default();
        let store = CountingStore::with_job(None, true).await;

        let before = now_ms();
        let settings = AgentSettings {
            run_interval_hours: 24,
            ..settings()
        };
        completed(run(&launcher, &analyzer, &store, settings).await);

        let schedule = store.schedule().await;
        assert_eq!(schedule.last_run_status.as_deref(), Some("success"));
        assert!(schedule
            .last_run_message
            .unwrap_or_default()
            .contains("1 persisted"));
        assert!(schedule.next_run_timestamp_ms.unwrap() >= before + 24 * 3_600_000);
    }
}
