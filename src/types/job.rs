// src/types/job.rs
//! Job schedule and mission criteria

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOCATION: &str = "Worldwide";

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

/// Search criteria for one run. Extra keys are kept so they reach the prompt
/// snapshot stored with each result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionParameters {
    pub search_query: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MissionParameters {
    pub fn new(search_query: &str, location: Option<&str>) -> Result<Self> {
        let params = Self {
            search_query: search_query.trim().to_string(),
            location: location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(default_location),
            extra: serde_json::Map::new(),
        };
        params.validate()?;
        Ok(params)
    }

    /// Decode the JSON column stored on a job schedule row
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let params: Self =
            serde_json::from_str(raw).context("Mission parameters are not valid JSON")?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search_query.trim().is_empty() {
            anyhow::bail!("Mission parameters must define a non-empty search_query");
        }
        Ok(())
    }

    pub fn is_worldwide(&self) -> bool {
        self.location.trim().is_empty() || self.location.eq_ignore_ascii_case(DEFAULT_LOCATION)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSchedule {
    pub job_name: String,
    pub is_active: bool,
    pub last_run_status: Option<String>,
    pub last_run_message: Option<String>,
    pub next_run_timestamp_ms: Option<i64>,
    /// `None` when the stored JSON is absent or fails validation
    pub mission_parameters: Option<MissionParameters>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobSchedule {
    /// A job without a next-run timestamp is always due.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_run_timestamp_ms
            .map(|next| now_ms >= next)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(next: Option<i64>) -> JobSchedule {
        JobSchedule {
            job_name: "job".to_string(),
            is_active: true,
            last_run_status: None,
            last_run_message: None,
            next_run_timestamp_ms: next,
            mission_parameters: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_mission_parameters_default_location() {
        let params = MissionParameters::from_json_str(r#"{"search_query":"Rust engineer"}"#)
            .unwrap();
        assert_eq!(params.location, "Worldwide");
        assert!(params.is_worldwide());
    }

    #[test]
    fn test_mission_parameters_keep_extra_criteria() {
        let params = MissionParameters::from_json_str(
            r#"{"search_query":"Recruiter","location":"Madrid","seniority":"senior"}"#,
        )
        .unwrap();
        assert_eq!(params.location, "Madrid");
        assert_eq!(params.extra["seniority"], "senior");
        let roundtrip = serde_json::to_value(&params).unwrap();
        assert_eq!(roundtrip["seniority"], "senior");
    }

    #[test]
    fn test_mission_parameters_reject_empty_query() {
        assert!(MissionParameters::from_json_str(r#"{"search_query":"  "}"#).is_err());
        assert!(MissionParameters::from_json_str(r#"{"location":"Madrid"}"#).is_err());
        assert!(MissionParameters::from_json_str("not json").is_err());
        assert!(MissionParameters::new("", None).is_err());
    }

    #[test]
    fn test_schedule_is_due() {
        assert!(schedule(None).is_due(1_000));
        assert!(schedule(Some(1_000)).is_due(1_000));
        assert!(!schedule(Some(2_000)).is_due(1_000));
    }
}
