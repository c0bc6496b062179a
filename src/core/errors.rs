// src/core/errors.rs
//! Failure taxonomy for an agent run.
//!
//! Components propagate `anyhow::Error` internally; these variants mark where
//! the orchestrator decides between aborting the run and skipping one item.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or invalid credentials/settings. Fatal before any browser work.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("browser driver unavailable: {0}")]
    DriverUnavailable(String),

    /// Automation setup failed. Retried a bounded number of times, then fatal.
    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("navigation timed out after {waited_ms}ms waiting for {what}")]
    NavigationTimeout { what: String, waited_ms: u64 },

    #[error("link extraction failed: {0}")]
    Extraction(String),

    #[error("failed to scrape {url}: {reason}")]
    Scrape { url: String, reason: String },

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("failed to persist {url}: {reason}")]
    Persistence { url: String, reason: String },
}

impl AgentError {
    /// Errors that only cost the current item, never the whole run.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            AgentError::NavigationTimeout { .. }
                | AgentError::Extraction(_)
                | AgentError::Scrape { .. }
                | AgentError::Analysis(_)
                | AgentError::Persistence { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_item_classification() {
        assert!(AgentError::Analysis("bad json".into()).is_per_item());
        assert!(AgentError::Scrape {
            url: "https://www.linkedin.com/in/a".into(),
            reason: "timeout".into()
        }
        .is_per_item());
        assert!(!AgentError::Config("LINKEDIN_USERNAME".into()).is_per_item());
        assert!(!AgentError::Driver("launch failed".into()).is_per_item());
    }

    #[test]
    fn test_timeout_message() {
        let err = AgentError::NavigationTimeout {
            what: "search results".into(),
            waited_ms: 15000,
        };
        assert_eq!(
            err.to_string(),
            "navigation timed out after 15000ms waiting for search results"
        );
    }
}
