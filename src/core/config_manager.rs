// src/core/config_manager.rs
//! Unified configuration management: environment secrets plus optional tuning file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::errors::AgentError;

pub const DEFAULT_DATABASE_PATH: &str = "data/linkedin_agent.db";
pub const DEFAULT_SETTINGS_PATH: &str = "agent.yaml";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub credentials: Option<SiteCredentials>,
    pub database_path: PathBuf,
    pub chrome_executable: Option<PathBuf>,
    pub llm: LlmConfig,
    pub settings: AgentSettings,
}

#[derive(Clone)]
pub struct SiteCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SiteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    /// Empty for key-less local endpoints
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

/// Tuning knobs read from `agent.yaml`. Every field has a default so the file
/// is optional and may be partial.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub headless: bool,
    pub driver_attempts: u32,
    pub driver_retry_delay_secs: u64,
    pub login_timeout_secs: u64,
    pub challenge_grace_secs: u64,
    pub search_timeout_secs: u64,
    pub profile_timeout_secs: u64,
    pub next_page_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub profile_pause_secs: u64,
    pub max_pages: u32,
    pub few_shot_limit: u32,
    pub run_interval_hours: u64,
    pub max_profile_chars: usize,
    pub selectors: SiteSelectors,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            headless: false,
            driver_attempts: 3,
            driver_retry_delay_secs: 5,
            login_timeout_secs: 20,
            challenge_grace_secs: 60,
            search_timeout_secs: 15,
            profile_timeout_secs: 15,
            next_page_timeout_secs: 5,
            poll_interval_ms: 250,
            profile_pause_secs: 2,
            max_pages: 100,
            few_shot_limit: 2,
            run_interval_hours: 24,
            max_profile_chars: 12_000,
            selectors: SiteSelectors::default(),
        }
    }
}

impl AgentSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn run_interval_ms(&self) -> i64 {
        (self.run_interval_hours as i64).saturating_mul(3_600_000)
    }
}

/// One consolidated selector set for the site under automation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    pub base_url: String,
    pub username_input: String,
    pub password_input: String,
    pub submit_button: String,
    pub logged_in_marker: String,
    pub challenge_url_fragment: String,
    pub result_link: String,
    pub no_results_marker: String,
    pub next_button: String,
    pub profile_content: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com".to_string(),
            username_input: "#username".to_string(),
            password_input: "#password".to_string(),
            submit_button: "button[type='submit']".to_string(),
            logged_in_marker: "#global-nav-typeahead".to_string(),
            challenge_url_fragment: "/checkpoint/".to_string(),
            result_link: "li a[href*='/in/']".to_string(),
            no_results_marker: ".search-reusable-search-no-results, .artdeco-empty-state"
                .to_string(),
            next_button: "button[aria-label*='Next'], button[aria-label*='Siguiente']"
                .to_string(),
            profile_content: "main".to_string(),
        }
    }
}

impl ConfigManager {
    /// Load `.env` (if any), then the process environment and the settings file
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (var("LINKEDIN_USERNAME"), var("LINKEDIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(SiteCredentials { username, password }),
            _ => None,
        };

        let settings_path = var("AGENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
        let settings = Self::load_settings(&settings_path)?;

        let llm = LlmConfig {
            base_url: var("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            api_key: var("LLM_API_KEY").unwrap_or_default(),
            model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout_seconds: 60,
        };

        Ok(Self {
            credentials,
            database_path: var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            chrome_executable: var("CHROME_EXECUTABLE").map(PathBuf::from),
            llm,
            settings,
        })
    }

    fn load_settings(path: &Path) -> Result<AgentSettings> {
        if !path.exists() {
            info!(
                "No settings file at {}, using defaults",
                path.display()
            );
            return Ok(AgentSettings::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let settings: AgentSettings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        info!("Loaded agent settings from {}", path.display());
        Ok(settings)
    }

    /// Credentials are only required once a run is about to touch the browser
    pub fn require_credentials(&self) -> Result<&SiteCredentials, AgentError> {
        self.credentials.as_ref().ok_or_else(|| {
            AgentError::Config(
                "LinkedIn credentials (LINKEDIN_USERNAME, LINKEDIN_PASSWORD) are not set"
                    .to_string(),
            )
        })
    }

    /// Ensure the database directory exists
    pub async fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                crate::utils::ensure_dir_exists(parent).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = ConfigManager::from_lookup(lookup_from(&[(
            "AGENT_CONFIG",
            "/nonexistent/agent.yaml",
        )]))
        .unwrap();

        assert!(config.credentials.is_none());
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.settings.driver_attempts, 3);
        assert_eq!(config.settings.few_shot_limit, 2);
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let config = ConfigManager::from_lookup(lookup_from(&[
            ("AGENT_CONFIG", "/nonexistent/agent.yaml"),
            ("LINKEDIN_USERNAME", "someone@example.com"),
            ("LINKEDIN_PASSWORD", "   "),
        ]))
        .unwrap();

        match config.require_credentials() {
            Err(AgentError::Config(msg)) => assert!(msg.contains("LINKEDIN_PASSWORD")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_credentials_and_overrides() {
        let config = ConfigManager::from_lookup(lookup_from(&[
            ("AGENT_CONFIG", "/nonexistent/agent.yaml"),
            ("LINKEDIN_USERNAME", "someone@example.com"),
            ("LINKEDIN_PASSWORD", "secret"),
            ("DATABASE_PATH", "/tmp/agent.db"),
            ("LLM_MODEL", "local-model"),
            ("CHROME_EXECUTABLE", "/usr/bin/chromium"),
        ]))
        .unwrap();

        let creds = config.require_credentials().unwrap();
        assert_eq!(creds.username, "someone@example.com");
        assert!(!format!("{:?}", creds).contains("secret"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/agent.db"));
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(
            config.chrome_executable,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn test_partial_settings_file() {
        let settings: AgentSettings = serde_yaml::from_str(
            "max_pages: 3\nselectors:\n  next_button: \"button.next\"\n",
        )
        .unwrap();
        assert_eq!(settings.max_pages, 3);
        assert_eq!(settings.selectors.next_button, "button.next");
        assert_eq!(settings.selectors.username_input, "#username");
        assert_eq!(settings.search_timeout_secs, 15);
        assert_eq!(settings.run_interval_ms(), 24 * 3_600_000);
    }
}
