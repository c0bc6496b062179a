// src/browser/mod.rs
//! Browser automation seam.
//!
//! The orchestrator only sees these two traits; `chromium` drives a real
//! Chromium-family browser over CDP, tests drive scripted fakes.

use async_trait::async_trait;

use crate::core::config_manager::SiteCredentials;
use crate::core::errors::AgentError;
use crate::types::{MissionParameters, ScrapedProfile};

pub mod chromium;
pub mod links;
pub mod wait;

pub use chromium::ChromiumLauncher;

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// `DriverUnavailable` when no browser binary can be found,
    /// `Driver` when the binary exists but the session fails to start.
    async fn open(&self) -> Result<Box<dyn BrowserSession>, AgentError>;
}

/// One exclusively-owned browser session
#[async_trait]
pub trait BrowserSession: Send {
    /// False on rejected credentials or an unresolved security challenge
    async fn login(&mut self, credentials: &SiteCredentials) -> bool;

    /// Run the people search and wait (bounded) for results to render
    async fn search(&mut self, mission: &MissionParameters) -> Result<(), AgentError>;

    /// Deduplicated profile links on the current render. Empty is a valid result.
    async fn extract_links(&mut self) -> Vec<String>;

    /// Advance pagination from the last results page, even when
    /// `fetch_profile` has since navigated away. False once no further page
    /// can be reached.
    async fn next_page(&mut self) -> bool;

    /// Visible profile text, `None` on any scraping failure
    async fn fetch_profile(&mut self, url: &str) -> Option<ScrapedProfile>;

    /// Release the browser. Safe to call more than once.
    async fn close(&mut self);
}
