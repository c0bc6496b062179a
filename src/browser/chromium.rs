// src/browser/chromium.rs
//! LinkedIn session driven through `chromiumoxide` (Chrome DevTools Protocol)

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;

use super::links;
use super::wait::{poll_until, wait_until};
use super::{BrowserLauncher, BrowserSession};
use crate::core::config_manager::{AgentSettings, SiteCredentials};
use crate::core::errors::AgentError;
use crate::types::{MissionParameters, ScrapedProfile};
use crate::utils::clean_text;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

// ── Browser executable discovery ─────────────────────────────────────────────

/// Resolve the browser binary.
///
/// An explicitly configured path must exist; otherwise PATH and the usual
/// install locations are scanned.
pub fn find_chrome_executable(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return path.exists().then(|| path.to_path_buf());
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full);
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    let well_known: &[&str] = &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    ];
    #[cfg(target_os = "windows")]
    let well_known: &[&str] = &[
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let well_known: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/local/bin/chromium",
    ];

    well_known
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn build_browser_config(exe: &Path, settings: &AgentSettings) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .window_size(1920, 1080)
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-blink-features=AutomationControlled");

    // A visible window lets a human clear security challenges during login
    if !settings.headless {
        builder = builder.with_head().arg("--start-maximized");
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Launcher ─────────────────────────────────────────────────────────────────

pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    settings: AgentSettings,
}

impl ChromiumLauncher {
    pub fn new(executable: Option<PathBuf>, settings: AgentSettings) -> Self {
        Self {
            executable,
            settings,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, AgentError> {
        let exe = find_chrome_executable(self.executable.as_deref()).ok_or_else(|| {
            AgentError::DriverUnavailable(match &self.executable {
                Some(path) => format!("CHROME_EXECUTABLE points to a missing file: {}", path.display()),
                None => "no Chrome/Chromium binary found; set CHROME_EXECUTABLE".to_string(),
            })
        })?;

        let base = Url::parse(&self.settings.selectors.base_url).map_err(|e| {
            AgentError::Config(format!(
                "invalid site base_url '{}': {}",
                self.settings.selectors.base_url, e
            ))
        })?;

        info!("Launching browser session ({})", exe.display());

        let config = build_browser_config(&exe, &self.settings)
            .map_err(|e| AgentError::Driver(e.to_string()))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AgentError::Driver(format!("failed to launch {}: {}", exe.display(), e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await.ok();
                handler_task.abort();
                return Err(AgentError::Driver(format!("failed to open tab: {}", e)));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page,
            handler_task,
            settings: self.settings.clone(),
            base,
            results: ResultsCursor::default(),
        }))
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

/// Last search-results URL seen by the single tab. Profile visits navigate
/// the same tab away, so pagination has to come back here first.
#[derive(Debug, Default, Clone)]
struct ResultsCursor {
    url: Option<String>,
}

impl ResultsCursor {
    fn record(&mut self, url: Option<String>) {
        if url.is_some() {
            self.url = url;
        }
    }

    /// Where to navigate before paginating, `None` when already there
    fn return_target(&self, current: Option<&str>) -> Option<&str> {
        let results = self.url.as_deref()?;
        (current != Some(results)).then_some(results)
    }
}

pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    settings: AgentSettings,
    base: Url,
    results: ResultsCursor,
}

impl ChromiumSession {
    fn secs(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    /// First element matching `selector` within `timeout`
    async fn find(&self, selector: &str, timeout: Duration) -> Option<Element> {
        let page = &self.page;
        poll_until(timeout, self.settings.poll_interval(), || async move {
            page.find_element(selector).await.ok()
        })
        .await
    }

    async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn try_login(&self, credentials: &SiteCredentials) -> Result<bool> {
        let selectors = &self.settings.selectors;
        let login_timeout = Self::secs(self.settings.login_timeout_secs);
        let login_url = format!("{}/login", selectors.base_url.trim_end_matches('/'));

        info!("Attempting to log in to LinkedIn");
        self.page
            .goto(login_url.as_str())
            .await
            .context("Failed to open login page")?;

        let Some(username) = self.find(&selectors.username_input, login_timeout).await else {
            warn!("Login form did not render within {:?}", login_timeout);
            return Ok(false);
        };
        username.click().await?.type_str(&credentials.username).await?;

        self.page
            .find_element(selectors.password_input.as_str())
            .await
            .context("Password field not found")?
            .click()
            .await?
            .type_str(&credentials.password)
            .await?;

        self.page
            .find_element(selectors.submit_button.as_str())
            .await
            .context("Submit button not found")?
            .click()
            .await?;

        if self
            .find(&selectors.logged_in_marker, login_timeout)
            .await
            .is_some()
        {
            info!("Login successful");
            return Ok(true);
        }

        let on_challenge = self
            .current_url()
            .await
            .map(|url| url.contains(&selectors.challenge_url_fragment))
            .unwrap_or(false);

        if on_challenge {
            let grace = Self::secs(self.settings.challenge_grace_secs);
            warn!(
                "Security challenge detected. Solve it in the browser window within {:?}",
                grace
            );
            if self
                .find(&selectors.logged_in_marker, grace)
                .await
                .is_some()
            {
                info!("Security challenge resolved, login successful");
                return Ok(true);
            }
        }

        error!("Login failed: wrong credentials or unresolved security challenge");
        Ok(false)
    }

    /// Wait until the number of rendered result links stops changing
    async fn settle_results(&self) {
        let page = &self.page;
        let selector = self.settings.selectors.result_link.as_str();
        let last = AtomicUsize::new(usize::MAX);
        let last = &last;

        wait_until(
            Self::secs(self.settings.next_page_timeout_secs),
            self.settings.poll_interval(),
            || async move {
                let count = page
                    .find_elements(selector)
                    .await
                    .map(|found| found.len())
                    .unwrap_or(0);
                last.swap(count, Ordering::SeqCst) == count
            },
        )
        .await;
    }

    /// URL of the next results page, `None` once pagination is exhausted
    async fn try_next_page(&self) -> Result<Option<String>> {
        let selectors = &self.settings.selectors;
        let poll = self.settings.poll_interval();

        let current = self.current_url().await;
        if let Some(target) = self.results.return_target(current.as_deref()) {
            info!("Returning to search results: {}", target);
            self.page
                .goto(target)
                .await
                .context("Failed to return to search results")?;
            self.settle_results().await;
        }

        self.page.evaluate(SCROLL_TO_BOTTOM).await?;

        let page = &self.page;
        let next_selector = selectors.next_button.as_str();
        let button = poll_until(
            Self::secs(self.settings.next_page_timeout_secs),
            poll,
            || async move {
                let element = page.find_element(next_selector).await.ok()?;
                let disabled = element.attribute("disabled").await.ok()?.is_some();
                let aria_disabled = element
                    .attribute("aria-disabled")
                    .await
                    .ok()?
                    .map(|v| v == "true")
                    .unwrap_or(false);
                (!disabled && !aria_disabled).then_some(element)
            },
        )
        .await;

        let Some(button) = button else {
            info!("'Next' button not found. Reached the last page of results");
            return Ok(None);
        };

        let before = self.current_url().await;
        button.scroll_into_view().await?;
        button.click().await?;

        let before = &before;
        let advanced = wait_until(
            Self::secs(self.settings.search_timeout_secs),
            poll,
            || async move {
                let now = page.url().await.ok().flatten();
                now.is_some() && now != *before
            },
        )
        .await;

        if !advanced {
            warn!("Clicking 'Next' did not change the page, stopping pagination");
            return Ok(None);
        }
        Ok(self.current_url().await)
    }

    async fn try_fetch(&self, url: &str) -> Result<Option<String>> {
        self.page.goto(url).await.context("Navigation failed")?;

        let page = &self.page;
        let content_selector = self.settings.selectors.profile_content.as_str();
        let text = poll_until(
            Self::secs(self.settings.profile_timeout_secs),
            self.settings.poll_interval(),
            || async move {
                let element = page.find_element(content_selector).await.ok()?;
                let text = element.inner_text().await.ok().flatten()?;
                let cleaned = clean_text(&text);
                (!cleaned.is_empty()).then_some(cleaned)
            },
        )
        .await;

        if text.is_some() {
            return Ok(text);
        }

        // Fall back to the whole body when the main section never rendered
        let body: String = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await?
            .into_value()?;
        let cleaned = clean_text(&body);
        Ok((!cleaned.is_empty()).then_some(cleaned))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn login(&mut self, credentials: &SiteCredentials) -> bool {
        match self.try_login(credentials).await {
            Ok(logged_in) => logged_in,
            Err(e) => {
                error!("Unexpected error during login: {:#}", e);
                false
            }
        }
    }

    async fn search(&mut self, mission: &MissionParameters) -> Result<(), AgentError> {
        let timeout = Self::secs(self.settings.search_timeout_secs);
        let selectors = &self.settings.selectors;
        let url = links::people_search_url(&selectors.base_url, mission)
            .map_err(|e| AgentError::Config(format!("cannot build search URL: {}", e)))?;

        info!(
            "Searching for '{}' in '{}'",
            mission.search_query, mission.location
        );

        self.page.goto(url.as_str()).await.map_err(|e| {
            warn!("Search navigation failed: {}", e);
            AgentError::NavigationTimeout {
                what: "search page".to_string(),
                waited_ms: timeout.as_millis() as u64,
            }
        })?;

        let ready = format!("{}, {}", selectors.result_link, selectors.no_results_marker);
        if self.find(&ready, timeout).await.is_none() {
            return Err(AgentError::NavigationTimeout {
                what: "search results".to_string(),
                waited_ms: timeout.as_millis() as u64,
            });
        }

        let landed = self.current_url().await.or_else(|| Some(url.to_string()));
        self.results.record(landed);
        Ok(())
    }

    async fn extract_links(&mut self) -> Vec<String> {
        if let Err(e) = self.page.evaluate(SCROLL_TO_BOTTOM).await {
            warn!("Scroll before extraction failed: {}", e);
        }
        self.settle_results().await;

        let html = match self.page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!(
                    "{}",
                    AgentError::Extraction(format!("could not read page content: {}", e))
                );
                return Vec::new();
            }
        };

        let found =
            links::extract_profile_links(&html, &self.settings.selectors.result_link, &self.base);
        info!("Found {} profile URLs on the current page", found.len());
        found
    }

    async fn next_page(&mut self) -> bool {
        match self.try_next_page().await {
            Ok(Some(url)) => {
                self.results.record(Some(url));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Could not advance to the next page: {:#}", e);
                false
            }
        }
    }

    async fn fetch_profile(&mut self, url: &str) -> Option<ScrapedProfile> {
        info!("Scraping details from: {}", url);
        match self.try_fetch(url).await {
            Ok(Some(raw_text)) => Some(ScrapedProfile {
                url: url.to_string(),
                raw_text,
            }),
            Ok(None) => {
                warn!("No visible text on {}", url);
                None
            }
            Err(e) => {
                warn!(
                    "{}",
                    AgentError::Scrape {
                        url: url.to_string(),
                        reason: format!("{:#}", e),
                    }
                );
                None
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            info!("Closing browser session");
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
            browser.wait().await.ok();
        }
        self.handler_task.abort();
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Drop cannot await; hand the close to the runtime so no Chromium process is left behind
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                browser.close().await.ok();
            });
        }
    }
}
