// src/browser/links.rs
//! Search URL construction and profile-link extraction from rendered HTML

use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use crate::types::MissionParameters;

const CANONICAL_HOST: &str = "www.linkedin.com";

/// People-search URL for the mission. The location rides along in the
/// keywords unless the search is worldwide.
pub fn people_search_url(base_url: &str, mission: &MissionParameters) -> anyhow::Result<Url> {
    let keywords = if mission.is_worldwide() {
        mission.search_query.trim().to_string()
    } else {
        format!("{} {}", mission.search_query.trim(), mission.location.trim())
    };

    let endpoint = format!(
        "{}/search/results/people/",
        base_url.trim_end_matches('/')
    );
    Ok(Url::parse_with_params(
        &endpoint,
        &[("keywords", keywords.as_str()), ("origin", "GLOBAL_SEARCH_HEADER")],
    )?)
}

/// Canonical `https://www.linkedin.com/in/<slug>` form of a profile href.
///
/// Slugs are case-insensitive on the site, so they are lowercased to give one
/// key per member. Relative hrefs resolve against `base`. Anything that is not a member
/// profile on a linkedin.com host yields `None`.
pub fn normalize_profile_url(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let host = url.host_str()?.to_ascii_lowercase();
    if host != "linkedin.com" && !host.ends_with(".linkedin.com") {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    if segments.next()? != "in" {
        return None;
    }
    let slug = segments.next()?;
    if slug.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        return None;
    }

    Some(format!(
        "https://{}/in/{}",
        CANONICAL_HOST,
        slug.to_ascii_lowercase()
    ))
}

/// Deduplicated profile links in first-seen order
pub fn extract_profile_links(html: &str, link_selector: &str, base: &Url) -> Vec<String> {
    let selector = match Selector::parse(link_selector) {
        Ok(selector) => selector,
        Err(e) => {
            warn!(
                "Invalid result-link selector '{}' ({:?}), scanning all anchors",
                link_selector, e
            );
            match Selector::parse("a[href]") {
                Ok(selector) => selector,
                Err(_) => return Vec::new(),
            }
        }
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        match normalize_profile_url(href, base) {
            Some(url) => {
                if seen.insert(url.clone()) {
                    links.push(url);
                }
            }
            None => debug!("Ignoring non-profile link: {}", href),
        }
    }

    links
}
