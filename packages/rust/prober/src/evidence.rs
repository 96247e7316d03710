//! Evidence extraction from profile pages.
//!
//! Pulls contact details and cross-links to other known platforms out of a
//! page that a probe classified as `Found`. Link-aggregator pages (Linktree,
//! AllMyLinks) are the main source of cross-links.

use std::sync::LazyLock;

use dossier_registry::Registry;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::outcome::{Evidence, ProfileLink};

/// Upper bound on each extracted set, so a noisy page cannot flood the report.
const MAX_ITEMS: usize = 20;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("static email regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("static phone regex"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// File extensions that the email regex picks up from asset names
/// (`logo@2x.png`).
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"];

/// Build evidence for a found profile.
///
/// `platform_id` is the platform that was probed; links back to it are not
/// cross-links and are dropped.
pub fn extract(
    body: Option<&str>,
    page_url: &Url,
    profile_url: String,
    registry: &Registry,
    platform_id: &str,
) -> Evidence {
    let mut evidence = Evidence::with_profile(profile_url);
    let Some(body) = body else {
        return evidence;
    };

    evidence.emails = extract_emails(body).into_iter().take(MAX_ITEMS).collect();
    evidence.phones = extract_phones(body).into_iter().take(MAX_ITEMS).collect();
    evidence.links = extract_links(body, page_url)
        .into_iter()
        .filter_map(|link| {
            let platform = registry.identify(&link)?;
            if platform.id == platform_id {
                return None;
            }
            let identifier = platform.identifier_in(&link)?;
            Some(ProfileLink {
                platform: platform.id.clone(),
                identifier,
                url: link,
            })
        })
        .take(MAX_ITEMS)
        .collect();

    evidence
}

/// Recent events inspected in an activity feed.
const MAX_EVENTS: usize = 10;

/// Commit author emails from a GitHub-style public events feed.
///
/// Only `PushEvent`s among the most recent events are read. Hosted no-reply
/// addresses are dropped since they reach nobody.
pub fn commit_emails(feed: &str) -> Vec<String> {
    let Ok(serde_json::Value::Array(events)) = serde_json::from_str(feed) else {
        return Vec::new();
    };
    let mut emails: Vec<String> = Vec::new();
    for event in events.iter().take(MAX_EVENTS) {
        if event.get("type").and_then(|t| t.as_str()) != Some("PushEvent") {
            continue;
        }
        let commits = event
            .pointer("/payload/commits")
            .and_then(|c| c.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();
        for commit in commits {
            let Some(email) = commit.pointer("/author/email").and_then(|e| e.as_str()) else {
                continue;
            };
            let email = email.trim().to_ascii_lowercase();
            if email.contains('@') && !email.contains("noreply") && !emails.contains(&email) {
                emails.push(email);
            }
        }
    }
    emails.truncate(MAX_ITEMS);
    emails
}

fn extract_emails(body: &str) -> Vec<String> {
    EMAIL_RE
        .find_iter(body)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|e| !ASSET_SUFFIXES.iter().any(|s| e.ends_with(s)))
        .collect()
}

/// Phone numbers normalized to digits only.
fn extract_phones(body: &str) -> Vec<String> {
    PHONE_RE
        .find_iter(body)
        .map(|m| m.as_str().chars().filter(char::is_ascii_digit).collect())
        .collect()
}

/// Absolute http(s) links on the page.
fn extract_links(body: &str, base_url: &Url) -> Vec<String> {
    let doc = Html::parse_document(body);
    doc.select(&LINK_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| !href.starts_with('#') && !href.starts_with("javascript:"))
        .filter_map(|href| base_url.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .collect()
}
