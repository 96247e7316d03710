//! Personal-website discovery.
//!
//! Checks guessed domains for a live site. A 2xx answer after redirects
//! counts; anything else, DNS failures included, does not. Results never
//! touch coverage or confidence.

use std::sync::Arc;
use std::time::Duration;

use dossier_registry::{HttpMethod, PLACEHOLDER};
use dossier_shared::{ProbeConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::fetch::{build_client, fetch, is_ssrf_target};

/// A domain that answered with a live page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub domain: String,
    pub url: String,
}

/// Bounded-concurrency checker for guessed website domains.
#[derive(Debug, Clone)]
pub struct WebsiteSweep {
    client: Client,
    url_template: String,
    timeout: Duration,
    concurrency: usize,
    allow_private_targets: bool,
}

impl WebsiteSweep {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            url_template: config.website_template.clone(),
            timeout: config.per_task_timeout,
            concurrency: config.concurrency.max(1),
            allow_private_targets: false,
        })
    }

    /// Permit loopback and private-network targets (local mock servers).
    pub fn allow_private_targets(mut self) -> Self {
        self.allow_private_targets = true;
        self
    }

    /// Check every domain; live sites come back in input order.
    #[instrument(skip_all, fields(domains = domains.len()))]
    pub async fn sweep(&self, domains: &[String]) -> Vec<Website> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut checks = JoinSet::new();

        for (index, domain) in domains.iter().enumerate() {
            let Some(url) = self.url_for(domain) else {
                continue;
            };
            let client = self.client.clone();
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.timeout;
            let domain = domain.clone();

            checks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                match fetch(&client, HttpMethod::Get, &url, 0, timeout).await {
                    Ok(response) if (200..300).contains(&response.status) => Some((
                        index,
                        Website {
                            domain,
                            url: url.to_string(),
                        },
                    )),
                    Ok(response) => {
                        debug!(%url, status = response.status, "no website");
                        None
                    }
                    Err(_) => {
                        debug!(%url, "website unreachable");
                        None
                    }
                }
            });
        }

        let mut found = Vec::new();
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(Some(hit)) => found.push(hit),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "website check failed"),
            }
        }
        found.sort_by_key(|(index, _)| *index);
        info!(checked = domains.len(), found = found.len(), "website sweep finished");
        found.into_iter().map(|(_, site)| site).collect()
    }

    fn url_for(&self, domain: &str) -> Option<Url> {
        let url = Url::parse(&self.url_template.replace(PLACEHOLDER, domain)).ok()?;
        if !self.allow_private_targets && is_ssrf_target(&url) {
            warn!(%url, "SSRF protection: blocked");
            return None;
        }
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use dossier_shared::{AppConfig, Mode};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn sweep_for(template: String) -> WebsiteSweep {
        let mut config = AppConfig::default();
        config.probe.website_template = template;
        WebsiteSweep::new(&ProbeConfig::resolve(&config, Mode::Advanced)).unwrap()
    }

    fn domains() -> Vec<String> {
        ["johnsmith.com", "johnsmith.io", "jsmith.io", "jsmith.net"]
            .map(String::from)
            .to_vec()
    }

    #[tokio::test]
    async fn live_domains_in_input_order() {
        let server = MockServer::start().await;
        for live in ["/site/jsmith.io", "/site/johnsmith.com"] {
            Mock::given(method("GET"))
                .and(path(live))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/site/jsmith.net"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let sweep = sweep_for(format!("{}/site/{{}}", server.uri())).allow_private_targets();
        let sites = sweep.sweep(&domains()).await;

        let found: Vec<&str> = sites.iter().map(|s| s.domain.as_str()).collect();
        assert_eq!(found, vec!["johnsmith.com", "jsmith.io"]);
        assert_eq!(sites[1].url, format!("{}/site/jsmith.io", server.uri()));
    }

    #[tokio::test]
    async fn private_targets_are_not_contacted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let sweep = sweep_for(format!("{}/site/{{}}", server.uri()));
        assert!(sweep.sweep(&domains()).await.is_empty());
    }

    #[test]
    fn default_template_targets_plain_http() {
        let sweep = sweep_for(AppConfig::default().probe.website_template);
        let url = sweep.url_for("johnsmith.com").unwrap();
        assert_eq!(url.as_str(), "http://johnsmith.com/");
    }
}
