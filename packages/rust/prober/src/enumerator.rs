//! External username enumeration.
//!
//! Wraps a Sherlock-compatible command-line tool. The tool runs once per
//! username under a timeout; its `[+] Site: https://...` lines become
//! [`OutcomeSource::Enumerator`] outcomes. A missing or failing tool degrades
//! the run to registry probes only.

use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dossier_registry::{ExistencePredicate, HttpMethod, PlatformSpec, Registry, Tier};
use dossier_shared::{Candidate, CandidateKind, DossierError, EnumeratorConfig, Result};
use regex::Regex;
use tokio::process::Command as TokioCommand;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, instrument, warn};

use crate::outcome::{Evidence, OutcomeSource, ProbeOutcome, ProbeStatus, ProbeTask, TaskId};

/// Rate class recorded on platforms known only to the enumerator.
const UNLISTED_RATE_CLASS: &str = "enumerator";

static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<mark>[+\-*!])\]\s*(?P<site>[^:]+?):\s*(?P<url>https?://\S+)")
        .expect("static enumerator regex")
});

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("static ansi regex"));

/// One line of enumerator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratedAccount {
    pub site: String,
    pub url: String,
    pub found: bool,
}

/// Result of enumerating a batch of usernames.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub outcomes: Vec<ProbeOutcome>,
    /// Set when the tool could not be used; goes into the report notes.
    pub note: Option<String>,
}

/// Subprocess-backed username enumerator.
#[derive(Debug)]
pub struct ExternalEnumerator {
    command: String,
    timeout: Duration,
    max_usernames: usize,
    warned: AtomicBool,
}

impl ExternalEnumerator {
    pub fn new(config: &EnumeratorConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_usernames: config.max_usernames,
            warned: AtomicBool::new(false),
        }
    }

    pub fn max_usernames(&self) -> usize {
        self.max_usernames
    }

    /// Run the tool for one username.
    pub async fn enumerate(&self, username: &str) -> Result<Vec<EnumeratedAccount>> {
        let output = timeout(
            self.timeout,
            TokioCommand::new(&self.command)
                .arg(username)
                .args(["--timeout", "10", "--print-found", "--no-color"])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            DossierError::unavailable(
                &self.command,
                format!("timed out after {}s", self.timeout.as_secs()),
            )
        })?
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DossierError::unavailable(&self.command, "not installed"),
            _ => DossierError::unavailable(&self.command, e.to_string()),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() && stdout.trim().is_empty() {
            return Err(DossierError::unavailable(
                &self.command,
                format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(parse_output(&stdout))
    }

    /// Enumerate the first `max_usernames` candidates and map hits onto
    /// registry platforms (or unlisted platforms when the registry has no
    /// match). Task ids are allocated from `first_id` upward.
    ///
    /// Stops at the first tool failure; the failure is logged once per
    /// enumerator and returned as a note.
    #[instrument(skip_all, fields(command = %self.command, usernames = usernames.len().min(self.max_usernames)))]
    pub async fn run(&self, usernames: &[Arc<Candidate>], registry: &Registry, first_id: TaskId) -> Enumeration {
        let mut result = Enumeration::default();
        let mut next_id = first_id;

        for candidate in usernames.iter().take(self.max_usernames) {
            let started = Instant::now();
            let accounts = match self.enumerate(candidate.value()).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    if !self.warned.swap(true, Ordering::SeqCst) {
                        warn!(error = %e, "username enumeration unavailable, continuing with registry probes only");
                    }
                    result.note = Some(format!("username enumeration skipped: {e}"));
                    break;
                }
            };
            let latency_ms = started.elapsed().as_millis() as u64;
            debug!(username = candidate.value(), hits = accounts.len(), "enumerated");

            for account in accounts.into_iter().filter(|a| a.found) {
                let platform = registry
                    .identify(&account.url)
                    .or_else(|| registry.find_by_name(&account.site))
                    .cloned()
                    .unwrap_or_else(|| Arc::new(unlisted_platform(&account)));
                result.outcomes.push(ProbeOutcome {
                    task: ProbeTask::new(next_id, Arc::clone(candidate), platform),
                    status: ProbeStatus::Found,
                    latency_ms,
                    evidence: Some(Evidence::with_profile(account.url)),
                    source: OutcomeSource::Enumerator,
                });
                next_id += 1;
            }
        }

        info!(found = result.outcomes.len(), "enumeration finished");
        result
    }
}

/// Parse Sherlock-style output lines.
pub fn parse_output(stdout: &str) -> Vec<EnumeratedAccount> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = ANSI_ESCAPE.replace_all(line.trim(), "");
            let caps = RESULT_LINE.captures(&line)?;
            Some(EnumeratedAccount {
                site: caps["site"].trim().to_string(),
                url: caps["url"].to_string(),
                found: &caps["mark"] == "+",
            })
        })
        .collect()
}

/// A platform reported by the enumerator that the registry does not list.
fn unlisted_platform(account: &EnumeratedAccount) -> PlatformSpec {
    let id: String = account
        .site
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    PlatformSpec {
        id,
        name: account.site.clone(),
        url_template: account.url.clone(),
        profile_template: None,
        method: HttpMethod::Get,
        accepts: vec![CandidateKind::Username],
        predicate: ExistencePredicate::Status {
            found: vec![200],
            not_found: vec![404],
        },
        rate_class: UNLISTED_RATE_CLASS.into(),
        timeout_ms: 0,
        tier: Tier::LongTail,
        basic: false,
        aliases: Vec::new(),
        activity_template: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[*] Checking username jsmith on:

[+] GitHub: https://github.com/jsmith
\x1b[1;92m[+]\x1b[0m Obscure Forum: https://forum.example/u/jsmith
[-] Instagram: Not Found!
[*] Search completed with 2 results
";

    #[test]
    fn parses_found_lines() {
        let accounts = parse_output(SAMPLE);
        assert_eq!(
            accounts,
            vec![
                EnumeratedAccount {
                    site: "GitHub".into(),
                    url: "https://github.com/jsmith".into(),
                    found: true,
                },
                EnumeratedAccount {
                    site: "Obscure Forum".into(),
                    url: "https://forum.example/u/jsmith".into(),
                    found: true,
                },
            ]
        );
    }

    #[test]
    fn unlisted_platform_ids_are_slugs() {
        let spec = unlisted_platform(&EnumeratedAccount {
            site: "Obscure Forum".into(),
            url: "https://forum.example/u/jsmith".into(),
            found: true,
        });
        assert_eq!(spec.id, "obscure_forum");
        assert_eq!(spec.profile_url("jsmith"), "https://forum.example/u/jsmith");
    }

    fn config(command: &str) -> EnumeratorConfig {
        EnumeratorConfig {
            enabled: true,
            command: command.into(),
            timeout_secs: 5,
            max_usernames: 2,
        }
    }

    #[tokio::test]
    async fn missing_tool_degrades_with_note() {
        let enumerator = ExternalEnumerator::new(&config("dossier-test-no-such-enumerator"));
        let err = enumerator.enumerate("jsmith").await.unwrap_err();
        assert!(matches!(err, DossierError::CollaboratorUnavailable { .. }));

        let usernames = vec![Arc::new(Candidate::new(CandidateKind::Username, "jsmith", "concat"))];
        let registry = Registry::builtin().unwrap();
        let result = enumerator.run(&usernames, &registry, 0).await;
        assert!(result.outcomes.is_empty());
        assert!(result.note.unwrap().contains("not installed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn maps_hits_onto_registry_platforms() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("dossier-enum-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("fake-sherlock");
        std::fs::write(
            &script,
            "#!/bin/sh\necho \"[+] GitHub: https://github.com/$1\"\necho \"[+] Obscure Forum: https://forum.example/u/$1\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let enumerator = ExternalEnumerator::new(&config(script.to_str().unwrap()));
        let usernames = vec![
            Arc::new(Candidate::new(CandidateKind::Username, "jsmith", "initial_last")),
            Arc::new(Candidate::new(CandidateKind::Username, "john.smith", "dot")),
            Arc::new(Candidate::new(CandidateKind::Username, "smithjohn", "reversed")),
        ];
        let registry = Registry::builtin().unwrap();
        let result = enumerator.run(&usernames, &registry, 1_000).await;

        // max_usernames = 2, two hits each
        assert_eq!(result.outcomes.len(), 4);
        assert!(result.note.is_none());
        assert!(result.outcomes.iter().all(|o| o.source == OutcomeSource::Enumerator));
        assert_eq!(result.outcomes[0].task.platform.id, "github");
        assert_eq!(result.outcomes[1].task.platform.id, "obscure_forum");
        let ids: Vec<TaskId> = result.outcomes.iter().map(|o| o.task.id).collect();
        assert_eq!(ids, vec![1_000, 1_001, 1_002, 1_003]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
