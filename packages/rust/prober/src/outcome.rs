//! Probe tasks and their outcomes.

use std::collections::BTreeSet;
use std::sync::Arc;

use dossier_registry::PlatformSpec;
use dossier_shared::Candidate;
use serde::{Deserialize, Serialize};

/// Identifier of a probe task, unique within a run.
pub type TaskId = u64;

// ---------------------------------------------------------------------------
// ProbeTask
// ---------------------------------------------------------------------------

/// One `(candidate, platform)` pairing scheduled for probing.
#[derive(Debug, Clone)]
pub struct ProbeTask {
    pub id: TaskId,
    pub candidate: Arc<Candidate>,
    pub platform: Arc<PlatformSpec>,
}

impl ProbeTask {
    pub fn new(id: TaskId, candidate: Arc<Candidate>, platform: Arc<PlatformSpec>) -> Self {
        Self {
            id,
            candidate,
            platform,
        }
    }

    /// The probe URL for this task.
    pub fn url(&self) -> String {
        self.platform.expand(self.candidate.value())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Why a probe could not decide either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconclusiveReason {
    /// Token wait exhausted, HTTP 429, or class cooldown.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 401/403/999: the platform refuses automated access.
    Blocked,
    /// The probe exceeded its per-task timeout.
    Timeout,
    /// The global deadline passed before the probe finished or started.
    Deadline,
    /// The run was cancelled before the probe started.
    Cancelled,
    /// Removed from the queue by the planner.
    Pruned,
    /// A status code the predicate does not cover.
    UnexpectedStatus,
    /// The body could not be interpreted (e.g. invalid JSON).
    Unparseable,
}

impl InconclusiveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Blocked => "blocked",
            Self::Timeout => "timeout",
            Self::Deadline => "deadline",
            Self::Cancelled => "cancelled",
            Self::Pruned => "pruned",
            Self::UnexpectedStatus => "unexpected_status",
            Self::Unparseable => "unparseable",
        }
    }
}

/// Failures that are not a platform's answer at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection or request failure after one retry.
    Network,
    /// Refused locally (private or loopback target).
    Blocked,
    /// The expanded URL is not a valid URL.
    InvalidTarget,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Blocked => "blocked",
            Self::InvalidTarget => "invalid_target",
        }
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ProbeStatus {
    Found,
    NotFound,
    Inconclusive(InconclusiveReason),
    Error(ErrorKind),
}

impl ProbeStatus {
    /// Merge precedence: `Found > NotFound > Inconclusive > Error`.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Found => 3,
            Self::NotFound => 2,
            Self::Inconclusive(_) => 1,
            Self::Error(_) => 0,
        }
    }

    /// The stronger of two statuses. Ties break on the reason so the result
    /// does not depend on argument order.
    pub fn strongest(self, other: Self) -> Self {
        match self.rank().cmp(&other.rank()) {
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Equal => match (self, other) {
                (Self::Inconclusive(a), Self::Inconclusive(b)) => Self::Inconclusive(a.min(b)),
                (Self::Error(a), Self::Error(b)) => Self::Error(a.min(b)),
                _ => self,
            },
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found)
    }

    /// Found or NotFound: the platform gave a definite answer.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Found | Self::NotFound)
    }

    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn label(&self) -> String {
        match self {
            Self::Found => "found".into(),
            Self::NotFound => "not_found".into(),
            Self::Inconclusive(r) => format!("inconclusive({})", r.as_str()),
            Self::Error(k) => format!("error({})", k.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// A link from a profile page to an account on another known platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileLink {
    pub platform: String,
    pub identifier: String,
    pub url: String,
}

/// What a positive probe revealed beyond existence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Public profile URL.
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub emails: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub phones: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub links: BTreeSet<ProfileLink>,
}

impl Evidence {
    pub fn with_profile(url: impl Into<String>) -> Self {
        Self {
            profile_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set union; the profile URL keeps the lexicographically smallest value.
    pub fn merge(&mut self, other: &Evidence) {
        self.profile_url = match (self.profile_url.take(), &other.profile_url) {
            (Some(a), Some(b)) => Some(if &a <= b { a } else { b.clone() }),
            (a, b) => a.or_else(|| b.clone()),
        };
        self.emails.extend(other.emails.iter().cloned());
        self.phones.extend(other.phones.iter().cloned());
        self.links.extend(other.links.iter().cloned());
    }

    pub fn has_contacts(&self) -> bool {
        !self.emails.is_empty() || !self.phones.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ProbeOutcome
// ---------------------------------------------------------------------------

/// Where an outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeSource {
    Registry,
    Enumerator,
}

/// The single, final result of one probe task.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub task: ProbeTask,
    pub status: ProbeStatus,
    pub latency_ms: u64,
    pub evidence: Option<Evidence>,
    pub source: OutcomeSource,
}

impl ProbeOutcome {
    /// An outcome for a task that never reached the network.
    pub fn unstarted(task: ProbeTask, reason: InconclusiveReason) -> Self {
        Self {
            task,
            status: ProbeStatus::Inconclusive(reason),
            latency_ms: 0,
            evidence: None,
            source: OutcomeSource::Registry,
        }
    }
}
