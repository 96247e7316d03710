//! The investigation report: the single value that leaves a run.

use chrono::{DateTime, Utc};
use dossier_candidates::Specificity;
use dossier_prober::{Evidence, OutcomeSource, Website};
use dossier_registry::Tier;
use dossier_shared::{CandidateKind, IdentitySeed, Mode, RunId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Consolidated, confidence-scored result of one investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationReport {
    pub run_id: RunId,
    pub seed: IdentitySeed,
    pub mode: Mode,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Positive outcomes, highest confidence first.
    pub findings: Vec<Finding>,
    pub username_candidates: Vec<UsernameCandidate>,
    pub email_candidates: Vec<EmailCandidate>,
    pub phone_patterns: Vec<PhoneHint>,
    /// Emails and phone numbers extracted from profile pages.
    pub discovered_contacts: Vec<DiscoveredContact>,
    /// Personal websites that answered on a guessed domain (advanced mode).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub websites: Vec<Website>,
    pub overall_confidence: f64,
    pub coverage: Coverage,
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl InvestigationReport {
    /// Distinct platform ids with at least one finding.
    pub fn platforms_found(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.findings.iter().map(|f| f.platform_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Overall confidence as a whole percentage.
    pub fn confidence_percent(&self) -> u32 {
        (self.overall_confidence * 100.0).round() as u32
    }
}

/// A deduplicated positive outcome for one `(identifier, platform)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Hex SHA-256 of `platform_id` and `identifier`; stable across runs.
    pub id: String,
    pub platform_id: String,
    pub platform_name: String,
    pub tier: Tier,
    pub identifier: String,
    pub kind: CandidateKind,
    pub source_pattern: String,
    pub specificity: Specificity,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    /// Other platforms whose findings support this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corroborated_by: Vec<String>,
    pub sources: Vec<OutcomeSource>,
    pub latency_ms: u64,
    pub evidence: Evidence,
}

/// Stable fingerprint for a finding.
pub fn fingerprint(platform_id: &str, identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(platform_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(identifier.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A generated username and how it was derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameCandidate {
    pub value: String,
    pub pattern: String,
    pub specificity: Specificity,
    /// Platforms on which the username was found.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub found_on: Vec<String>,
}

/// A generated email address. Listed whether or not it was probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCandidate {
    pub address: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub found_on: Vec<String>,
}

/// A phone-number prefix hint derived from the seed's location. Never probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneHint {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Email,
    Phone,
}

/// A contact extracted from one or more profile pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredContact {
    pub kind: ContactKind,
    pub value: String,
    /// Platform ids whose profile pages showed the contact.
    pub seen_on: Vec<String>,
}

/// How much of the registry actually answered. Registry outcomes only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub platforms_probed: usize,
    pub platforms_resolved: usize,
    pub tasks_dispatched: usize,
    pub tasks_inconclusive: usize,
    pub tasks_errored: usize,
}

impl Coverage {
    /// `platforms_resolved / platforms_probed`, or 0 when nothing was probed.
    pub fn ratio(&self) -> f64 {
        if self.platforms_probed == 0 {
            0.0
        } else {
            self.platforms_resolved as f64 / self.platforms_probed as f64
        }
    }
}
