//! Confidence scoring and corroboration.
//!
//! Per-finding confidence:
//!
//! ```text
//! (tier base + specificity bonus + corroboration bonus) × (1 − 0.5 × r)
//! ```
//!
//! clamped to `[0.01, 0.99]`, where `r` is the share of the platform's rate
//! class that came back inconclusive. Overall confidence combines the
//! findings, their count and registry coverage:
//!
//! ```text
//! 0.5 × (1 − Π(1 − cᵢ)) + 0.25 × (1 − 0.75ⁿ) + 0.25 × coverage_ratio
//! ```
//!
//! and is exactly 0 when there are no findings.

use dossier_candidates::Specificity;
use dossier_prober::Evidence;
use dossier_registry::Tier;
use dossier_shared::CandidateKind;

use crate::report::Coverage;

pub const CORROBORATION_STEP: f64 = 0.10;
pub const CORROBORATION_CAP: f64 = 0.20;
pub const EMAIL_BONUS: f64 = 0.10;
pub const INCONCLUSIVE_PENALTY: f64 = 0.5;
pub const MIN_CONFIDENCE: f64 = 0.01;
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Fixed confidence attached to generated phone prefixes.
pub const PHONE_HINT_CONFIDENCE: f64 = 0.4;

pub fn specificity_bonus(specificity: Specificity) -> f64 {
    match specificity {
        Specificity::Exact => 0.15,
        Specificity::Derived => 0.05,
        Specificity::Partial => -0.10,
    }
}

/// Confidence of a single finding.
pub fn finding_confidence(
    tier: Tier,
    specificity: Specificity,
    kind: CandidateKind,
    corroborations: usize,
    inconclusive_ratio: f64,
) -> f64 {
    let mut score = tier.base_confidence() + specificity_bonus(specificity);
    if kind == CandidateKind::Email {
        score += EMAIL_BONUS;
    }
    score += (corroborations as f64 * CORROBORATION_STEP).min(CORROBORATION_CAP);

    let r = inconclusive_ratio.clamp(0.0, 1.0);
    score *= 1.0 - INCONCLUSIVE_PENALTY * r;
    score.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Overall confidence for a finished run.
///
/// `confidences` should be in a deterministic order; the product is
/// order-sensitive at the last bit.
pub fn overall_confidence(confidences: &[f64], coverage: &Coverage) -> f64 {
    if confidences.is_empty() {
        return 0.0;
    }
    let miss: f64 = confidences.iter().map(|c| 1.0 - c).product();
    let n = confidences.len() as i32;

    let overall = 0.5 * (1.0 - miss) + 0.25 * (1.0 - 0.75_f64.powi(n)) + 0.25 * coverage.ratio();
    overall.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Corroboration
// ---------------------------------------------------------------------------

/// The facts a corroboration heuristic may look at.
#[derive(Debug, Clone, Copy)]
pub struct FindingFacts<'a> {
    pub platform_id: &'a str,
    pub identifier: &'a str,
    pub specificity: Specificity,
    pub evidence: &'a Evidence,
}

/// Decides whether two findings support each other.
///
/// Implementations must be symmetric: `corroborates(a, b) == corroborates(b, a)`.
pub trait CorroborationHeuristic: Send + Sync {
    fn name(&self) -> &'static str;

    fn corroborates(&self, a: &FindingFacts<'_>, b: &FindingFacts<'_>) -> bool;
}

/// Default heuristic. Two findings on different platforms corroborate when:
///
/// - their profile pages share an email address or phone number;
/// - either profile links to the other's platform under the other's
///   identifier (case-insensitive);
/// - both were found under the same identifier and that identifier is an
///   exact rendering of the name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedEvidence;

impl SharedEvidence {
    fn links_to(from: &FindingFacts<'_>, to: &FindingFacts<'_>) -> bool {
        from.evidence
            .links
            .iter()
            .any(|l| l.platform == to.platform_id && l.identifier.eq_ignore_ascii_case(to.identifier))
    }
}

impl CorroborationHeuristic for SharedEvidence {
    fn name(&self) -> &'static str {
        "shared_evidence"
    }

    fn corroborates(&self, a: &FindingFacts<'_>, b: &FindingFacts<'_>) -> bool {
        if a.platform_id == b.platform_id {
            return false;
        }
        let shared_contact = !a.evidence.emails.is_disjoint(&b.evidence.emails)
            || !a.evidence.phones.is_disjoint(&b.evidence.phones);
        let cross_linked = Self::links_to(a, b) || Self::links_to(b, a);
        let same_exact = a.specificity == Specificity::Exact
            && b.specificity == Specificity::Exact
            && a.identifier.eq_ignore_ascii_case(b.identifier);

        shared_contact || cross_linked || same_exact
    }
}

/// Never corroborates. Useful for isolating scoring in tests and audits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCorroboration;

impl CorroborationHeuristic for NoCorroboration {
    fn name(&self) -> &'static str {
        "none"
    }

    fn corroborates(&self, _a: &FindingFacts<'_>, _b: &FindingFacts<'_>) -> bool {
        false
    }
}
