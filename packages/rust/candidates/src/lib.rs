//! Candidate generation from sparse identity seeds.
//!
//! [`generate`] is a pure function: no I/O, deterministic for a given seed and
//! options. It produces:
//! - usernames from an ordered rule table ([`usernames`])
//! - email addresses from local-part formats × mail domains ([`emails`])
//! - phone prefix hints from a location ([`phones`]), never probed
//!
//! [`website_domains`] derives personal-website guesses from a generated set.

mod emails;
mod phones;
mod usernames;
mod websites;

use std::collections::HashSet;

use dossier_shared::{Candidate, CandidateKind, IdentitySeed, Mode};

pub use emails::is_valid_email;
pub use usernames::Specificity;
pub use websites::{WEBSITE_USERNAME_LIMIT, website_domains};

use usernames::NameParts;

/// Prefix on email candidates' `source_pattern`.
const EMAIL_PATTERN_PREFIX: &str = "email:";

/// Prefix on phone candidates' `source_pattern`.
const PHONE_PATTERN_PREFIX: &str = "area_code:";

/// Options controlling candidate generation.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Basic applies the small rule subset; advanced the full table.
    pub mode: Mode,
    /// Upper bound on email candidates.
    pub email_cap: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Basic,
            email_cap: 48,
        }
    }
}

// ---------------------------------------------------------------------------
// CandidateSet
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free collection of candidates.
///
/// Uniqueness is by `(kind, value)`; the first rule to produce a value keeps it.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    items: Vec<Candidate>,
    seen: HashSet<(CandidateKind, String)>,
}

impl CandidateSet {
    /// Insert unless `(kind, value)` is already present. Returns whether it was added.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        let key = (candidate.kind(), candidate.value().to_string());
        if !self.seen.insert(key) {
            return false;
        }
        self.items.push(candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.items.iter()
    }

    /// Candidates of one kind, in generation order.
    pub fn of_kind(&self, kind: CandidateKind) -> impl Iterator<Item = &Candidate> {
        self.items.iter().filter(move |c| c.kind() == kind)
    }

    pub fn usernames(&self) -> impl Iterator<Item = &Candidate> {
        self.of_kind(CandidateKind::Username)
    }

    pub fn emails(&self) -> impl Iterator<Item = &Candidate> {
        self.of_kind(CandidateKind::Email)
    }

    pub fn phone_patterns(&self) -> impl Iterator<Item = &Candidate> {
        self.of_kind(CandidateKind::PhonePattern)
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.items
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate candidates for a seed.
///
/// An empty or whitespace-only name yields an empty set; that is not an error.
pub fn generate(seed: &IdentitySeed, opts: &GenerateOptions) -> CandidateSet {
    let mut set = CandidateSet::default();
    let tokens = seed.tokens();
    let Some(parts) = NameParts::from_tokens(&tokens) else {
        tracing::debug!("seed has no usable name tokens");
        return set;
    };

    let advanced = opts.mode == Mode::Advanced;

    for rule in usernames::rules_for(advanced) {
        if let Some(username) = rule.apply(&parts) {
            set.insert(Candidate::new(CandidateKind::Username, username, rule.name));
        }
    }

    for (format, address) in emails::generate(&parts, advanced, opts.email_cap) {
        set.insert(Candidate::new(
            CandidateKind::Email,
            address,
            format!("{EMAIL_PATTERN_PREFIX}{format}"),
        ));
    }

    if let Some(location) = &seed.location {
        for prefix in phones::patterns_for(location) {
            set.insert(Candidate::new(
                CandidateKind::PhonePattern,
                prefix.pattern,
                format!("{PHONE_PATTERN_PREFIX}{}", prefix.region),
            ));
        }
    }

    tracing::debug!(
        usernames = set.usernames().count(),
        emails = set.emails().count(),
        phone_patterns = set.phone_patterns().count(),
        "generated candidates"
    );

    set
}

/// Specificity of a candidate, recovered from its `source_pattern`.
///
/// Unknown patterns (e.g. identifiers supplied by an external enumerator) are
/// treated as [`Specificity::Derived`].
pub fn specificity(candidate: &Candidate) -> Specificity {
    let pattern = candidate.source_pattern();
    match candidate.kind() {
        CandidateKind::Username => usernames::specificity_of(pattern),
        CandidateKind::Email => pattern
            .strip_prefix(EMAIL_PATTERN_PREFIX)
            .and_then(emails::specificity_of),
        CandidateKind::PhonePattern => Some(Specificity::Partial),
    }
    .unwrap_or(Specificity::Derived)
}

/// Area code embedded in a phone-pattern candidate value, e.g. `"415"`.
pub fn area_code(candidate: &Candidate) -> Option<&str> {
    if candidate.kind() != CandidateKind::PhonePattern {
        return None;
    }
    candidate
        .value()
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
}

/// Region keyword recorded on a phone-pattern candidate.
pub fn phone_region(candidate: &Candidate) -> Option<&str> {
    candidate.source_pattern().strip_prefix(PHONE_PATTERN_PREFIX)
}

/// Local-part format recorded on an email candidate, e.g. `"first.last"`.
pub fn email_format(candidate: &Candidate) -> Option<&str> {
    if candidate.kind() != CandidateKind::Email {
        return None;
    }
    candidate.source_pattern().strip_prefix(EMAIL_PATTERN_PREFIX)
}
