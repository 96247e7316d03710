//! Core domain types shared across the investigation pipeline.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Boxed, sendable future used at the trait seams that need dynamic dispatch
/// (planning strategies, reasoning clients).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single investigation run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Investigation depth. Selects rule sets, platforms and budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Basic,
    Advanced,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown mode '{other}': expected 'basic' or 'advanced'")),
        }
    }
}

// ---------------------------------------------------------------------------
// IdentitySeed
// ---------------------------------------------------------------------------

/// The human-readable identity under investigation. Immutable input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySeed {
    /// Full name as typed by the user.
    pub name: String,
    /// Free-form location (state, city), used for phone prefixes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl IdentitySeed {
    pub fn new(name: impl Into<String>, location: Option<String>) -> Self {
        Self {
            name: name.into(),
            location: location.filter(|l| !l.trim().is_empty()),
        }
    }

    /// Whether the name carries no usable characters.
    pub fn is_blank(&self) -> bool {
        self.tokens().is_empty()
    }

    /// Lowercased name tokens with separators split and punctuation dropped.
    ///
    /// `"Mary-Jane  O'Neil"` → `["mary", "jane", "oneil"]`.
    pub fn tokens(&self) -> Vec<String> {
        self.name
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_' || c == '.')
            .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// What a generated identifier represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Username,
    Email,
    PhonePattern,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::PhonePattern => "phone_pattern",
        }
    }

    /// Phone patterns are report-only hints and never sent to a platform.
    pub fn is_probeable(&self) -> bool {
        !matches!(self, Self::PhonePattern)
    }
}

/// A generated identifier not yet verified against any platform.
///
/// Fields are private so a candidate cannot change after generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    kind: CandidateKind,
    value: String,
    source_pattern: String,
}

impl Candidate {
    pub fn new(kind: CandidateKind, value: impl Into<String>, source_pattern: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            source_pattern: source_pattern.into(),
        }
    }

    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Name of the generation rule that produced this candidate.
    pub fn source_pattern(&self) -> &str {
        &self.source_pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn seed_tokens_split_and_normalize() {
        let seed = IdentitySeed::new("  Mary-Jane  O'Neil ", None);
        assert_eq!(seed.tokens(), vec!["mary", "jane", "oneil"]);
        assert!(!seed.is_blank());
    }

    #[test]
    fn blank_seed_detected() {
        assert!(IdentitySeed::new("", None).is_blank());
        assert!(IdentitySeed::new("   \t ", None).is_blank());
        assert!(IdentitySeed::new(" -- ", None).is_blank());
    }

    #[test]
    fn empty_location_is_dropped() {
        let seed = IdentitySeed::new("John Smith", Some("  ".into()));
        assert!(seed.location.is_none());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Advanced".parse::<Mode>().unwrap(), Mode::Advanced);
        assert_eq!("basic".parse::<Mode>().unwrap(), Mode::Basic);
        assert!("deep".parse::<Mode>().is_err());
    }

    #[test]
    fn candidate_serializes_with_snake_case_kind() {
        let c = Candidate::new(CandidateKind::PhonePattern, "(213) XXX-XXXX", "area-code");
        let json = serde_json::to_string(&c).expect("serialize");
        assert!(json.contains(r#""kind":"phone_pattern""#));
        assert!(!CandidateKind::PhonePattern.is_probeable());
        assert!(CandidateKind::Email.is_probeable());
    }
}
