//! Username variation rules.
//!
//! Rules are a fixed, ordered table. Each rule has a stable name (recorded as
//! the candidate's `source_pattern`) and a [`Specificity`] used by the scorer.
//! Basic mode applies the first five rules only.

use serde::{Deserialize, Serialize};

/// How closely a generated identifier tracks the literal name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    /// The full name with at most a separator (`johnsmith`, `john.smith`).
    Exact,
    /// A recognizable transformation (initials, reversal, suffixes).
    Derived,
    /// Only part of the name (`john`, `smith`), or a generated hint.
    Partial,
}

/// Name tokens split into the parts the rules work with.
#[derive(Debug, Clone)]
pub(crate) struct NameParts {
    pub first: String,
    pub middle: Vec<String>,
    pub last: Option<String>,
}

impl NameParts {
    /// Build from normalized tokens. Returns `None` for an empty token list.
    pub fn from_tokens(tokens: &[String]) -> Option<Self> {
        let (first, rest) = tokens.split_first()?;
        let (last, middle) = match rest.split_last() {
            Some((last, middle)) => (Some(last.clone()), middle.to_vec()),
            None => (None, Vec::new()),
        };
        Some(Self {
            first: first.clone(),
            middle,
            last,
        })
    }

    fn initial(s: &str) -> String {
        s.chars().next().map(String::from).unwrap_or_default()
    }

    /// `first + last`, or just `first` for single-token names.
    fn joined(&self) -> String {
        match &self.last {
            Some(last) => format!("{}{last}", self.first),
            None => self.first.clone(),
        }
    }

    fn with_last(&self, f: impl Fn(&str, &str) -> String) -> Option<String> {
        self.last.as_deref().map(|last| f(&self.first, last))
    }
}

/// A single username transformation.
pub(crate) struct UsernameRule {
    pub name: &'static str,
    pub specificity: Specificity,
    build: fn(&NameParts) -> Option<String>,
}

impl UsernameRule {
    pub fn apply(&self, parts: &NameParts) -> Option<String> {
        (self.build)(parts).filter(|u| u.chars().any(|c| c.is_alphanumeric()))
    }
}

/// Number of leading rules applied in basic mode.
pub(crate) const BASIC_RULE_COUNT: usize = 5;

macro_rules! rule {
    ($name:literal, $spec:ident, $build:expr) => {
        UsernameRule {
            name: $name,
            specificity: Specificity::$spec,
            build: $build,
        }
    };
}

/// The full ordered rule table. The first [`BASIC_RULE_COUNT`] are the basic set.
pub(crate) static RULES: &[UsernameRule] = &[
    // Basic set
    rule!("concat", Exact, |p| Some(p.joined())),
    rule!("dot", Exact, |p| p.with_last(|f, l| format!("{f}.{l}"))),
    rule!("initial_last", Derived, |p| {
        p.with_last(|f, l| format!("{}{l}", NameParts::initial(f)))
    }),
    rule!("reversed", Derived, |p| p.with_last(|f, l| format!("{l}{f}"))),
    rule!("underscore", Exact, |p| p.with_last(|f, l| format!("{f}_{l}"))),
    // Separators and ordering
    rule!("hyphen", Exact, |p| p.with_last(|f, l| format!("{f}-{l}"))),
    rule!("full_concat", Exact, |p| {
        if p.middle.is_empty() {
            None
        } else {
            p.with_last(|f, l| format!("{f}{}{l}", p.middle.concat()))
        }
    }),
    rule!("reversed_underscore", Derived, |p| {
        p.with_last(|f, l| format!("{l}_{f}"))
    }),
    rule!("reversed_dot", Derived, |p| p.with_last(|f, l| format!("{l}.{f}"))),
    // Initials
    rule!("first_initial", Derived, |p| {
        p.with_last(|f, l| format!("{f}{}", NameParts::initial(l)))
    }),
    rule!("initial_dot_last", Derived, |p| {
        p.with_last(|f, l| format!("{}.{l}", NameParts::initial(f)))
    }),
    rule!("initial_underscore_last", Derived, |p| {
        p.with_last(|f, l| format!("{}_{l}", NameParts::initial(f)))
    }),
    // Numeric suffixes
    rule!("suffix_1", Derived, |p| Some(format!("{}1", p.joined()))),
    rule!("suffix_99", Derived, |p| Some(format!("{}99", p.joined()))),
    rule!("suffix_123", Derived, |p| Some(format!("{}123", p.joined()))),
    rule!("suffix_2024", Derived, |p| Some(format!("{}2024", p.joined()))),
    // Underscore decorations
    rule!("leading_underscore", Derived, |p| Some(format!("_{}", p.joined()))),
    rule!("trailing_underscore", Derived, |p| Some(format!("{}_", p.joined()))),
    rule!("wrapped_underscore", Derived, |p| {
        p.with_last(|f, l| format!("_{f}_{l}_"))
    }),
    // Vanity prefixes and suffixes
    rule!("official", Derived, |p| Some(format!("{}official", p.joined()))),
    rule!("real_prefix", Derived, |p| Some(format!("real{}", p.joined()))),
    rule!("real_suffix", Derived, |p| Some(format!("{}real", p.joined()))),
    rule!("the_prefix", Derived, |p| Some(format!("the{}", p.joined()))),
    rule!("its_prefix", Derived, |p| Some(format!("its{}", p.joined()))),
    rule!("iam_prefix", Derived, |p| Some(format!("iam{}", p.joined()))),
    // Single tokens
    rule!("first_only", Partial, |p| {
        p.last.as_ref().map(|_| p.first.clone())
    }),
    rule!("last_only", Partial, |p| p.last.clone()),
];

/// The rules for the requested depth.
pub(crate) fn rules_for(advanced: bool) -> &'static [UsernameRule] {
    if advanced {
        RULES
    } else {
        &RULES[..BASIC_RULE_COUNT]
    }
}

/// Look up the specificity recorded for a username rule name.
pub(crate) fn specificity_of(rule_name: &str) -> Option<Specificity> {
    RULES
        .iter()
        .find(|r| r.name == rule_name)
        .map(|r| r.specificity)
}
