//! Email candidate templates.
//!
//! Local-part formats are crossed with a curated list of consumer mail
//! domains. Addresses are validated and the output is capped so the probe
//! volume stays bounded.

use std::sync::LazyLock;

use regex::Regex;

use crate::usernames::{NameParts, Specificity};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("static email regex")
});

/// A local-part format such as `first.last`.
pub(crate) struct EmailFormat {
    pub name: &'static str,
    pub specificity: Specificity,
    build: fn(&NameParts) -> Option<String>,
}

/// Number of leading formats used in basic mode.
const BASIC_FORMAT_COUNT: usize = 5;

/// Number of leading domains used in basic mode.
const BASIC_DOMAIN_COUNT: usize = 3;

pub(crate) static FORMATS: &[EmailFormat] = &[
    EmailFormat {
        name: "first.last",
        specificity: Specificity::Exact,
        build: |p| p.last.as_ref().map(|l| format!("{}.{l}", p.first)),
    },
    EmailFormat {
        name: "flast",
        specificity: Specificity::Derived,
        build: |p| {
            let initial = p.first.chars().next()?;
            p.last.as_ref().map(|l| format!("{initial}{l}"))
        },
    },
    EmailFormat {
        name: "firstlast",
        specificity: Specificity::Exact,
        build: |p| p.last.as_ref().map(|l| format!("{}{l}", p.first)),
    },
    EmailFormat {
        name: "first_last",
        specificity: Specificity::Exact,
        build: |p| p.last.as_ref().map(|l| format!("{}_{l}", p.first)),
    },
    EmailFormat {
        name: "first",
        specificity: Specificity::Partial,
        build: |p| Some(p.first.clone()),
    },
    EmailFormat {
        name: "last",
        specificity: Specificity::Partial,
        build: |p| p.last.clone(),
    },
    EmailFormat {
        name: "firstl",
        specificity: Specificity::Derived,
        build: |p| {
            let l = p.last.as_ref()?.chars().next()?;
            Some(format!("{}{l}", p.first))
        },
    },
    EmailFormat {
        name: "last.first",
        specificity: Specificity::Derived,
        build: |p| p.last.as_ref().map(|l| format!("{l}.{}", p.first)),
    },
];

pub(crate) static DOMAINS: &[&str] = &[
    "gmail.com",
    "outlook.com",
    "yahoo.com",
    "hotmail.com",
    "protonmail.com",
    "icloud.com",
];

/// Generate `(format name, address)` pairs, domain-major, capped at `cap`.
pub(crate) fn generate(parts: &NameParts, advanced: bool, cap: usize) -> Vec<(&'static str, String)> {
    let (formats, domains) = if advanced {
        (FORMATS, DOMAINS)
    } else {
        (
            &FORMATS[..BASIC_FORMAT_COUNT],
            &DOMAINS[..BASIC_DOMAIN_COUNT],
        )
    };

    let locals: Vec<(&'static str, String)> = formats
        .iter()
        .filter_map(|f| (f.build)(parts).map(|local| (f.name, local)))
        .collect();

    let mut out = Vec::new();
    'domains: for domain in domains {
        for (name, local) in &locals {
            if out.len() >= cap {
                break 'domains;
            }
            let address = format!("{local}@{domain}");
            if EMAIL_RE.is_match(&address) {
                out.push((*name, address));
            }
        }
    }
    out
}

/// Specificity recorded for an email format name.
pub(crate) fn specificity_of(format_name: &str) -> Option<Specificity> {
    FORMATS
        .iter()
        .find(|f| f.name == format_name)
        .map(|f| f.specificity)
}

/// Whether `address` looks like a syntactically valid email.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(&address.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(name: &[&str]) -> NameParts {
        let tokens: Vec<String> = name.iter().map(|s| s.to_string()).collect();
        NameParts::from_tokens(&tokens).expect("non-empty")
    }

    #[test]
    fn basic_has_at_least_four_formats_per_domain() {
        let out = generate(&parts(&["john", "smith"]), false, 100);
        for domain in &DOMAINS[..BASIC_DOMAIN_COUNT] {
            let n = out.iter().filter(|(_, a)| a.ends_with(domain)).count();
            assert!(n >= 4, "{domain} only has {n} formats");
        }
        assert!(out.iter().any(|(_, a)| a == "john.smith@gmail.com"));
        assert!(out.iter().any(|(_, a)| a == "jsmith@outlook.com"));
    }

    #[test]
    fn cap_bounds_output() {
        let out = generate(&parts(&["john", "smith"]), true, 10);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn advanced_covers_all_domains() {
        let out = generate(&parts(&["john", "smith"]), true, 1_000);
        assert_eq!(out.len(), FORMATS.len() * DOMAINS.len());
    }

    #[test]
    fn non_ascii_locals_are_rejected() {
        let out = generate(&parts(&["zoë"]), false, 100);
        assert!(out.is_empty());
    }

    #[test]
    fn validation() {
        assert!(is_valid_email("Jane.Doe@Example.org"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("not an email"));
    }
}
