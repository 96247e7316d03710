//! Personal-website domain guesses.
//!
//! The compact name and the first few usernames, each under a handful of
//! common top-level domains: `johnsmith.com`, `jsmith.io`, ...

use dossier_shared::IdentitySeed;

use crate::CandidateSet;

const TLDS: &[&str] = &["com", "net", "io"];

/// Usernames turned into domain guesses, in generation order.
pub const WEBSITE_USERNAME_LIMIT: usize = 5;

/// Domains worth checking for a personal website. Deterministic and
/// duplicate-free; names that are not valid hostnames are skipped.
pub fn website_domains(seed: &IdentitySeed, candidates: &CandidateSet) -> Vec<String> {
    let compact = seed.tokens().concat();
    let labels = std::iter::once(compact).chain(
        candidates
            .usernames()
            .take(WEBSITE_USERNAME_LIMIT)
            .map(|c| c.value().to_string()),
    );

    let mut domains: Vec<String> = Vec::new();
    for label in labels.filter(|l| is_host_label(l)) {
        for tld in TLDS {
            let domain = format!("{label}.{tld}");
            if !domains.contains(&domain) {
                domains.push(domain);
            }
        }
    }
    domains
}

fn is_host_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !label.starts_with(['-', '.'])
        && !label.ends_with(['-', '.'])
        && !label.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenerateOptions, generate};

    #[test]
    fn name_and_usernames_under_common_tlds() {
        let seed = IdentitySeed::new("John Smith", None);
        let set = generate(&seed, &GenerateOptions::default());
        let domains = website_domains(&seed, &set);

        assert_eq!(&domains[..3], ["johnsmith.com", "johnsmith.net", "johnsmith.io"]);
        assert!(domains.contains(&"jsmith.io".to_string()));
        assert!(domains.contains(&"john.smith.com".to_string()));
        // underscores are not valid in hostnames
        assert!(domains.iter().all(|d| !d.contains('_')));

        let unique: std::collections::HashSet<&String> = domains.iter().collect();
        assert_eq!(unique.len(), domains.len());
        assert!(domains.len() <= (1 + WEBSITE_USERNAME_LIMIT) * TLDS.len());
    }

    #[test]
    fn blank_seed_has_no_domains() {
        let seed = IdentitySeed::new("  ", None);
        assert!(website_domains(&seed, &CandidateSet::default()).is_empty());
    }

    #[test]
    fn label_rules() {
        assert!(is_host_label("john-smith"));
        assert!(!is_host_label("john_smith"));
        assert!(!is_host_label("-john"));
        assert!(!is_host_label("john..smith"));
        assert!(!is_host_label(""));
    }
}
