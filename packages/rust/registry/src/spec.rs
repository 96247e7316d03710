//! Platform catalog entry types.

use dossier_shared::CandidateKind;
use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder substituted with the (URL-encoded) candidate value.
pub const PLACEHOLDER: &str = "{}";

// ---------------------------------------------------------------------------
// Method / Tier
// ---------------------------------------------------------------------------

/// HTTP method used for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// Platform prominence. Drives the base confidence of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Flagship,
    Major,
    #[default]
    LongTail,
}

impl Tier {
    /// Base confidence for a `Found` outcome on a platform of this tier.
    pub fn base_confidence(&self) -> f64 {
        match self {
            Self::Flagship => 0.60,
            Self::Major => 0.50,
            Self::LongTail => 0.35,
        }
    }

    /// Ordering weight used when prioritizing probes (higher first).
    pub fn priority(&self) -> u8 {
        match self {
            Self::Flagship => 2,
            Self::Major => 1,
            Self::LongTail => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flagship => "flagship",
            Self::Major => "major",
            Self::LongTail => "long_tail",
        }
    }
}

// ---------------------------------------------------------------------------
// ExistencePredicate
// ---------------------------------------------------------------------------

/// How a platform response is turned into Found / NotFound.
///
/// Tagged by `kind` in the catalog:
///
/// ```toml
/// predicate = { kind = "status", found = [200], not_found = [404] }
/// predicate = { kind = "body_absent", marker = "Page Not Found" }
/// predicate = { kind = "json_field", pointer = "/data/name" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExistencePredicate {
    /// Decide on the status code alone.
    Status {
        #[serde(default = "default_found")]
        found: Vec<u16>,
        #[serde(default = "default_not_found")]
        not_found: Vec<u16>,
    },
    /// 2xx and `marker` absent from the body means the account exists.
    BodyAbsent { marker: String },
    /// 2xx with a JSON body whose `pointer` resolves to a non-null value
    /// (equal to `expect` when given).
    JsonField {
        pointer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<serde_json::Value>,
    },
}

fn default_found() -> Vec<u16> {
    vec![200]
}

fn default_not_found() -> Vec<u16> {
    vec![404, 410]
}

impl ExistencePredicate {
    /// Whether the predicate needs the response body.
    pub fn reads_body(&self) -> bool {
        !matches!(self, Self::Status { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::BodyAbsent { .. } => "body_absent",
            Self::JsonField { .. } => "json_field",
        }
    }
}

// ---------------------------------------------------------------------------
// PlatformSpec
// ---------------------------------------------------------------------------

fn default_accepts() -> Vec<CandidateKind> {
    vec![CandidateKind::Username]
}

fn default_timeout_ms() -> u64 {
    8_000
}

/// Static description of one probe target. Read-only for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSpec {
    /// Stable identifier, unique within a catalog.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Probe URL with a `{}` placeholder for the candidate value.
    pub url_template: String,
    /// Public profile URL when it differs from the probe URL (API endpoints).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_template: Option<String>,
    #[serde(default)]
    pub method: HttpMethod,
    /// Candidate kinds this platform can be probed with.
    #[serde(default = "default_accepts")]
    pub accepts: Vec<CandidateKind>,
    pub predicate: ExistencePredicate,
    /// Platforms sharing a rate class share one token bucket.
    pub rate_class: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub tier: Tier,
    /// Included in basic mode.
    #[serde(default)]
    pub basic: bool,
    /// Extra hostnames recognized as this platform (e.g. `twitter.com` for X).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// JSON feed of public activity, read after a `Found` for commit author
    /// emails (GitHub push events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_template: Option<String>,
}

impl PlatformSpec {
    /// Check the entry's internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("empty id".into());
        }
        if self.rate_class.trim().is_empty() {
            return Err("empty rate_class".into());
        }
        if !self.url_template.contains(PLACEHOLDER) {
            return Err(format!("url_template '{}' has no {{}} placeholder", self.url_template));
        }
        if Url::parse(&self.expand("probe")).is_err() {
            return Err(format!("url_template '{}' is not a valid URL", self.url_template));
        }
        if let Some(profile) = &self.profile_template {
            if !profile.contains(PLACEHOLDER) {
                return Err(format!("profile_template '{profile}' has no {{}} placeholder"));
            }
        }
        if let Some(activity) = &self.activity_template {
            if !activity.contains(PLACEHOLDER) || Url::parse(&fill(activity, "probe")).is_err() {
                return Err(format!("activity_template '{activity}' is not a URL template"));
            }
        }
        if self.method == HttpMethod::Head && self.predicate.reads_body() {
            return Err(format!(
                "HEAD probes cannot use a {} predicate",
                self.predicate.kind()
            ));
        }
        if self.accepts.is_empty() {
            return Err("accepts no candidate kinds".into());
        }
        if self.accepts.iter().any(|k| !k.is_probeable()) {
            return Err("phone patterns cannot be probed".into());
        }
        match &self.predicate {
            ExistencePredicate::Status { found, .. } if found.is_empty() => {
                Err("status predicate with no found codes".into())
            }
            ExistencePredicate::JsonField { pointer, .. }
                if !pointer.is_empty() && !pointer.starts_with('/') =>
            {
                Err(format!("json pointer '{pointer}' must start with '/'"))
            }
            _ => Ok(()),
        }
    }

    pub fn accepts_kind(&self, kind: CandidateKind) -> bool {
        self.accepts.contains(&kind)
    }

    /// Probe URL for a candidate value.
    pub fn expand(&self, value: &str) -> String {
        fill(&self.url_template, value)
    }

    /// Public profile URL for a candidate value.
    pub fn profile_url(&self, value: &str) -> String {
        fill(self.profile_template(), value)
    }

    /// Activity feed URL for a candidate value, when the platform has one.
    pub fn activity_url(&self, value: &str) -> Option<String> {
        self.activity_template.as_deref().map(|t| fill(t, value))
    }

    fn profile_template(&self) -> &str {
        self.profile_template.as_deref().unwrap_or(&self.url_template)
    }

    /// Hostnames this platform answers to, normalized (no `www.`).
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = [Some(self.url_template.as_str()), self.profile_template.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|t| Url::parse(&fill(t, "x")).ok())
            .filter_map(|u| u.host_str().map(normalize_host))
            .chain(self.aliases.iter().map(|a| normalize_host(a)))
            .collect();
        hosts.sort();
        hosts.dedup();
        hosts
    }

    /// Recover the identifier from a profile URL on this platform, if the URL
    /// follows the profile template.
    pub fn identifier_in(&self, url: &str) -> Option<String> {
        let (prefix, _) = self.profile_template().split_once(PLACEHOLDER)?;
        let prefix = strip_scheme(prefix);
        let url = strip_scheme(url);
        let rest = url.strip_prefix(&prefix)?;
        let ident = rest.split(['/', '?', '#']).next()?;
        (!ident.is_empty()).then(|| ident.to_string())
    }
}

fn fill(template: &str, value: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    template.replace(PLACEHOLDER, &encoded)
}

/// Lowercase and drop `www.` / `m.` prefixes.
pub(crate) fn normalize_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    host.strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .map(str::to_string)
        .unwrap_or(host)
}

fn strip_scheme(s: &str) -> String {
    let s = s.to_ascii_lowercase();
    let s = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(&s);
    normalize_host(s)
}
