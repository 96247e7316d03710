//! Platform registry for Dossier.
//!
//! This crate provides:
//! - [`PlatformSpec`] and its [`ExistencePredicate`]: static probe targets
//! - [`Registry`]: catalog loading (built-in or file), filtering, and lookup
//!
//! The built-in catalog is compiled into the binary from
//! `catalog/platforms.toml`. Entries that fail to parse or validate are
//! skipped and logged; the rest of the catalog still loads.

mod spec;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use dossier_shared::{CandidateKind, DossierError, Mode, PlatformsConfig, Result};
use tracing::{info, warn};
use url::Url;

pub use spec::{ExistencePredicate, HttpMethod, PLACEHOLDER, PlatformSpec, Tier};

/// The catalog shipped with the binary.
pub const BUILTIN_CATALOG: &str = include_str!("../catalog/platforms.toml");

/// A catalog entry excluded at load time.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    /// Position in the `[[platform]]` array.
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

/// Loaded, immutable set of platforms in catalog order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    platforms: Vec<Arc<PlatformSpec>>,
    skipped: Vec<SkippedEntry>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Registry {
    /// Parse the built-in catalog.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Load according to configuration: the configured catalog file (or the
    /// built-in one), then enabled-class and disabled-id filters.
    pub fn load(config: &PlatformsConfig) -> Result<Self> {
        let registry = match &config.catalog_path {
            Some(path) => Self::from_file(Path::new(path))?,
            None => Self::builtin()?,
        };
        let registry = registry.filtered(config);
        info!(
            platforms = registry.len(),
            skipped = registry.skipped.len(),
            "platform registry loaded"
        );
        Ok(registry)
    }

    /// Read a catalog from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DossierError::io(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// Parse a catalog document.
    ///
    /// Only an unparseable document is an error. Individual malformed entries
    /// are recorded in [`Registry::skipped`].
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let doc: toml::Table = raw
            .parse()
            .map_err(|e| DossierError::config(format!("invalid platform catalog: {e}")))?;

        let entries = match doc.get("platform") {
            Some(toml::Value::Array(entries)) => entries.clone(),
            Some(_) => {
                return Err(DossierError::config(
                    "invalid platform catalog: `platform` must be an array of tables",
                ));
            }
            None => Vec::new(),
        };

        let mut registry = Self::default();
        let mut seen = HashSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let id = entry.get("id").and_then(|v| v.as_str()).map(str::to_string);
            let mut skip = |reason: String| {
                warn!(index, id = id.as_deref().unwrap_or("?"), %reason, "skipping platform entry");
                registry.skipped.push(SkippedEntry {
                    index,
                    id: id.clone(),
                    reason,
                });
            };

            let spec = match entry.try_into::<PlatformSpec>() {
                Ok(spec) => spec,
                Err(e) => {
                    skip(format!("malformed entry: {e}"));
                    continue;
                }
            };
            if let Err(reason) = spec.validate() {
                skip(reason);
                continue;
            }
            if !seen.insert(spec.id.clone()) {
                skip(format!("duplicate id '{}'", spec.id));
                continue;
            }
            registry.platforms.push(Arc::new(spec));
        }

        Ok(registry)
    }

    /// Build directly from specs. Invalid or duplicate specs are skipped.
    pub fn from_specs(specs: impl IntoIterator<Item = PlatformSpec>) -> Self {
        let mut registry = Self::default();
        let mut seen = HashSet::new();
        for (index, spec) in specs.into_iter().enumerate() {
            let reason = match spec.validate() {
                Err(reason) => Some(reason),
                Ok(()) if !seen.insert(spec.id.clone()) => Some(format!("duplicate id '{}'", spec.id)),
                Ok(()) => None,
            };
            match reason {
                Some(reason) => registry.skipped.push(SkippedEntry {
                    index,
                    id: Some(spec.id),
                    reason,
                }),
                None => registry.platforms.push(Arc::new(spec)),
            }
        }
        registry
    }

    /// Apply `enabled_classes` (empty = all) and `disabled` ids.
    pub fn filtered(mut self, config: &PlatformsConfig) -> Self {
        self.platforms.retain(|p| {
            let class_ok = config.enabled_classes.is_empty()
                || config.enabled_classes.iter().any(|c| c == &p.rate_class);
            class_ok && !config.disabled.iter().any(|d| d == &p.id)
        });
        self
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Registry {
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// All platforms in catalog order.
    pub fn all(&self) -> &[Arc<PlatformSpec>] {
        &self.platforms
    }

    /// Entries excluded at load time.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    pub fn get(&self, id: &str) -> Option<&Arc<PlatformSpec>> {
        self.platforms.iter().find(|p| p.id == id)
    }

    /// Platforms accepting `kind`, in catalog order.
    pub fn list_targets(&self, kind: CandidateKind) -> Vec<Arc<PlatformSpec>> {
        self.platforms
            .iter()
            .filter(|p| p.accepts_kind(kind))
            .cloned()
            .collect()
    }

    /// Platforms accepting `kind` that are enabled for `mode`.
    pub fn targets_for(&self, kind: CandidateKind, mode: Mode) -> Vec<Arc<PlatformSpec>> {
        self.list_targets(kind)
            .into_iter()
            .filter(|p| mode == Mode::Advanced || p.basic)
            .collect()
    }

    /// Platforms enabled for `mode`, any kind.
    pub fn for_mode(&self, mode: Mode) -> Vec<Arc<PlatformSpec>> {
        self.platforms
            .iter()
            .filter(|p| mode == Mode::Advanced || p.basic)
            .cloned()
            .collect()
    }

    /// Distinct rate classes.
    pub fn rate_classes(&self) -> BTreeSet<&str> {
        self.platforms.iter().map(|p| p.rate_class.as_str()).collect()
    }

    /// Map an arbitrary URL to the platform hosting it.
    pub fn identify(&self, url: &str) -> Option<&Arc<PlatformSpec>> {
        let parsed = Url::parse(url).ok()?;
        let host = spec::normalize_host(parsed.host_str()?);
        self.platforms
            .iter()
            .find(|p| p.hosts().iter().any(|h| *h == host))
    }

    /// Match a display name or id, case-insensitively (e.g. `"GitHub"`).
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<PlatformSpec>> {
        let needle = name.trim();
        self.platforms
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(needle) || p.name.eq_ignore_ascii_case(needle))
    }
}
