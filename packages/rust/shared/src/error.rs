//! Error types for Dossier.
//!
//! Library crates use [`DossierError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Dossier operations.
#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    /// The identity seed is empty or otherwise unusable.
    #[error("input error: {message}")]
    Input { message: String },

    /// A single probe failed (network, timeout, rate limit).
    #[error("probe error: {0}")]
    Probe(String),

    /// An optional collaborator (enumerator, reasoning service) is missing or failing.
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: String,
        message: String,
    },

    /// Configuration loading or validation error.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Network/HTTP error outside of an individual probe.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The caller cancelled the investigation.
    #[error("investigation cancelled")]
    Cancelled,

    /// An internal invariant was violated (e.g. no platforms to probe).
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DossierError>;

impl DossierError {
    /// Create an input error from any displayable message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    /// Create a configuration error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Mark a named collaborator as unavailable.
    pub fn unavailable(collaborator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: collaborator.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a whole run rather than a single task.
    pub fn is_run_level(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Invariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DossierError::config("missing [probe] section");
        assert_eq!(err.to_string(), "configuration error: missing [probe] section");

        let err = DossierError::unavailable("sherlock", "not installed");
        assert_eq!(err.to_string(), "sherlock unavailable: not installed");
    }

    #[test]
    fn only_cancellation_and_invariants_are_run_level() {
        assert!(DossierError::Cancelled.is_run_level());
        assert!(DossierError::Invariant("empty registry".into()).is_run_level());
        assert!(!DossierError::Probe("timeout".into()).is_run_level());
        assert!(!DossierError::input("blank name").is_run_level());
        assert!(!DossierError::unavailable("reasoning", "401").is_run_level());
    }
}
