//! Shared types, error model, and configuration for Dossier.
//!
//! This crate is the foundation depended on by all other Dossier crates.
//! It provides:
//! - [`DossierError`]: the unified error type
//! - Domain types ([`IdentitySeed`], [`Candidate`], [`Mode`], [`RunId`])
//! - Configuration ([`AppConfig`], [`ProbeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, EnumeratorConfig, PlatformsConfig, ProbeConfig, ProbeSettings,
    RateClassLimit, RateLimitsConfig, ReasoningConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, reasoning_api_key,
};
pub use error::{DossierError, Result};
pub use types::{BoxFuture, Candidate, CandidateKind, IdentitySeed, Mode, RunId};
