//! Probe dispatching for Dossier.
//!
//! This crate provides:
//! - [`Dispatcher`]: bounded worker pool turning [`ProbeTask`]s into [`ProbeOutcome`]s
//! - [`RateLimiters`]: one token bucket per rate class, with 429 cooldowns
//! - [`classify`]: status/predicate classification of responses
//! - [`ExternalEnumerator`]: optional Sherlock-compatible subprocess
//! - [`WebsiteSweep`]: personal-website checks for guessed domains
//! - [`CancelToken`]: cooperative cancellation

mod cancel;
mod classify;
mod dispatcher;
pub mod enumerator;
mod evidence;
mod fetch;
mod limiter;
mod outcome;
mod websites;

pub use cancel::CancelToken;
pub use classify::classify;
pub use dispatcher::{Budget, DispatchHandle, DispatchStats, Dispatcher, OutcomeStream};
pub use enumerator::{EnumeratedAccount, Enumeration, ExternalEnumerator};
pub use limiter::{RateLimiters, TokenBucket};
pub use outcome::{
    ErrorKind, Evidence, InconclusiveReason, OutcomeSource, ProbeOutcome, ProbeStatus, ProbeTask,
    ProfileLink, TaskId,
};
pub use websites::{Website, WebsiteSweep};
