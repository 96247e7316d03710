//! Investigation orchestration for Dossier.
//!
//! This crate ties candidate generation, probing and aggregation into one
//! run ([`investigate`] / [`Investigator`]) and owns the scoring model and
//! the adaptive planner.

pub mod aggregator;
pub mod pipeline;
pub mod planner;
pub mod reasoning;
pub mod report;
pub mod scoring;

pub use aggregator::Aggregator;
pub use pipeline::{InvestigateOptions, Investigator, ProgressReporter, SilentProgress, investigate};
pub use planner::{
    ExternalReasoningStrategy, InterimState, Plan, PlanningStrategy, StaticHeuristicStrategy,
    strategy_from_config,
};
pub use reasoning::{ChatCompletionsClient, ReasoningClient, ReasoningResponse};
pub use report::{
    ContactKind, Coverage, DiscoveredContact, EmailCandidate, Finding, InvestigationReport,
    PhoneHint, UsernameCandidate,
};
pub use scoring::{CorroborationHeuristic, FindingFacts, NoCorroboration, SharedEvidence};
