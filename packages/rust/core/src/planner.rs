//! Adaptive planning: reorder and prune the probe queue at checkpoints, and
//! write the closing narrative.
//!
//! Two strategies exist. [`StaticHeuristicStrategy`] is a pure function of
//! the interim state. [`ExternalReasoningStrategy`] asks the reasoning
//! collaborator and falls back to the static strategy on any failure.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dossier_candidates::Specificity;
use dossier_prober::TaskId;
use dossier_registry::Tier;
use dossier_shared::{AppConfig, BoxFuture, CandidateKind, DossierError, IdentitySeed, Mode, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::reasoning::{ChatCompletionsClient, ReasoningClient, ReasoningResponse, parse_response};
use crate::report::InvestigationReport;

/// Resolved probes a candidate needs, all NotFound, before it may be pruned.
pub const DEFAULT_PRUNE_AFTER: usize = 3;

/// Hit rate assumed for a rate class with no resolved probes yet.
const NEUTRAL_HIT_RATE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Planner inputs and outputs
// ---------------------------------------------------------------------------

/// A positive result seen so far.
#[derive(Debug, Clone, Serialize)]
pub struct InterimFinding {
    pub platform_id: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}

/// Resolution counts for one candidate across registry probes.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateProgress {
    pub value: String,
    pub kind: CandidateKind,
    pub specificity: Specificity,
    pub resolved: usize,
    pub found: usize,
}

/// A queued task, flattened for planning.
#[derive(Debug, Clone, Serialize)]
pub struct PendingTask {
    pub id: TaskId,
    pub candidate: String,
    pub kind: CandidateKind,
    pub specificity: Specificity,
    pub platform_id: String,
    pub tier: Tier,
    pub rate_class: String,
}

/// Snapshot of a run at a checkpoint.
#[derive(Debug, Clone, Serialize)]
pub struct InterimState {
    pub mode: Mode,
    pub completed: usize,
    pub total: usize,
    pub findings: Vec<InterimFinding>,
    pub candidates: Vec<CandidateProgress>,
    /// Found / resolved per rate class. Classes with nothing resolved are absent.
    pub class_hit_rates: BTreeMap<String, f64>,
    pub pending: Vec<PendingTask>,
}

/// Advice returned by a strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Task ids to move to the front of the queue, in order.
    pub reordered_queue: Option<Vec<TaskId>>,
    /// Candidate values whose queued tasks should be dropped.
    pub pruned_candidates: Vec<String>,
    /// Interim commentary. Kept in the report notes.
    pub narrative: Option<String>,
}

/// Steers dispatch at checkpoints and narrates the final report.
pub trait PlanningStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn plan<'a>(&'a self, seed: &'a IdentitySeed, interim: &'a InterimState) -> BoxFuture<'a, Plan>;

    fn narrate<'a>(&'a self, seed: &'a IdentitySeed, report: &'a InvestigationReport) -> BoxFuture<'a, Option<String>>;
}

// ---------------------------------------------------------------------------
// Static heuristic
// ---------------------------------------------------------------------------

/// Deterministic planner.
///
/// Orders pending tasks by platform tier, then the rate class's hit rate so
/// far, then candidate specificity. Prunes candidates that have been checked
/// on at least `prune_after` platforms without a single hit.
#[derive(Debug, Clone)]
pub struct StaticHeuristicStrategy {
    prune_after: usize,
}

impl Default for StaticHeuristicStrategy {
    fn default() -> Self {
        Self {
            prune_after: DEFAULT_PRUNE_AFTER,
        }
    }
}

impl StaticHeuristicStrategy {
    pub fn new(prune_after: usize) -> Self {
        Self {
            prune_after: prune_after.max(1),
        }
    }

    /// Pending task ids in preferred order.
    pub fn order(&self, interim: &InterimState) -> Vec<TaskId> {
        let mut pending: Vec<&PendingTask> = interim.pending.iter().collect();
        pending.sort_by(|a, b| {
            let hit = |t: &PendingTask| {
                interim
                    .class_hit_rates
                    .get(&t.rate_class)
                    .copied()
                    .unwrap_or(NEUTRAL_HIT_RATE)
            };
            Reverse(a.tier.priority())
                .cmp(&Reverse(b.tier.priority()))
                .then_with(|| hit(b).total_cmp(&hit(a)))
                .then_with(|| a.specificity.cmp(&b.specificity))
                .then_with(|| a.id.cmp(&b.id))
        });
        pending.into_iter().map(|t| t.id).collect()
    }

    /// Candidates with queued work whose every resolved probe was NotFound.
    pub fn prunable(&self, interim: &InterimState) -> Vec<String> {
        let queued: BTreeSet<&str> = interim.pending.iter().map(|t| t.candidate.as_str()).collect();
        interim
            .candidates
            .iter()
            .filter(|c| c.found == 0 && c.resolved >= self.prune_after)
            .filter(|c| queued.contains(c.value.as_str()))
            .map(|c| c.value.clone())
            .collect()
    }

    pub fn plan_now(&self, interim: &InterimState) -> Plan {
        let pruned_candidates = self.prunable(interim);
        let order: Vec<TaskId> = {
            let pruned: BTreeSet<&str> = pruned_candidates.iter().map(String::as_str).collect();
            let keep: BTreeSet<TaskId> = interim
                .pending
                .iter()
                .filter(|t| !pruned.contains(t.candidate.as_str()))
                .map(|t| t.id)
                .collect();
            self.order(interim).into_iter().filter(|id| keep.contains(id)).collect()
        };

        Plan {
            reordered_queue: (!order.is_empty()).then_some(order),
            pruned_candidates,
            narrative: None,
        }
    }

    /// Template narrative built from the report alone.
    pub fn narrative(&self, seed: &IdentitySeed, report: &InvestigationReport) -> String {
        let mut out = String::new();
        let who = match &seed.location {
            Some(loc) => format!("{} ({loc})", seed.name.trim()),
            None => seed.name.trim().to_string(),
        };
        let cov = &report.coverage;

        if report.findings.is_empty() {
            out.push_str(&format!(
                "No accounts were found for {who} in {} mode. {} of {} platforms gave a definite answer.",
                report.mode, cov.platforms_resolved, cov.platforms_probed
            ));
        } else {
            let platforms = report.platforms_found();
            out.push_str(&format!(
                "{who}: {} account(s) found on {} platform(s) in {} mode.",
                report.findings.len(),
                platforms.len(),
                report.mode
            ));
            let top = &report.findings[0];
            out.push_str(&format!(
                " Strongest match is '{}' on {} ({:.0}%).",
                top.identifier,
                top.platform_name,
                top.confidence * 100.0
            ));
            let corroborated = report
                .findings
                .iter()
                .filter(|f| !f.corroborated_by.is_empty())
                .count();
            if corroborated > 0 {
                out.push_str(&format!(" {corroborated} finding(s) are corroborated by another platform."));
            }
            out.push_str(&format!(
                " {} of {} platforms gave a definite answer.",
                cov.platforms_resolved, cov.platforms_probed
            ));
        }

        if !report.discovered_contacts.is_empty() {
            out.push_str(&format!(
                " {} contact detail(s) were seen on profile pages.",
                report.discovered_contacts.len()
            ));
        }
        if cov.tasks_inconclusive > 0 {
            out.push_str(&format!(
                " {} probe(s) gave no definite answer.",
                cov.tasks_inconclusive
            ));
        }
        out.push_str(&format!(" Overall confidence {}%.", report.confidence_percent()));
        out
    }
}

impl PlanningStrategy for StaticHeuristicStrategy {
    fn name(&self) -> &'static str {
        "static"
    }

    fn plan<'a>(&'a self, _seed: &'a IdentitySeed, interim: &'a InterimState) -> BoxFuture<'a, Plan> {
        Box::pin(async move { self.plan_now(interim) })
    }

    fn narrate<'a>(&'a self, seed: &'a IdentitySeed, report: &'a InvestigationReport) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move { Some(self.narrative(seed, report)) })
    }
}

// ---------------------------------------------------------------------------
// External reasoning
// ---------------------------------------------------------------------------

const PLAN_SYSTEM_PROMPT: &str = "You help plan an open-source intelligence search for public \
social-media accounts. You receive the person's name, the probes completed so far and the \
platforms still queued. Reply with one JSON object only, with optional fields \
\"reordered_platforms\" (platform ids, most promising first) and \"pruned_candidates\" \
(usernames or emails not worth probing further). Do not include any other text.";

const NARRATE_SYSTEM_PROMPT: &str = "You write short, factual summaries of open-source \
intelligence search results. Describe what was found, how strong the evidence is and what \
could not be checked. Never speculate beyond the data. Reply with one JSON object only: \
{\"narrative\": \"...\"}.";

/// Planner backed by the reasoning collaborator.
pub struct ExternalReasoningStrategy {
    client: Arc<dyn ReasoningClient>,
    fallback: StaticHeuristicStrategy,
    timeout: Duration,
    degraded: AtomicBool,
}

impl std::fmt::Debug for ExternalReasoningStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalReasoningStrategy")
            .field("timeout", &self.timeout)
            .field("degraded", &self.degraded.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ExternalReasoningStrategy {
    pub fn new(client: Arc<dyn ReasoningClient>, timeout: Duration) -> Self {
        Self {
            client,
            fallback: StaticHeuristicStrategy::default(),
            timeout,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn with_fallback(mut self, fallback: StaticHeuristicStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Whether a call has failed at least once.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    async fn ask(&self, system: &str, prompt: &str) -> Result<ReasoningResponse> {
        let raw = tokio::time::timeout(self.timeout, self.client.complete(system, prompt))
            .await
            .map_err(|_| {
                DossierError::unavailable(
                    "reasoning",
                    format!("no answer within {}ms", self.timeout.as_millis()),
                )
            })??;
        parse_response(&raw)
    }

    fn degrade(&self, stage: &str, err: &DossierError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(stage, error = %err, "reasoning unavailable, using static planner");
        } else {
            debug!(stage, error = %err, "reasoning failed again");
        }
    }

    /// Turn a model answer into a plan against the current queue.
    fn apply(&self, interim: &InterimState, response: ReasoningResponse) -> Plan {
        let base = self.fallback.order(interim);

        let reordered_queue = match response.reordered_platforms {
            Some(platforms) if !platforms.is_empty() => {
                let rank: BTreeMap<&str, usize> = platforms
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (p.as_str(), i))
                    .rev()
                    .collect();
                let platform_of: BTreeMap<TaskId, &str> = interim
                    .pending
                    .iter()
                    .map(|t| (t.id, t.platform_id.as_str()))
                    .collect();
                let mut ids = base;
                // stable: unlisted platforms keep the static order after listed ones
                ids.sort_by_key(|id| {
                    platform_of
                        .get(id)
                        .and_then(|p| rank.get(p))
                        .copied()
                        .unwrap_or(usize::MAX)
                });
                Some(ids)
            }
            _ => (!base.is_empty()).then_some(base),
        };

        // only values that are actually queued
        let queued: BTreeSet<&str> = interim.pending.iter().map(|t| t.candidate.as_str()).collect();
        let pruned_candidates = response
            .pruned_candidates
            .unwrap_or_default()
            .into_iter()
            .filter(|c| queued.contains(c.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Plan {
            reordered_queue,
            pruned_candidates,
            narrative: response.narrative,
        }
    }
}

fn plan_prompt(seed: &IdentitySeed, interim: &InterimState) -> String {
    let queued_platforms: BTreeSet<&str> = interim.pending.iter().map(|t| t.platform_id.as_str()).collect();
    let queued_candidates: BTreeSet<&str> = interim.pending.iter().map(|t| t.candidate.as_str()).collect();
    serde_json::json!({
        "seed": seed,
        "mode": interim.mode,
        "progress": { "completed": interim.completed, "total": interim.total },
        "findings": interim.findings,
        "candidates": interim.candidates,
        "class_hit_rates": interim.class_hit_rates,
        "queued_platforms": queued_platforms,
        "queued_candidates": queued_candidates,
    })
    .to_string()
}

fn narrate_prompt(seed: &IdentitySeed, report: &InvestigationReport) -> String {
    let findings: Vec<serde_json::Value> = report
        .findings
        .iter()
        .map(|f| {
            serde_json::json!({
                "platform": f.platform_name,
                "identifier": f.identifier,
                "confidence": f.confidence,
                "profile_url": f.profile_url,
                "corroborated_by": f.corroborated_by,
            })
        })
        .collect();
    let phone_patterns: Vec<&str> = report.phone_patterns.iter().map(|p| p.pattern.as_str()).collect();
    serde_json::json!({
        "seed": seed,
        "mode": report.mode,
        "findings": findings,
        "discovered_contacts": report.discovered_contacts,
        "phone_patterns": phone_patterns,
        "coverage": report.coverage,
        "overall_confidence": report.overall_confidence,
        "notes": report.notes,
    })
    .to_string()
}

impl PlanningStrategy for ExternalReasoningStrategy {
    fn name(&self) -> &'static str {
        "reasoning"
    }

    fn plan<'a>(&'a self, seed: &'a IdentitySeed, interim: &'a InterimState) -> BoxFuture<'a, Plan> {
        Box::pin(async move {
            let prompt = plan_prompt(seed, interim);
            match self.ask(PLAN_SYSTEM_PROMPT, &prompt).await {
                Ok(response) => self.apply(interim, response),
                Err(e) => {
                    self.degrade("plan", &e);
                    self.fallback.plan_now(interim)
                }
            }
        })
    }

    fn narrate<'a>(&'a self, seed: &'a IdentitySeed, report: &'a InvestigationReport) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let prompt = narrate_prompt(seed, report);
            match self.ask(NARRATE_SYSTEM_PROMPT, &prompt).await {
                Ok(ReasoningResponse {
                    narrative: Some(text),
                    ..
                }) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Ok(_) => {
                    self.degrade(
                        "narrate",
                        &DossierError::unavailable("reasoning", "answer had no narrative"),
                    );
                    Some(self.fallback.narrative(seed, report))
                }
                Err(e) => {
                    self.degrade("narrate", &e);
                    Some(self.fallback.narrative(seed, report))
                }
            }
        })
    }
}

/// Time box for one checkpoint plan or the closing narrative.
pub fn plan_time_box(config: &AppConfig) -> Duration {
    Duration::from_secs(config.reasoning.timeout_secs.max(1))
}

/// Budget for the collaborator call inside a time box. The remainder is left
/// for the static fallback to answer before the box closes.
pub fn collaborator_budget(time_box: Duration) -> Duration {
    time_box.mul_f64(COLLABORATOR_SHARE)
}

const COLLABORATOR_SHARE: f64 = 0.8;

/// Pick the strategy for a run. Returns a report note when the reasoning
/// collaborator was wanted but cannot be used.
pub fn strategy_from_config(config: &AppConfig) -> (Arc<dyn PlanningStrategy>, Option<String>) {
    if !config.reasoning.enabled {
        return (Arc::new(StaticHeuristicStrategy::default()), None);
    }
    match ChatCompletionsClient::from_config(config) {
        Ok(client) => {
            info!(model = %config.reasoning.model, "reasoning planner enabled");
            let strategy = ExternalReasoningStrategy::new(
                Arc::new(client),
                collaborator_budget(plan_time_box(config)),
            );
            (Arc::new(strategy), None)
        }
        Err(e) => {
            info!(error = %e, "reasoning planner unavailable, using static planner");
            (
                Arc::new(StaticHeuristicStrategy::default()),
                Some(format!("static planner used: {e}")),
            )
        }
    }
}
