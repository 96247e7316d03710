//! End-to-end investigation: seed → candidates → probes → aggregation → report.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};

use dossier_candidates::{CandidateSet, GenerateOptions};
use dossier_prober::{
    Budget, CancelToken, DispatchHandle, Dispatcher, Enumeration, ExternalEnumerator,
    OutcomeStream, ProbeOutcome, ProbeTask, RateLimiters, TaskId, Website, WebsiteSweep,
};
use dossier_registry::Registry;
use dossier_shared::{
    AppConfig, Candidate, CandidateKind, DossierError, IdentitySeed, Mode, ProbeConfig, Result,
    RunId,
};

use crate::aggregator::Aggregator;
use crate::planner::{Plan, PlanningStrategy, StaticHeuristicStrategy, plan_time_box, strategy_from_config};
use crate::report::InvestigationReport;
use crate::scoring::SharedEvidence;

/// Per-run overrides, typically from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct InvestigateOptions {
    /// Replaces the mode's global deadline.
    pub deadline: Option<Duration>,
    /// Replaces the mode's worker count.
    pub concurrency: Option<usize>,
    /// `Some(false)` disables checkpoint planning for this run.
    pub planner: Option<bool>,
}

/// Progress callback for reporting investigation status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once probing starts.
    fn probes_started(&self, total: usize);
    /// Called for every registry outcome.
    fn outcome(&self, outcome: &ProbeOutcome, completed: usize, total: usize);
    /// Called when the report is ready.
    fn done(&self, report: &InvestigationReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn probes_started(&self, _total: usize) {}
    fn outcome(&self, _outcome: &ProbeOutcome, _completed: usize, _total: usize) {}
    fn done(&self, _report: &InvestigationReport) {}
}

/// Runs investigations against one configuration snapshot.
pub struct Investigator {
    config: AppConfig,
    registry: Arc<Registry>,
    strategy: Arc<dyn PlanningStrategy>,
    strategy_note: Option<String>,
    enumerator: Option<ExternalEnumerator>,
    plan_timeout: Duration,
    allow_private_targets: bool,
    cancel: CancelToken,
}

impl Investigator {
    /// Load the platform catalog and pick a planning strategy from `config`.
    pub fn new(config: AppConfig) -> Result<Self> {
        let registry = Registry::load(&config.platforms)?;
        let (strategy, strategy_note) = strategy_from_config(&config);
        let enumerator = config
            .enumerator
            .enabled
            .then(|| ExternalEnumerator::new(&config.enumerator));
        let plan_timeout = plan_time_box(&config);

        Ok(Self {
            config,
            registry: Arc::new(registry),
            strategy,
            strategy_note,
            enumerator,
            plan_timeout,
            allow_private_targets: false,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn PlanningStrategy>) -> Self {
        self.strategy = strategy;
        self.strategy_note = None;
        self
    }

    pub fn with_enumerator(mut self, enumerator: ExternalEnumerator) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    pub fn without_enumerator(mut self) -> Self {
        self.enumerator = None;
        self
    }

    /// Time box for each checkpoint plan and for the narrative.
    pub fn with_plan_timeout(mut self, plan_timeout: Duration) -> Self {
        self.plan_timeout = plan_timeout;
        self
    }

    /// Permit loopback and private-network probe targets.
    pub fn allow_private_targets(mut self) -> Self {
        self.allow_private_targets = true;
        self
    }

    /// Token that cancels runs of this investigator. Once cancelled it stays
    /// cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one investigation.
    ///
    /// 1. Generate candidates (a blank name ends here with an empty report)
    /// 2. Build probe tasks for the mode's platforms
    /// 3. Dispatch, with planner checkpoints and (advanced) enumeration and
    ///    website checks alongside
    /// 4. Finalize and narrate
    #[instrument(skip_all, fields(name = %seed.name, mode = %mode))]
    pub async fn run(
        &self,
        seed: IdentitySeed,
        mode: Mode,
        opts: &InvestigateOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<InvestigationReport> {
        let run_id = RunId::new();
        info!(%run_id, "starting investigation");

        // --- Phase 1: Candidates ---
        progress.phase("Generating candidates");
        let candidates = dossier_candidates::generate(
            &seed,
            &GenerateOptions {
                mode,
                email_cap: self.config.defaults.email_cap,
            },
        );
        let mut aggregator = Aggregator::new(run_id, seed.clone(), mode, &candidates);

        if candidates.is_empty() {
            let err = DossierError::input("name has no usable characters");
            warn!(error = %err, "nothing to investigate");
            aggregator.note(format!("{err}; no probes were sent"));
            let report = aggregator.finalize(&SharedEvidence);
            progress.done(&report);
            return Ok(report);
        }

        if self.registry.is_empty() {
            return Err(DossierError::Invariant(
                "platform registry is empty; nothing can be probed".into(),
            ));
        }
        for skipped in self.registry.skipped() {
            aggregator.note(format!(
                "catalog entry {} ({}) skipped: {}",
                skipped.index,
                skipped.id.as_deref().unwrap_or("unnamed"),
                skipped.reason
            ));
        }
        if let Some(note) = &self.strategy_note {
            aggregator.note(note.clone());
        }

        // --- Phase 2: Tasks ---
        let mut probe = ProbeConfig::resolve(&self.config, mode);
        if let Some(deadline) = opts.deadline {
            probe.global_deadline = deadline;
        }
        if let Some(concurrency) = opts.concurrency {
            probe.concurrency = concurrency.max(1);
        }
        let tasks = build_tasks(&candidates, &self.registry, mode, probe.username_limit);
        let total = tasks.len();
        if total == 0 {
            aggregator.note(format!("no {mode} platforms accept the generated candidates"));
        }
        info!(
            candidates = candidates.len(),
            tasks = total,
            concurrency = probe.concurrency,
            deadline_secs = probe.global_deadline.as_secs(),
            "probe plan ready"
        );

        // --- Phase 3: Probe ---
        progress.phase("Probing platforms");
        progress.probes_started(total);

        let mut dispatcher = Dispatcher::new(
            &probe,
            RateLimiters::new(self.config.rate_limits.clone()),
            Arc::clone(&self.registry),
        )?;
        if self.allow_private_targets {
            dispatcher = dispatcher.allow_private_targets();
        }
        let budget = Budget::from(&probe);
        let hard_deadline = Instant::now() + budget.global_deadline + budget.grace;
        let (stream, handle) = dispatcher.run(tasks, budget, self.cancel.clone());

        let planning = opts.planner.unwrap_or(self.config.defaults.planner);
        let usernames: Vec<Arc<Candidate>> = candidates.usernames().cloned().map(Arc::new).collect();
        let domains = if probe.website_sweep {
            dossier_candidates::website_domains(&seed, &candidates)
        } else {
            Vec::new()
        };

        let probing = self.drive(&seed, stream, &handle, &mut aggregator, total, planning, progress);
        let enumerating = self.enumerate(mode, &usernames, total as TaskId, hard_deadline);
        let sweeping = self.sweep_websites(&probe, &domains, hard_deadline);
        let ((), enumeration, websites) = tokio::join!(probing, enumerating, sweeping);

        if self.cancel.is_cancelled() {
            info!(run_id = %aggregator.run_id(), "investigation cancelled");
            return Err(DossierError::Cancelled);
        }

        if let Some(enumeration) = enumeration {
            if let Some(note) = enumeration.note {
                aggregator.note(note);
            }
            for outcome in enumeration.outcomes {
                aggregator.ingest(outcome);
            }
        }
        match websites {
            Ok(websites) => aggregator.websites(websites),
            Err(note) => aggregator.note(note),
        }

        let stats = handle.stats();
        debug!(?stats, "dispatch finished");

        // --- Phase 4: Report ---
        progress.phase("Scoring findings");
        let mut report = aggregator.finalize(&SharedEvidence);
        report.narrative = self.narrate(&seed, &report, planning, hard_deadline).await;

        info!(
            findings = report.findings.len(),
            overall = report.overall_confidence,
            elapsed_ms = report.elapsed_ms,
            "investigation complete"
        );
        progress.done(&report);
        Ok(report)
    }

    /// Consume the outcome stream, running planner checkpoints as
    /// completion crosses the configured fractions.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        seed: &IdentitySeed,
        mut stream: OutcomeStream,
        handle: &DispatchHandle,
        aggregator: &mut Aggregator,
        total: usize,
        planning: bool,
        progress: &dyn ProgressReporter,
    ) {
        let mut checkpoints: Vec<f64> = if planning {
            self.config
                .defaults
                .checkpoints
                .iter()
                .copied()
                .filter(|f| *f > 0.0 && *f < 1.0)
                .collect()
        } else {
            Vec::new()
        };
        checkpoints.sort_by(f64::total_cmp);
        let mut next_checkpoint = 0;

        while let Some(outcome) = stream.next().await {
            let completed = total - stream.remaining();
            progress.outcome(&outcome, completed, total);
            aggregator.ingest(outcome);

            let mut crossed = false;
            while next_checkpoint < checkpoints.len()
                && completed as f64 >= checkpoints[next_checkpoint] * total as f64
            {
                next_checkpoint += 1;
                crossed = true;
            }
            if crossed && stream.remaining() > 0 && !self.cancel.is_cancelled() {
                self.checkpoint(seed, handle, aggregator, total).await;
            }
        }
    }

    /// Pause dispatch, ask for a time-boxed plan, apply it, resume.
    async fn checkpoint(&self, seed: &IdentitySeed, handle: &DispatchHandle, aggregator: &mut Aggregator, total: usize) {
        handle.pause();
        let pending = handle.pending().await;
        if !pending.is_empty() {
            let interim = aggregator.interim(&pending, total);
            info!(
                strategy = self.strategy.name(),
                completed = interim.completed,
                pending = pending.len(),
                findings = interim.findings.len(),
                "planner checkpoint"
            );
            match timeout(self.plan_timeout, self.strategy.plan(seed, &interim)).await {
                Ok(plan) => {
                    if let Some(narrative) = &plan.narrative {
                        aggregator.note(format!(
                            "planner at {}/{total}: {narrative}",
                            interim.completed
                        ));
                    }
                    apply_plan(handle, plan).await
                }
                Err(_) => warn!(
                    timeout_ms = self.plan_timeout.as_millis() as u64,
                    "plan arrived late, discarded"
                ),
            }
        }
        handle.resume();
    }

    /// Run the enumeration collaborator (advanced mode only), bounded by the
    /// probe deadline and by cancellation.
    async fn enumerate(
        &self,
        mode: Mode,
        usernames: &[Arc<Candidate>],
        first_id: TaskId,
        hard_deadline: Instant,
    ) -> Option<Enumeration> {
        if mode != Mode::Advanced || usernames.is_empty() {
            return None;
        }
        let enumerator = self.enumerator.as_ref()?;

        tokio::select! {
            result = timeout_at(hard_deadline, enumerator.run(usernames, &self.registry, first_id)) => {
                match result {
                    Ok(enumeration) => Some(enumeration),
                    Err(_) => {
                        warn!("username enumeration cut short by the deadline");
                        Some(Enumeration {
                            outcomes: Vec::new(),
                            note: Some("username enumeration did not finish before the deadline".into()),
                        })
                    }
                }
            }
            _ = self.cancel.cancelled() => None,
        }
    }

    /// Check guessed personal-website domains, bounded by the probe deadline
    /// and by cancellation. `Err` carries a report note.
    async fn sweep_websites(
        &self,
        probe: &ProbeConfig,
        domains: &[String],
        hard_deadline: Instant,
    ) -> std::result::Result<Vec<Website>, String> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }
        let mut sweep = WebsiteSweep::new(probe).map_err(|e| format!("website checks skipped: {e}"))?;
        if self.allow_private_targets {
            sweep = sweep.allow_private_targets();
        }

        tokio::select! {
            result = timeout_at(hard_deadline, sweep.sweep(domains)) => result.map_err(|_| {
                warn!("website checks cut short by the deadline");
                "website checks did not finish before the deadline".to_string()
            }),
            _ = self.cancel.cancelled() => Ok(Vec::new()),
        }
    }

    /// Closing summary. The strategy only gets whatever is left of the
    /// deadline plus grace, capped by the plan time box.
    async fn narrate(
        &self,
        seed: &IdentitySeed,
        report: &InvestigationReport,
        planning: bool,
        hard_deadline: Instant,
    ) -> Option<String> {
        let fallback = StaticHeuristicStrategy::default();
        if !planning {
            return Some(fallback.narrative(seed, report));
        }
        let time_box = self
            .plan_timeout
            .min(hard_deadline.saturating_duration_since(Instant::now()));
        if time_box.is_zero() {
            debug!("no time left for narration, using template");
            return Some(fallback.narrative(seed, report));
        }
        match timeout(time_box, self.strategy.narrate(seed, report)).await {
            Ok(narrative) => narrative,
            Err(_) => {
                warn!("narrative timed out, using template");
                Some(fallback.narrative(seed, report))
            }
        }
    }
}

async fn apply_plan(handle: &DispatchHandle, plan: Plan) {
    if !plan.pruned_candidates.is_empty() {
        let pruned = handle
            .prune(|task| plan.pruned_candidates.iter().any(|c| c == task.candidate.value()))
            .await;
        debug!(candidates = ?plan.pruned_candidates, tasks = pruned, "plan pruned candidates");
    }
    if let Some(order) = &plan.reordered_queue {
        let moved = handle.reorder(order).await;
        debug!(moved, "plan reordered queue");
    }
}

/// One task per `(candidate, platform)` pairing the mode allows. Usernames
/// are limited to the first `username_limit` in generation order; phone
/// patterns are never probed.
fn build_tasks(candidates: &CandidateSet, registry: &Registry, mode: Mode, username_limit: usize) -> Vec<ProbeTask> {
    let mut tasks = Vec::new();
    let mut next_id: TaskId = 0;

    for kind in [CandidateKind::Username, CandidateKind::Email] {
        let platforms = registry.targets_for(kind, mode);
        if platforms.is_empty() {
            continue;
        }
        let limit = match kind {
            CandidateKind::Username => username_limit,
            _ => usize::MAX,
        };
        for candidate in candidates.of_kind(kind).take(limit) {
            let candidate = Arc::new(candidate.clone());
            for platform in &platforms {
                tasks.push(ProbeTask::new(next_id, Arc::clone(&candidate), Arc::clone(platform)));
                next_id += 1;
            }
        }
    }
    tasks
}

/// Investigate `name` with the given configuration.
pub async fn investigate(
    name: &str,
    location: Option<&str>,
    mode: Mode,
    config: &AppConfig,
) -> Result<InvestigationReport> {
    let investigator = Investigator::new(config.clone())?;
    let seed = IdentitySeed::new(name, location.map(str::to_string));
    investigator
        .run(seed, mode, &InvestigateOptions::default(), &SilentProgress)
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dossier_registry::{ExistencePredicate, HttpMethod, PlatformSpec, Tier};
    use dossier_shared::BoxFuture;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::planner::InterimState;

    fn spec(id: &str, base: &str, class: &str, tier: Tier, basic: bool) -> PlatformSpec {
        PlatformSpec {
            id: id.into(),
            name: id.to_uppercase(),
            url_template: format!("{base}/{id}/{{}}"),
            profile_template: None,
            method: HttpMethod::Get,
            accepts: vec![CandidateKind::Username],
            predicate: ExistencePredicate::Status {
                found: vec![200],
                not_found: vec![404],
            },
            rate_class: class.into(),
            timeout_ms: 2_000,
            tier,
            basic,
            aliases: Vec::new(),
            activity_template: None,
        }
    }

    /// Three basic platforms and one advanced-only platform on a mock server.
    async fn mock_catalog() -> (MockServer, Registry) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/johnsmith"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>John Smith</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/shorts/johnsmith"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>johnsmith</html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/code/.*"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = server.uri();
        let registry = Registry::from_specs([
            spec("photos", &base, "photos", Tier::Flagship, true),
            spec("shorts", &base, "shorts", Tier::Flagship, true),
            spec("jobs", &base, "jobs", Tier::Major, true),
            spec("code", &base, "code", Tier::Major, false),
        ]);
        assert!(registry.skipped().is_empty());
        (server, registry)
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.reasoning.enabled = false;
        config.enumerator.enabled = false;
        config.probe.basic_deadline_secs = 10;
        config
    }

    fn investigator(registry: Registry) -> Investigator {
        Investigator::new(config())
            .unwrap()
            .with_registry(registry)
            .allow_private_targets()
    }

    #[tokio::test]
    async fn john_smith_basic_probes_basic_platforms_only() {
        let (_server, registry) = mock_catalog().await;
        let basic_count = registry.for_mode(Mode::Basic).len();
        let report = investigator(registry)
            .run(
                IdentitySeed::new("John Smith", None),
                Mode::Basic,
                &InvestigateOptions::default(),
                &SilentProgress,
            )
            .await
            .unwrap();

        assert_eq!(report.coverage.platforms_probed, basic_count);
        assert_eq!(report.coverage.platforms_resolved, basic_count);
        assert!(report.username_candidates.len() >= 5);
        assert!(!report.email_candidates.is_empty());

        let found: Vec<(&str, &str)> = report
            .findings
            .iter()
            .map(|f| (f.platform_id.as_str(), f.identifier.as_str()))
            .collect();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&("photos", "johnsmith")));
        assert!(found.contains(&("shorts", "johnsmith")));
        // same exact-name identifier on both
        assert!(report.findings.iter().all(|f| f.corroborated_by.len() == 1));
        assert!(report.overall_confidence > 0.0);
        assert!(report.narrative.as_deref().unwrap().contains("2 account(s)"));
        assert!(report.websites.is_empty());
    }

    #[tokio::test]
    async fn blank_name_yields_empty_report_without_probes() {
        let (server, registry) = mock_catalog().await;
        let report = investigator(registry)
            .run(IdentitySeed::new("   ", None), Mode::Basic, &InvestigateOptions::default(), &SilentProgress)
            .await
            .unwrap();

        assert!(report.findings.is_empty());
        assert_eq!(report.overall_confidence, 0.0);
        assert_eq!(report.coverage.tasks_dispatched, 0);
        assert!(report.notes.iter().any(|n| n.contains("no probes")));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn empty_registry_is_an_invariant_violation() {
        let err = investigator(Registry::from_specs(Vec::new()))
            .run(IdentitySeed::new("John Smith", None), Mode::Basic, &InvestigateOptions::default(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DossierError::Invariant(_)));
        assert!(err.is_run_level());
    }

    #[tokio::test]
    async fn cancelled_run_returns_cancelled() {
        let (_server, registry) = mock_catalog().await;
        let investigator = investigator(registry);
        investigator.cancel_token().cancel();
        let err = investigator
            .run(IdentitySeed::new("John Smith", None), Mode::Basic, &InvestigateOptions::default(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DossierError::Cancelled));
    }

    #[tokio::test]
    async fn planning_disabled_still_narrates() {
        let (_server, registry) = mock_catalog().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let report = investigator(registry)
            .with_strategy(Arc::new(Recording {
                calls: Arc::clone(&calls),
                prune: Vec::new(),
                delay: Duration::ZERO,
                remark: None,
            }))
            .run(
                IdentitySeed::new("John Smith", None),
                Mode::Basic,
                &InvestigateOptions {
                    planner: Some(false),
                    ..InvestigateOptions::default()
                },
                &SilentProgress,
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report.narrative.is_some());
    }

    struct Recording {
        calls: Arc<AtomicUsize>,
        prune: Vec<String>,
        delay: Duration,
        remark: Option<&'static str>,
    }

    impl PlanningStrategy for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn plan<'a>(&'a self, _seed: &'a IdentitySeed, _interim: &'a InterimState) -> BoxFuture<'a, Plan> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                Plan {
                    reordered_queue: None,
                    pruned_candidates: self.prune.clone(),
                    narrative: self.remark.map(str::to_string),
                }
            })
        }

        fn narrate<'a>(&'a self, _seed: &'a IdentitySeed, _report: &'a InvestigationReport) -> BoxFuture<'a, Option<String>> {
            Box::pin(async move { Some("recorded".to_string()) })
        }
    }

    struct Counting {
        outcomes: AtomicUsize,
        phases: Mutex<Vec<String>>,
    }

    impl ProgressReporter for Counting {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn probes_started(&self, _total: usize) {}
        fn outcome(&self, _outcome: &ProbeOutcome, _completed: usize, _total: usize) {
            self.outcomes.fetch_add(1, Ordering::SeqCst);
        }
        fn done(&self, _report: &InvestigationReport) {}
    }

    #[tokio::test]
    async fn checkpoint_prunes_queued_candidates() {
        let (_server, registry) = mock_catalog().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let progress = Counting {
            outcomes: AtomicUsize::new(0),
            phases: Mutex::new(Vec::new()),
        };
        let report = investigator(registry)
            .with_strategy(Arc::new(Recording {
                calls: Arc::clone(&calls),
                prune: vec!["john_smith".into()],
                delay: Duration::ZERO,
                remark: Some("john_smith looks unlikely"),
            }))
            .run(
                IdentitySeed::new("John Smith", None),
                Mode::Basic,
                &InvestigateOptions {
                    concurrency: Some(1),
                    ..InvestigateOptions::default()
                },
                &progress,
            )
            .await
            .unwrap();

        // one checkpoint at 25%
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // five basic usernames on three platforms, every task accounted for
        assert_eq!(report.coverage.tasks_dispatched, 15);
        assert_eq!(progress.outcomes.load(Ordering::SeqCst), 15);
        // john_smith is generated last, so all three of its tasks were still queued
        assert_eq!(report.coverage.tasks_inconclusive, 3);
        assert_eq!(report.narrative.as_deref(), Some("recorded"));
        assert!(
            report
                .notes
                .iter()
                .any(|n| n.starts_with("planner at ") && n.ends_with("john_smith looks unlikely")),
            "{:?}",
            report.notes
        );
        assert_eq!(
            progress.phases.lock().unwrap().first().map(String::as_str),
            Some("Generating candidates")
        );
    }

    #[tokio::test]
    async fn late_plan_is_discarded_and_dispatch_resumes() {
        let (_server, registry) = mock_catalog().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let report = investigator(registry)
            .with_strategy(Arc::new(Recording {
                calls: Arc::clone(&calls),
                prune: vec!["john_smith".into(), "jsmith".into()],
                delay: Duration::from_secs(5),
                remark: Some("too late"),
            }))
            .with_plan_timeout(Duration::from_millis(200))
            .run(
                IdentitySeed::new("John Smith", None),
                Mode::Basic,
                &InvestigateOptions {
                    concurrency: Some(1),
                    ..InvestigateOptions::default()
                },
                &SilentProgress,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.coverage.tasks_dispatched, 15);
        // nothing pruned
        assert_eq!(report.coverage.tasks_inconclusive, 0);
        assert!(report.notes.iter().all(|n| !n.contains("too late")));
        assert_eq!(report.coverage.platforms_resolved, 3);
    }

    #[test]
    fn tasks_respect_username_limit_and_mode() {
        let registry = Registry::builtin().unwrap();
        let seed = IdentitySeed::new("John Smith", Some("Austin".into()));

        let basic = dossier_candidates::generate(&seed, &GenerateOptions::default());
        let tasks = build_tasks(&basic, &registry, Mode::Basic, 3);
        let basic_platforms = registry.targets_for(CandidateKind::Username, Mode::Basic).len();
        assert_eq!(tasks.len(), 3 * basic_platforms);
        assert!(tasks.iter().all(|t| t.platform.basic));
        assert!(tasks.iter().all(|t| t.candidate.kind() != CandidateKind::PhonePattern));

        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, (0..tasks.len() as TaskId).collect::<Vec<_>>());

        let advanced = dossier_candidates::generate(
            &seed,
            &GenerateOptions {
                mode: Mode::Advanced,
                email_cap: 4,
            },
        );
        let tasks = build_tasks(&advanced, &registry, Mode::Advanced, 2);
        let email_platforms = registry.targets_for(CandidateKind::Email, Mode::Advanced).len();
        let user_platforms = registry.targets_for(CandidateKind::Username, Mode::Advanced).len();
        assert_eq!(tasks.len(), 2 * user_platforms + 4 * email_platforms);
    }

    #[tokio::test]
    async fn unreachable_platforms_stay_inconclusive_within_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;
        let registry = Registry::from_specs([
            spec("slow_a", &server.uri(), "a", Tier::Major, true),
            spec("slow_b", &server.uri(), "b", Tier::Major, true),
        ]);

        let started = std::time::Instant::now();
        let report = investigator(registry)
            .run(
                IdentitySeed::new("John Smith", None),
                Mode::Basic,
                &InvestigateOptions {
                    deadline: Some(Duration::from_secs(1)),
                    ..InvestigateOptions::default()
                },
                &SilentProgress,
            )
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(report.findings.is_empty());
        assert_eq!(report.overall_confidence, 0.0);
        assert_eq!(report.coverage.tasks_inconclusive, report.coverage.tasks_dispatched);
        assert_eq!(report.coverage.platforms_resolved, 0);
    }

    struct SlowNarrator;

    impl PlanningStrategy for SlowNarrator {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn plan<'a>(&'a self, _seed: &'a IdentitySeed, interim: &'a InterimState) -> BoxFuture<'a, Plan> {
            Box::pin(async move { StaticHeuristicStrategy::default().plan_now(interim) })
        }

        fn narrate<'a>(&'a self, _seed: &'a IdentitySeed, _report: &'a InvestigationReport) -> BoxFuture<'a, Option<String>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Some("slow".to_string())
            })
        }
    }

    #[tokio::test]
    async fn narration_is_bounded_by_deadline_and_grace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;
        let registry = Registry::from_specs([spec("slow_a", &server.uri(), "a", Tier::Major, true)]);

        let mut config = config();
        config.probe.grace_ms = 500;
        let started = std::time::Instant::now();
        let report = Investigator::new(config)
            .unwrap()
            .with_registry(registry)
            .allow_private_targets()
            .with_strategy(Arc::new(SlowNarrator))
            .with_plan_timeout(Duration::from_secs(10))
            .run(
                IdentitySeed::new("John Smith", None),
                Mode::Basic,
                &InvestigateOptions {
                    deadline: Some(Duration::from_secs(1)),
                    ..InvestigateOptions::default()
                },
                &SilentProgress,
            )
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(2_500), "took {:?}", started.elapsed());
        assert_ne!(report.narrative.as_deref(), Some("slow"));
        assert!(report.narrative.is_some());
    }

    #[tokio::test]
    async fn advanced_run_lists_live_personal_websites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/site/johnsmith.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>John Smith</html>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let registry = Registry::from_specs([spec("photos", &server.uri(), "photos", Tier::Flagship, true)]);

        let mut config = config();
        config.probe.advanced_deadline_secs = 10;
        config.probe.website_template = format!("{}/site/{{}}", server.uri());
        let report = Investigator::new(config)
            .unwrap()
            .with_registry(registry)
            .allow_private_targets()
            .run(
                IdentitySeed::new("John Smith", None),
                Mode::Advanced,
                &InvestigateOptions::default(),
                &SilentProgress,
            )
            .await
            .unwrap();

        assert_eq!(report.websites.len(), 1);
        assert_eq!(report.websites[0].domain, "johnsmith.com");
        assert!(report.websites[0].url.ends_with("/site/johnsmith.com"));
        // websites never count as platform findings
        assert!(report.findings.is_empty());
        assert_eq!(report.overall_confidence, 0.0);
    }
}
