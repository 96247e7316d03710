//! Incremental, order-independent aggregation of probe outcomes.
//!
//! Outcomes are keyed by `(candidate value, platform id)`. Merging a second
//! outcome for the same key keeps the strongest status, unions evidence and
//! keeps the smaller latency, so ingesting the same multiset of outcomes in
//! any order (or with duplicates) finalizes to the same report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dossier_candidates::{CandidateSet, Specificity};
use dossier_prober::{
    Evidence, InconclusiveReason, OutcomeSource, ProbeOutcome, ProbeStatus, ProbeTask, TaskId,
    Website,
};
use dossier_registry::PlatformSpec;
use dossier_shared::{Candidate, CandidateKind, IdentitySeed, Mode, RunId};
use tracing::debug;

use crate::planner::{CandidateProgress, InterimFinding, InterimState, PendingTask};
use crate::report::{
    ContactKind, Coverage, DiscoveredContact, EmailCandidate, Finding, InvestigationReport,
    PhoneHint, UsernameCandidate, fingerprint,
};
use crate::scoring::{self, CorroborationHeuristic, FindingFacts, PHONE_HINT_CONFIDENCE};

/// Merged state for one `(candidate, platform)` pair.
#[derive(Debug, Clone)]
struct Entry {
    candidate: Arc<Candidate>,
    platform: Arc<PlatformSpec>,
    status: ProbeStatus,
    latency_ms: u64,
    evidence: Evidence,
    sources: BTreeSet<OutcomeSource>,
}

impl Entry {
    fn new(outcome: ProbeOutcome) -> Self {
        Self {
            candidate: outcome.task.candidate,
            platform: outcome.task.platform,
            status: outcome.status,
            latency_ms: outcome.latency_ms,
            evidence: outcome.evidence.unwrap_or_default(),
            sources: BTreeSet::from([outcome.source]),
        }
    }

    fn merge(&mut self, outcome: ProbeOutcome) {
        // registry metadata wins over enumerator stand-ins
        if outcome.source == OutcomeSource::Registry && !self.sources.contains(&OutcomeSource::Registry) {
            self.platform = outcome.task.platform;
        }
        self.status = self.status.strongest(outcome.status);
        self.latency_ms = self.latency_ms.min(outcome.latency_ms);
        if let Some(evidence) = &outcome.evidence {
            self.evidence.merge(evidence);
        }
        self.sources.insert(outcome.source);
    }

    fn specificity(&self) -> Specificity {
        dossier_candidates::specificity(&self.candidate)
    }
}

/// Registry task bookkeeping for coverage and rate-class ratios.
#[derive(Debug, Clone)]
struct TaskRecord {
    platform_id: String,
    rate_class: String,
    status: ProbeStatus,
}

/// Accumulates outcomes for one run and produces the final report.
#[derive(Debug)]
pub struct Aggregator {
    run_id: RunId,
    seed: IdentitySeed,
    mode: Mode,
    started: Instant,
    candidates: Vec<Candidate>,
    entries: BTreeMap<(String, String), Entry>,
    tasks: BTreeMap<TaskId, TaskRecord>,
    websites: Vec<Website>,
    notes: Vec<String>,
}

impl Aggregator {
    pub fn new(run_id: RunId, seed: IdentitySeed, mode: Mode, candidates: &CandidateSet) -> Self {
        Self {
            run_id,
            seed,
            mode,
            started: Instant::now(),
            candidates: candidates.iter().cloned().collect(),
            entries: BTreeMap::new(),
            tasks: BTreeMap::new(),
            websites: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Add a note to the report. Identical notes are kept once.
    pub fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    /// Record live personal websites. Does not affect coverage or scores.
    pub fn websites(&mut self, websites: Vec<Website>) {
        for website in websites {
            if !self.websites.iter().any(|w| w.domain == website.domain) {
                self.websites.push(website);
            }
        }
    }

    /// Merge one outcome.
    pub fn ingest(&mut self, outcome: ProbeOutcome) {
        debug!(
            task = outcome.task.id,
            platform = %outcome.task.platform.id,
            candidate = outcome.task.candidate.value(),
            status = %outcome.status.label(),
            "ingest"
        );

        if outcome.source == OutcomeSource::Registry {
            let record = self.tasks.entry(outcome.task.id).or_insert_with(|| TaskRecord {
                platform_id: outcome.task.platform.id.clone(),
                rate_class: outcome.task.platform.rate_class.clone(),
                status: outcome.status,
            });
            record.status = record.status.strongest(outcome.status);
        }

        let key = (
            outcome.task.candidate.value().to_string(),
            outcome.task.platform.id.clone(),
        );
        match self.entries.get_mut(&key) {
            Some(entry) => entry.merge(outcome),
            None => {
                self.entries.insert(key, Entry::new(outcome));
            }
        }
    }

    /// Number of distinct registry tasks seen so far.
    pub fn tasks_seen(&self) -> usize {
        self.tasks.len()
    }

    /// Number of `(candidate, platform)` pairs currently found.
    pub fn found_count(&self) -> usize {
        self.entries.values().filter(|e| e.status.is_found()).count()
    }

    pub fn coverage(&self) -> Coverage {
        let mut probed = BTreeSet::new();
        let mut resolved = BTreeSet::new();
        let mut coverage = Coverage::default();

        for record in self.tasks.values() {
            probed.insert(record.platform_id.as_str());
            if record.status.is_resolved() {
                resolved.insert(record.platform_id.as_str());
            }
            coverage.tasks_dispatched += 1;
            if record.status.is_inconclusive() {
                coverage.tasks_inconclusive += 1;
            }
            if record.status.is_error() {
                coverage.tasks_errored += 1;
            }
        }

        coverage.platforms_probed = probed.len();
        coverage.platforms_resolved = resolved.len();
        coverage
    }

    /// Share of each rate class's registry tasks that came back inconclusive.
    /// Pruned tasks are the planner's choice and count on neither side.
    fn inconclusive_ratios(&self) -> BTreeMap<&str, f64> {
        let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for record in self.tasks.values() {
            if record.status == ProbeStatus::Inconclusive(InconclusiveReason::Pruned) {
                continue;
            }
            let (inconclusive, total) = counts.entry(record.rate_class.as_str()).or_default();
            *total += 1;
            if record.status.is_inconclusive() {
                *inconclusive += 1;
            }
        }
        counts
            .into_iter()
            .map(|(class, (inconclusive, total))| (class, inconclusive as f64 / total as f64))
            .collect()
    }

    /// Snapshot for the planner. `pending` is the dispatcher's queue.
    pub fn interim(&self, pending: &[ProbeTask], total: usize) -> InterimState {
        let findings = self
            .entries
            .values()
            .filter(|e| e.status.is_found())
            .map(|e| InterimFinding {
                platform_id: e.platform.id.clone(),
                identifier: e.candidate.value().to_string(),
                profile_url: e.evidence.profile_url.clone(),
            })
            .collect();

        let mut progress: BTreeMap<&str, CandidateProgress> = BTreeMap::new();
        for entry in self.entries.values() {
            if !entry.sources.contains(&OutcomeSource::Registry) {
                continue;
            }
            let p = progress
                .entry(entry.candidate.value())
                .or_insert_with(|| CandidateProgress {
                    value: entry.candidate.value().to_string(),
                    kind: entry.candidate.kind(),
                    specificity: entry.specificity(),
                    resolved: 0,
                    found: 0,
                });
            if entry.status.is_resolved() {
                p.resolved += 1;
            }
            if entry.status.is_found() {
                p.found += 1;
            }
        }

        let mut class_counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for record in self.tasks.values() {
            if !record.status.is_resolved() {
                continue;
            }
            let (found, resolved) = class_counts.entry(record.rate_class.as_str()).or_default();
            *resolved += 1;
            if record.status.is_found() {
                *found += 1;
            }
        }
        let class_hit_rates = class_counts
            .into_iter()
            .map(|(class, (found, resolved))| (class.to_string(), found as f64 / resolved as f64))
            .collect();

        let pending = pending
            .iter()
            .map(|t| PendingTask {
                id: t.id,
                candidate: t.candidate.value().to_string(),
                kind: t.candidate.kind(),
                specificity: dossier_candidates::specificity(&t.candidate),
                platform_id: t.platform.id.clone(),
                tier: t.platform.tier,
                rate_class: t.platform.rate_class.clone(),
            })
            .collect();

        InterimState {
            mode: self.mode,
            completed: self.tasks.len(),
            total,
            findings,
            candidates: progress.into_values().collect(),
            class_hit_rates,
            pending,
        }
    }

    /// Score, corroborate and assemble the report.
    pub fn finalize(&self, heuristic: &dyn CorroborationHeuristic) -> InvestigationReport {
        let coverage = self.coverage();
        let ratios = self.inconclusive_ratios();

        let found: Vec<&Entry> = self.entries.values().filter(|e| e.status.is_found()).collect();
        let facts: Vec<FindingFacts<'_>> = found
            .iter()
            .map(|e| FindingFacts {
                platform_id: &e.platform.id,
                identifier: e.candidate.value(),
                specificity: e.specificity(),
                evidence: &e.evidence,
            })
            .collect();

        let mut findings: Vec<Finding> = found
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let corroborated_by: Vec<String> = facts
                    .iter()
                    .enumerate()
                    .filter(|(j, other)| *j != i && heuristic.corroborates(&facts[i], other))
                    .map(|(_, other)| other.platform_id.to_string())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();

                let ratio = ratios.get(entry.platform.rate_class.as_str()).copied().unwrap_or(0.0);
                let specificity = facts[i].specificity;
                let confidence = scoring::finding_confidence(
                    entry.platform.tier,
                    specificity,
                    entry.candidate.kind(),
                    corroborated_by.len(),
                    ratio,
                );
                let profile_url = entry
                    .evidence
                    .profile_url
                    .clone()
                    .or_else(|| Some(entry.platform.profile_url(entry.candidate.value())));

                Finding {
                    id: fingerprint(&entry.platform.id, entry.candidate.value()),
                    platform_id: entry.platform.id.clone(),
                    platform_name: entry.platform.name.clone(),
                    tier: entry.platform.tier,
                    identifier: entry.candidate.value().to_string(),
                    kind: entry.candidate.kind(),
                    source_pattern: entry.candidate.source_pattern().to_string(),
                    specificity,
                    confidence,
                    profile_url,
                    corroborated_by,
                    sources: entry.sources.iter().copied().collect(),
                    latency_ms: entry.latency_ms,
                    evidence: entry.evidence.clone(),
                }
            })
            .collect();

        findings.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.id.cmp(&b.id))
        });
        let confidences: Vec<f64> = findings.iter().map(|f| f.confidence).collect();
        let overall_confidence = scoring::overall_confidence(&confidences, &coverage);

        InvestigationReport {
            run_id: self.run_id.clone(),
            seed: self.seed.clone(),
            mode: self.mode,
            generated_at: Utc::now(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            username_candidates: self.username_candidates(&findings),
            email_candidates: self.email_candidates(&findings),
            phone_patterns: self.phone_hints(),
            discovered_contacts: discovered_contacts(&findings),
            websites: self.websites.clone(),
            findings,
            overall_confidence,
            coverage,
            notes: self.notes.clone(),
            narrative: None,
        }
    }

    fn username_candidates(&self, findings: &[Finding]) -> Vec<UsernameCandidate> {
        self.candidates
            .iter()
            .filter(|c| c.kind() == CandidateKind::Username)
            .map(|c| UsernameCandidate {
                value: c.value().to_string(),
                pattern: c.source_pattern().to_string(),
                specificity: dossier_candidates::specificity(c),
                found_on: found_on(findings, c.value()),
            })
            .collect()
    }

    fn email_candidates(&self, findings: &[Finding]) -> Vec<EmailCandidate> {
        self.candidates
            .iter()
            .filter(|c| c.kind() == CandidateKind::Email)
            .map(|c| EmailCandidate {
                address: c.value().to_string(),
                format: dossier_candidates::email_format(c)
                    .unwrap_or(c.source_pattern())
                    .to_string(),
                found_on: found_on(findings, c.value()),
            })
            .collect()
    }

    fn phone_hints(&self) -> Vec<PhoneHint> {
        self.candidates
            .iter()
            .filter(|c| c.kind() == CandidateKind::PhonePattern)
            .map(|c| PhoneHint {
                pattern: c.value().to_string(),
                area_code: dossier_candidates::area_code(c).map(str::to_string),
                region: dossier_candidates::phone_region(c).map(str::to_string),
                confidence: PHONE_HINT_CONFIDENCE,
            })
            .collect()
    }
}

fn found_on(findings: &[Finding], value: &str) -> Vec<String> {
    findings
        .iter()
        .filter(|f| f.identifier == value)
        .map(|f| f.platform_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn discovered_contacts(findings: &[Finding]) -> Vec<DiscoveredContact> {
    let mut seen: BTreeMap<(ContactKind, &str), BTreeSet<&str>> = BTreeMap::new();
    for finding in findings {
        for email in &finding.evidence.emails {
            seen.entry((ContactKind::Email, email.as_str()))
                .or_default()
                .insert(finding.platform_id.as_str());
        }
        for phone in &finding.evidence.phones {
            seen.entry((ContactKind::Phone, phone.as_str()))
                .or_default()
                .insert(finding.platform_id.as_str());
        }
    }
    seen.into_iter()
        .map(|((kind, value), platforms)| DiscoveredContact {
            kind,
            value: value.to_string(),
            seen_on: platforms.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use dossier_candidates::{GenerateOptions, generate};
    use dossier_prober::ErrorKind;
    use dossier_registry::Registry;

    use super::*;
    use crate::scoring::{NoCorroboration, SharedEvidence};

    struct Fixture {
        registry: Registry,
        candidates: CandidateSet,
    }

    impl Fixture {
        fn new() -> Self {
            let seed = IdentitySeed::new("John Smith", Some("Austin".into()));
            Self {
                registry: Registry::builtin().unwrap(),
                candidates: generate(&seed, &GenerateOptions::default()),
            }
        }

        fn aggregator(&self) -> Aggregator {
            Aggregator::new(
                RunId::new(),
                IdentitySeed::new("John Smith", Some("Austin".into())),
                Mode::Basic,
                &self.candidates,
            )
        }

        fn outcome(&self, id: TaskId, value: &str, platform: &str, status: ProbeStatus) -> ProbeOutcome {
            let candidate = self
                .candidates
                .iter()
                .find(|c| c.value() == value)
                .cloned()
                .unwrap_or_else(|| Candidate::new(CandidateKind::Username, value, "enumerator"));
            ProbeOutcome {
                task: ProbeTask::new(
                    id,
                    Arc::new(candidate),
                    Arc::clone(self.registry.get(platform).unwrap()),
                ),
                status,
                latency_ms: 100 + id,
                evidence: status.is_found().then(|| Evidence::with_profile(format!("https://{platform}.example/{value}"))),
                source: OutcomeSource::Registry,
            }
        }
    }

    fn sample(fx: &Fixture) -> Vec<ProbeOutcome> {
        let mut with_email = fx.outcome(4, "jsmith", "allmylinks", ProbeStatus::Found);
        if let Some(e) = with_email.evidence.as_mut() {
            e.emails.insert("john@smith.example".into());
        }
        let mut also_email = fx.outcome(5, "jsmith", "twitter", ProbeStatus::Found);
        if let Some(e) = also_email.evidence.as_mut() {
            e.emails.insert("john@smith.example".into());
        }
        vec![
            fx.outcome(1, "johnsmith", "instagram", ProbeStatus::Found),
            fx.outcome(2, "johnsmith", "tiktok", ProbeStatus::Found),
            fx.outcome(3, "john.smith", "instagram", ProbeStatus::NotFound),
            with_email,
            also_email,
            fx.outcome(6, "smithjohn", "facebook", ProbeStatus::Inconclusive(InconclusiveReason::Blocked)),
            fx.outcome(7, "john_smith", "linkedin", ProbeStatus::Error(ErrorKind::Network)),
        ]
    }

    fn summary(report: &InvestigationReport) -> (Vec<(String, String)>, f64, Coverage, Vec<DiscoveredContact>) {
        let findings = report
            .findings
            .iter()
            .map(|f| (f.id.clone(), format!("{:.12}", f.confidence)))
            .collect();
        (findings, report.overall_confidence, report.coverage, report.discovered_contacts.clone())
    }

    #[test]
    fn order_and_duplicates_do_not_matter() {
        let fx = Fixture::new();
        let outcomes = sample(&fx);

        let mut forward = fx.aggregator();
        for o in outcomes.iter().cloned() {
            forward.ingest(o);
        }

        let mut backward = fx.aggregator();
        for o in outcomes.iter().rev().cloned() {
            backward.ingest(o);
        }
        // and every outcome submitted twice
        for o in outcomes.iter().cloned() {
            backward.ingest(o);
        }

        let a = forward.finalize(&SharedEvidence);
        let b = backward.finalize(&SharedEvidence);
        assert_eq!(summary(&a), summary(&b));
        assert_eq!(a.findings.len(), 4);
        assert_eq!(a.coverage.tasks_dispatched, 7);
    }

    #[test]
    fn found_beats_not_found_for_same_pair() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        agg.ingest(fx.outcome(1, "jsmith", "instagram", ProbeStatus::NotFound));
        let mut again = fx.outcome(9, "jsmith", "instagram", ProbeStatus::Found);
        again.source = OutcomeSource::Enumerator;
        agg.ingest(again);

        let report = agg.finalize(&NoCorroboration);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].sources, vec![OutcomeSource::Registry, OutcomeSource::Enumerator]);
        assert_eq!(report.findings[0].latency_ms, 101);
    }

    #[test]
    fn corroboration_links_findings() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        for o in sample(&fx) {
            agg.ingest(o);
        }
        let report = agg.finalize(&SharedEvidence);

        let by_platform = |id: &str, ident: &str| {
            report
                .findings
                .iter()
                .find(|f| f.platform_id == id && f.identifier == ident)
                .unwrap()
        };
        // exact identifier on two platforms
        assert_eq!(by_platform("instagram", "johnsmith").corroborated_by, vec!["tiktok"]);
        // shared email
        assert_eq!(by_platform("twitter", "jsmith").corroborated_by, vec!["allmylinks"]);

        let uncorroborated = agg.finalize(&NoCorroboration);
        assert!(uncorroborated.overall_confidence < report.overall_confidence);

        assert_eq!(report.discovered_contacts.len(), 1);
        assert_eq!(report.discovered_contacts[0].seen_on, vec!["allmylinks", "twitter"]);
    }

    #[test]
    fn findings_sorted_by_confidence() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        for o in sample(&fx) {
            agg.ingest(o);
        }
        let report = agg.finalize(&SharedEvidence);
        assert!(report.findings.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert!(report.findings.iter().all(|f| (0.01..=0.99).contains(&f.confidence)));
    }

    #[test]
    fn overall_zero_without_findings() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        agg.ingest(fx.outcome(1, "johnsmith", "instagram", ProbeStatus::NotFound));
        agg.ingest(fx.outcome(2, "johnsmith", "tiktok", ProbeStatus::NotFound));
        let report = agg.finalize(&SharedEvidence);
        assert_eq!(report.overall_confidence, 0.0);
        assert_eq!(report.coverage.platforms_resolved, 2);
    }

    #[test]
    fn new_found_on_unresolved_platform_raises_overall() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        agg.ingest(fx.outcome(1, "johnsmith", "instagram", ProbeStatus::Found));
        agg.ingest(fx.outcome(2, "jsmith", "tiktok", ProbeStatus::Inconclusive(InconclusiveReason::Timeout)));
        let before = agg.finalize(&SharedEvidence).overall_confidence;

        agg.ingest(fx.outcome(3, "smithjohn", "linkedin", ProbeStatus::Found));
        let after = agg.finalize(&SharedEvidence).overall_confidence;
        assert!(after > before, "{after} <= {before}");

        // upgrading the inconclusive task itself also raises it
        agg.ingest(fx.outcome(2, "jsmith", "tiktok", ProbeStatus::Found));
        let upgraded = agg.finalize(&SharedEvidence).overall_confidence;
        assert!(upgraded > after);
    }

    #[test]
    fn enumerator_outcomes_add_findings_not_coverage() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        agg.ingest(fx.outcome(1, "johnsmith", "instagram", ProbeStatus::NotFound));
        let mut hit = fx.outcome(100, "johnsmith", "github", ProbeStatus::Found);
        hit.source = OutcomeSource::Enumerator;
        agg.ingest(hit);

        let report = agg.finalize(&SharedEvidence);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.coverage.platforms_probed, 1);
        assert_eq!(report.coverage.tasks_dispatched, 1);
    }

    #[test]
    fn websites_are_listed_without_touching_scores() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        agg.ingest(fx.outcome(1, "johnsmith", "instagram", ProbeStatus::Found));
        let before = agg.finalize(&SharedEvidence);

        let site = Website {
            domain: "johnsmith.com".into(),
            url: "http://johnsmith.com/".into(),
        };
        agg.websites(vec![site.clone(), site.clone()]);
        let after = agg.finalize(&SharedEvidence);

        assert_eq!(after.websites, vec![site]);
        assert_eq!(after.overall_confidence, before.overall_confidence);
        assert_eq!(after.coverage, before.coverage);
        assert!(fx.aggregator().finalize(&SharedEvidence).websites.is_empty());
    }

    #[test]
    fn generation_sections_always_present() {
        let fx = Fixture::new();
        let report = fx.aggregator().finalize(&SharedEvidence);
        assert!(report.findings.is_empty());
        assert_eq!(report.username_candidates.len(), fx.candidates.usernames().count());
        assert!(!report.email_candidates.is_empty());
        assert!(report.email_candidates.iter().all(|e| !e.format.starts_with("email:")));
        assert!(!report.phone_patterns.is_empty());
        assert!(report.phone_patterns.iter().all(|p| p.confidence == PHONE_HINT_CONFIDENCE));
        assert_eq!(report.phone_patterns[0].area_code.as_deref(), Some("512"));
    }

    #[test]
    fn inconclusive_class_penalizes_confidence() {
        let fx = Fixture::new();

        let mut clean = fx.aggregator();
        clean.ingest(fx.outcome(1, "johnsmith", "instagram", ProbeStatus::Found));
        let clean_conf = clean.finalize(&NoCorroboration).findings[0].confidence;

        // facebook shares instagram's rate class
        let mut noisy = fx.aggregator();
        noisy.ingest(fx.outcome(1, "johnsmith", "instagram", ProbeStatus::Found));
        noisy.ingest(fx.outcome(2, "jsmith", "facebook", ProbeStatus::Inconclusive(InconclusiveReason::RateLimited)));
        let noisy_conf = noisy.finalize(&NoCorroboration).findings[0].confidence;

        // r = 0.5 ⇒ × 0.75
        assert!((noisy_conf - clean_conf * 0.75).abs() < 1e-9);

        // pruned tasks do not count against the class
        let mut pruned = fx.aggregator();
        pruned.ingest(fx.outcome(1, "johnsmith", "instagram", ProbeStatus::Found));
        pruned.ingest(fx.outcome(2, "jsmith", "facebook", ProbeStatus::Inconclusive(InconclusiveReason::Pruned)));
        let pruned_conf = pruned.finalize(&NoCorroboration).findings[0].confidence;
        assert!((pruned_conf - clean_conf).abs() < 1e-9);
    }

    #[test]
    fn interim_reports_progress_and_hit_rates() {
        let fx = Fixture::new();
        let mut agg = fx.aggregator();
        for o in sample(&fx) {
            agg.ingest(o);
        }
        let pending = vec![ProbeTask::new(
            42,
            Arc::new(fx.candidates.iter().find(|c| c.value() == "jsmith").unwrap().clone()),
            Arc::clone(fx.registry.get("facebook").unwrap()),
        )];
        let interim = agg.interim(&pending, 20);

        assert_eq!(interim.completed, 7);
        assert_eq!(interim.total, 20);
        assert_eq!(interim.findings.len(), 4);
        assert_eq!(interim.pending.len(), 1);
        assert_eq!(interim.pending[0].specificity, Specificity::Derived);
        // meta: instagram found once, not found once
        assert!((interim.class_hit_rates["meta"] - 0.5).abs() < 1e-9);

        let john_dot = interim.candidates.iter().find(|c| c.value == "john.smith").unwrap();
        assert_eq!((john_dot.resolved, john_dot.found), (1, 0));
    }
}
