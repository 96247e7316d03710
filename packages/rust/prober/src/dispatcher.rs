//! Bounded worker pool that turns probe tasks into outcomes.
//!
//! [`Dispatcher::run`] starts a fixed number of workers that pull from a
//! shared queue. Every submitted task produces exactly one [`ProbeOutcome`]
//! on the returned [`OutcomeStream`]: probed, abandoned at the deadline,
//! cancelled before starting, or pruned by the planner.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dossier_registry::{HttpMethod, Registry};
use dossier_shared::{ProbeConfig, Result};
use rand::Rng;
use reqwest::Client;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cancel::CancelToken;
use crate::classify::classify;
use crate::evidence;
use crate::fetch::{FetchError, build_client, fetch, is_ssrf_target};
use crate::limiter::{RateLimiters, TokenBucket};
use crate::outcome::{
    ErrorKind, Evidence, InconclusiveReason, OutcomeSource, ProbeOutcome, ProbeStatus, ProbeTask,
    TaskId,
};

// ---------------------------------------------------------------------------
// Budget / stats
// ---------------------------------------------------------------------------

/// Time and concurrency limits for one dispatch run.
#[derive(Debug, Clone)]
pub struct Budget {
    pub max_concurrency: usize,
    pub per_task_timeout: Duration,
    /// Measured from the call to [`Dispatcher::run`].
    pub global_deadline: Duration,
    /// Extra time for in-flight probes once the deadline passes.
    pub grace: Duration,
    /// Bounded wait for a rate-limiter token (tried twice).
    pub limiter_wait: Duration,
}

impl From<&ProbeConfig> for Budget {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            max_concurrency: config.concurrency.max(1),
            per_task_timeout: config.per_task_timeout,
            global_deadline: config.global_deadline,
            grace: config.grace,
            limiter_wait: config.limiter_wait,
        }
    }
}

/// Counters for a dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub total: usize,
    pub started: usize,
    pub completed: usize,
    pub peak_in_flight: usize,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Executes probe tasks against platforms under a [`Budget`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    limiters: RateLimiters,
    registry: Arc<Registry>,
    cooldown: Duration,
    max_body_bytes: usize,
    allow_private_targets: bool,
}

impl Dispatcher {
    pub fn new(config: &ProbeConfig, limiters: RateLimiters, registry: Arc<Registry>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            limiters,
            registry,
            cooldown: config.cooldown,
            max_body_bytes: config.max_body_bytes,
            allow_private_targets: false,
        })
    }

    /// Permit loopback and private-network targets (local mock servers).
    pub fn allow_private_targets(mut self) -> Self {
        self.allow_private_targets = true;
        self
    }

    pub fn limiters(&self) -> &RateLimiters {
        &self.limiters
    }

    /// Start probing `tasks`. Must be called from within a tokio runtime.
    #[instrument(skip_all, fields(tasks = tasks.len(), concurrency = budget.max_concurrency))]
    pub fn run(
        &self,
        tasks: Vec<ProbeTask>,
        budget: Budget,
        cancel: CancelToken,
    ) -> (OutcomeStream, DispatchHandle) {
        let total = tasks.len();
        let (tx, rx) = mpsc::unbounded_channel();
        let (paused, _) = watch::channel(false);
        let deadline = Instant::now() + budget.global_deadline;

        let run = Arc::new(RunState {
            queue: Mutex::new(tasks.into()),
            in_flight_tasks: Mutex::new(HashMap::new()),
            paused,
            tx,
            cancel,
            deadline,
            hard_deadline: deadline + budget.grace,
            total,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        });

        let workers = budget.max_concurrency.max(1).min(total);
        info!(total, workers, deadline_ms = budget.global_deadline.as_millis() as u64, "dispatch started");

        let dispatcher = Arc::new(self.clone());
        let budget = Arc::new(budget);
        let supervisor_run = Arc::clone(&run);
        tokio::spawn(async move {
            let run = supervisor_run;
            let mut set = JoinSet::new();
            for _ in 0..workers {
                set.spawn(worker(Arc::clone(&dispatcher), Arc::clone(&run), Arc::clone(&budget)));
            }
            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "probe worker failed");
                }
            }
            run.settle().await;
        });

        (
            OutcomeStream {
                rx,
                remaining: total,
            },
            DispatchHandle { run },
        )
    }

    /// Probe one task. Never fails: every problem becomes a status.
    async fn probe(&self, task: &ProbeTask, budget: &Budget) -> ProbeOutcome {
        let started = Instant::now();
        let (status, evidence) = self.execute(task, budget).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(
            task = task.id,
            platform = %task.platform.id,
            candidate = task.candidate.value(),
            status = %status.label(),
            latency_ms,
            "probe finished"
        );
        ProbeOutcome {
            task: task.clone(),
            status,
            latency_ms,
            evidence,
            source: OutcomeSource::Registry,
        }
    }

    async fn execute(&self, task: &ProbeTask, budget: &Budget) -> (ProbeStatus, Option<Evidence>) {
        let platform = &task.platform;
        let Ok(url) = Url::parse(&task.url()) else {
            return (ProbeStatus::Error(ErrorKind::InvalidTarget), None);
        };
        if !self.allow_private_targets && is_ssrf_target(&url) {
            warn!(%url, "SSRF protection: blocked");
            return (ProbeStatus::Error(ErrorKind::Blocked), None);
        }

        let bucket = self.limiters.bucket(&platform.rate_class).await;
        if !bucket.acquire(budget.limiter_wait).await && !bucket.acquire(budget.limiter_wait).await {
            return (ProbeStatus::Inconclusive(InconclusiveReason::RateLimited), None);
        }

        let timeout = budget
            .per_task_timeout
            .min(Duration::from_millis(platform.timeout_ms));
        let mut retried = false;
        let response = loop {
            match fetch(&self.client, platform.method, &url, self.max_body_bytes, timeout).await {
                Ok(response) => break response,
                Err(FetchError::Timeout) => {
                    return (ProbeStatus::Inconclusive(InconclusiveReason::Timeout), None);
                }
                Err(FetchError::Network(error)) if !retried => {
                    retried = true;
                    let backoff = jittered_backoff();
                    debug!(%url, %error, backoff_ms = backoff.as_millis() as u64, "retrying probe");
                    tokio::time::sleep(backoff).await;
                }
                Err(FetchError::Network(error)) => {
                    warn!(%url, %error, "probe failed");
                    return (ProbeStatus::Error(ErrorKind::Network), None);
                }
            }
        };

        if response.status == 429 {
            bucket
                .trip_cooldown(response.retry_after.unwrap_or(self.cooldown))
                .await;
        }

        let status = classify(&platform.predicate, response.status, response.body.as_deref());
        let mut evidence = status.is_found().then(|| {
            evidence::extract(
                response.body.as_deref(),
                &url,
                platform.profile_url(task.candidate.value()),
                &self.registry,
                &platform.id,
            )
        });
        if let (Some(evidence), Some(feed)) = (evidence.as_mut(), platform.activity_url(task.candidate.value())) {
            self.read_activity(&feed, &bucket, budget, timeout, evidence).await;
        }
        (status, evidence)
    }

    /// Add commit emails from a found profile's activity feed. Any failure
    /// leaves the evidence unchanged.
    async fn read_activity(
        &self,
        feed: &str,
        bucket: &TokenBucket,
        budget: &Budget,
        timeout: Duration,
        evidence: &mut Evidence,
    ) {
        let Ok(url) = Url::parse(feed) else {
            return;
        };
        if !self.allow_private_targets && is_ssrf_target(&url) {
            return;
        }
        if !bucket.acquire(budget.limiter_wait).await {
            debug!(%url, "no token left for activity feed");
            return;
        }
        match fetch(&self.client, HttpMethod::Get, &url, self.max_body_bytes, timeout).await {
            Ok(response) if (200..300).contains(&response.status) => {
                let emails = evidence::commit_emails(response.body.as_deref().unwrap_or_default());
                debug!(%url, count = emails.len(), "activity feed read");
                evidence.emails.extend(emails);
            }
            Ok(response) => {
                if response.status == 429 {
                    bucket
                        .trip_cooldown(response.retry_after.unwrap_or(self.cooldown))
                        .await;
                }
                debug!(%url, status = response.status, "activity feed unavailable");
            }
            Err(_) => debug!(%url, "activity feed unreachable"),
        }
    }
}

/// 100 to 400 ms before the single network retry.
fn jittered_backoff() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(100..=400))
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

struct RunState {
    queue: Mutex<VecDeque<ProbeTask>>,
    in_flight_tasks: Mutex<HashMap<TaskId, ProbeTask>>,
    paused: watch::Sender<bool>,
    tx: mpsc::UnboundedSender<ProbeOutcome>,
    cancel: CancelToken,
    deadline: Instant,
    hard_deadline: Instant,
    total: usize,
    started: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RunState {
    fn emit(&self, outcome: ProbeOutcome) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        // The receiver may be gone if the caller stopped listening.
        let _ = self.tx.send(outcome);
    }

    async fn begin(&self, task: &ProbeTask) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.in_flight_tasks.lock().await.insert(task.id, task.clone());
    }

    async fn finish(&self, outcome: ProbeOutcome) {
        self.in_flight_tasks.lock().await.remove(&outcome.task.id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.emit(outcome);
    }

    /// Emit outcomes for everything the workers left behind.
    async fn settle(&self) {
        let reason = if self.cancel.is_cancelled() {
            InconclusiveReason::Cancelled
        } else {
            InconclusiveReason::Deadline
        };
        let leftover: Vec<ProbeTask> = self.queue.lock().await.drain(..).collect();
        if !leftover.is_empty() {
            info!(count = leftover.len(), reason = reason.as_str(), "unstarted probes");
        }
        for task in leftover {
            self.emit(ProbeOutcome::unstarted(task, reason));
        }

        let orphaned: Vec<ProbeTask> = self
            .in_flight_tasks
            .lock()
            .await
            .drain()
            .map(|(_, task)| task)
            .collect();
        for task in orphaned {
            warn!(task = task.id, "probe lost with its worker");
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.emit(ProbeOutcome {
                task,
                status: ProbeStatus::Error(ErrorKind::Network),
                latency_ms: 0,
                evidence: None,
                source: OutcomeSource::Registry,
            });
        }

        info!(
            completed = self.completed.load(Ordering::SeqCst),
            peak_in_flight = self.peak_in_flight.load(Ordering::SeqCst),
            "dispatch finished"
        );
    }
}

async fn worker(dispatcher: Arc<Dispatcher>, run: Arc<RunState>, budget: Arc<Budget>) {
    let mut paused = run.paused.subscribe();
    loop {
        if run.cancel.is_cancelled() || Instant::now() >= run.deadline {
            break;
        }
        if *paused.borrow() {
            tokio::select! {
                _ = paused.wait_for(|p| !*p) => {}
                _ = run.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(run.deadline) => break,
            }
            continue;
        }

        let Some(task) = run.queue.lock().await.pop_front() else {
            break;
        };

        run.begin(&task).await;
        let started = Instant::now();
        let result = tokio::time::timeout_at(run.hard_deadline, dispatcher.probe(&task, &budget)).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(task = task.id, platform = %task.platform.id, "probe abandoned at deadline");
                ProbeOutcome {
                    status: ProbeStatus::Inconclusive(InconclusiveReason::Deadline),
                    latency_ms: started.elapsed().as_millis() as u64,
                    ..ProbeOutcome::unstarted(task, InconclusiveReason::Deadline)
                }
            }
        };
        run.finish(outcome).await;
    }
}

// ---------------------------------------------------------------------------
// Stream / handle
// ---------------------------------------------------------------------------

/// Outcomes in completion order. Finite: ends after one outcome per task.
pub struct OutcomeStream {
    rx: mpsc::UnboundedReceiver<ProbeOutcome>,
    remaining: usize,
}

impl OutcomeStream {
    pub async fn next(&mut self) -> Option<ProbeOutcome> {
        if self.remaining == 0 {
            return None;
        }
        let outcome = self.rx.recv().await?;
        self.remaining -= 1;
        Some(outcome)
    }

    /// Outcomes not yet received.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Drain the stream.
    pub async fn collect(mut self) -> Vec<ProbeOutcome> {
        let mut out = Vec::with_capacity(self.remaining);
        while let Some(outcome) = self.next().await {
            out.push(outcome);
        }
        out
    }
}

/// Control over a running dispatch.
#[derive(Clone)]
pub struct DispatchHandle {
    run: Arc<RunState>,
}

impl DispatchHandle {
    /// Stop starting new probes. In-flight probes continue.
    pub fn pause(&self) {
        self.run.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.run.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.run.paused.borrow()
    }

    pub fn cancel(&self) {
        self.run.cancel.cancel();
    }

    /// Snapshot of queued, unstarted tasks in queue order.
    pub async fn pending(&self) -> Vec<ProbeTask> {
        self.run.queue.lock().await.iter().cloned().collect()
    }

    /// Move the listed tasks to the front, in the given order. Unlisted
    /// tasks keep their relative order behind them. Returns how many moved.
    pub async fn reorder(&self, front: &[TaskId]) -> usize {
        let mut queue = self.run.queue.lock().await;
        let mut ordered: VecDeque<ProbeTask> = VecDeque::with_capacity(queue.len());
        for id in front {
            if let Some(pos) = queue.iter().position(|task| task.id == *id) {
                ordered.extend(queue.remove(pos));
            }
        }
        let moved = ordered.len();
        ordered.append(&mut queue);
        *queue = ordered;
        moved
    }

    /// Remove queued tasks matching `predicate`; each is emitted as
    /// `Inconclusive(Pruned)`. Returns how many were removed.
    pub async fn prune(&self, predicate: impl Fn(&ProbeTask) -> bool) -> usize {
        let pruned: Vec<ProbeTask> = {
            let mut queue = self.run.queue.lock().await;
            let (pruned, kept): (Vec<ProbeTask>, Vec<ProbeTask>) =
                queue.drain(..).partition(|task| predicate(task));
            *queue = kept.into();
            pruned
        };
        let count = pruned.len();
        for task in pruned {
            self.run.emit(ProbeOutcome::unstarted(task, InconclusiveReason::Pruned));
        }
        if count > 0 {
            info!(count, "pruned probes");
        }
        count
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            total: self.run.total,
            started: self.run.started.load(Ordering::SeqCst),
            completed: self.run.completed.load(Ordering::SeqCst),
            peak_in_flight: self.run.peak_in_flight.load(Ordering::SeqCst),
        }
    }
}
