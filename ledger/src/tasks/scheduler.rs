//! Polling scheduler for durable tasks.
//!
//! [`Scheduler::run`] polls the store every interval and starts each due
//! task whose subject is not already running, as long as a worker slot is
//! free. Running tasks are never awaited by the poll loop: a peer that hangs
//! holds one slot until its request times out, and every other slot keeps
//! serving new work. At most one execution per `(kind, subject)` is in
//! flight at a time. After each attempt the record is updated:
//!
//! - success: the record is marked succeeded,
//! - retryable error: `retry` is incremented and the task is rescheduled at
//!   `deadline_for_retry(retry)`, or marked failed once `retry` reaches the
//!   task's `max_retries`,
//! - fatal error: the record is marked failed.
//!
//! Finished records stay in the store; failed ones are there for operators
//! to inspect. [`Scheduler::tick`] runs one poll and waits for everything
//! it started, which is what tests drive.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::{Task, TaskError, TaskKind, TaskRecord, TaskStatus};
use crate::config::SchedulerConfig;
use crate::context::MintContext;
use crate::storage::{LedgerRead, StorageError};

/// What happened to a task after one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Rescheduled,
    Failed,
}

/// Counts of attempt outcomes for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub succeeded: usize,
    pub rescheduled: usize,
    pub failed: usize,
    /// Due tasks left for a later poll because their subject was busy.
    pub deferred: usize,
}

impl TickReport {
    pub fn executed(&self) -> usize {
        self.succeeded + self.rescheduled + self.failed
    }

    fn record(&mut self, joined: Result<Result<Outcome, StorageError>, JoinError>) {
        match joined {
            Ok(Ok(Outcome::Succeeded)) => self.succeeded += 1,
            Ok(Ok(Outcome::Rescheduled)) => self.rescheduled += 1,
            Ok(Ok(Outcome::Failed)) => self.failed += 1,
            Ok(Err(e)) => error!(error = %e, "failed to persist task outcome"),
            Err(e) if e.is_cancelled() => debug!("task execution cancelled"),
            Err(e) => error!(error = %e, "task execution panicked"),
        }
    }
}

/// Applies the result of one attempt to `record`.
pub fn apply_attempt(
    record: &mut TaskRecord,
    task: &dyn Task,
    result: Result<(), TaskError>,
    now_ms: u64,
) -> Outcome {
    match result {
        Ok(()) => {
            record.status = TaskStatus::Succeeded;
            record.last_error = None;
            Outcome::Succeeded
        }
        Err(TaskError::Fatal(message)) => {
            record.status = TaskStatus::Failed;
            record.last_error = Some(message);
            Outcome::Failed
        }
        Err(TaskError::Retryable(message)) => {
            record.retry += 1;
            record.last_error = Some(message);
            if record.retry >= task.max_retries() {
                record.status = TaskStatus::Failed;
                Outcome::Failed
            } else {
                record.deadline = task.deadline_for_retry(now_ms, record.retry);
                Outcome::Rescheduled
            }
        }
    }
}

type SubjectKey = (TaskKind, String);

type Running = JoinSet<Result<Outcome, StorageError>>;

/// Subjects with an execution in flight.
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashSet<SubjectKey>>>);

impl InFlight {
    // The set is only ever inserted into or removed from, so a panic while
    // it was held leaves it consistent.
    fn lock(&self) -> MutexGuard<'_, HashSet<SubjectKey>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, key: &SubjectKey) -> bool {
        self.lock().insert(key.clone())
    }

    fn release(&self, key: &SubjectKey) {
        self.lock().remove(key);
    }
}

/// How [`Scheduler::dispatch`] waits for a free worker slot.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Slots {
    /// Wait for running tasks to free a slot.
    Wait,
    /// Leave the remaining due tasks for the next poll.
    Available,
}

pub struct Scheduler {
    ctx: MintContext,
    cfg: SchedulerConfig,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
}

impl Scheduler {
    pub fn new(ctx: MintContext, cfg: SchedulerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(cfg.max_concurrency.max(1)));
        Self {
            ctx,
            cfg,
            permits,
            in_flight: InFlight::default(),
        }
    }

    async fn permit(&self, slots: Slots) -> Option<OwnedSemaphorePermit> {
        match slots {
            Slots::Wait => self.permits.clone().acquire_owned().await.ok(),
            Slots::Available => self.permits.clone().try_acquire_owned().ok(),
        }
    }

    /// Starts every due task whose subject is idle onto `running`. Returns
    /// the number of due tasks skipped because their subject was busy.
    async fn dispatch(&self, running: &mut Running, slots: Slots) -> Result<usize, StorageError> {
        let now = self.ctx.now_ms();
        let due = self.ctx.store.due_tasks(now)?;
        if due.is_empty() {
            return Ok(0);
        }
        debug!(host = %self.ctx.host, due = due.len(), "dispatching due tasks");

        let mut deferred = 0;
        for record in due {
            let key = (record.kind, record.subject.clone());
            if !self.in_flight.claim(&key) {
                deferred += 1;
                continue;
            }
            // The listing may predate an attempt that finished since.
            let fresh = match self.ctx.store.task(&record.id) {
                Ok(Some(fresh)) if fresh.status == TaskStatus::Pending && fresh.deadline <= now => fresh,
                Ok(_) => {
                    self.in_flight.release(&key);
                    continue;
                }
                Err(e) => {
                    self.in_flight.release(&key);
                    return Err(e);
                }
            };
            let Some(permit) = self.permit(slots).await else {
                self.in_flight.release(&key);
                break;
            };
            let ctx = self.ctx.clone();
            let in_flight = self.in_flight.clone();
            running.spawn(async move {
                let outcome = run_attempt(&ctx, fresh).await;
                in_flight.release(&key);
                drop(permit);
                outcome
            });
        }
        Ok(deferred)
    }

    /// Executes every task due now and waits for all of them.
    pub async fn tick(&self) -> Result<TickReport, StorageError> {
        let mut running = JoinSet::new();
        let mut report = TickReport {
            deferred: self.dispatch(&mut running, Slots::Wait).await?,
            ..TickReport::default()
        };
        while let Some(joined) = running.join_next().await {
            report.record(joined);
        }
        Ok(report)
    }

    /// Polls for due tasks until `shutdown` flips to `true`.
    ///
    /// Tasks still running at shutdown are cancelled; their records stay
    /// pending and run again on the next start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            host = %self.ctx.host,
            poll_ms = self.cfg.poll_interval_ms,
            max_concurrency = self.cfg.max_concurrency,
            "task scheduler started"
        );
        let mut running = JoinSet::new();
        let mut report = TickReport::default();
        loop {
            if *shutdown.borrow() {
                break;
            }
            while let Some(joined) = running.try_join_next() {
                report.record(joined);
            }
            if let Err(e) = self.dispatch(&mut running, Slots::Available).await {
                error!(error = %e, "task scheduler poll failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.poll_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        running.shutdown().await;
        info!(
            host = %self.ctx.host,
            succeeded = report.succeeded,
            rescheduled = report.rescheduled,
            failed = report.failed,
            "task scheduler stopped"
        );
    }
}

async fn run_attempt(ctx: &MintContext, mut record: TaskRecord) -> Result<Outcome, StorageError> {
    let task = record.kind.instantiate(record.subject.clone());
    let result = task.execute(ctx).await;
    let outcome = apply_attempt(&mut record, task.as_ref(), result, ctx.now_ms());
    let kind = record.kind.name();

    match outcome {
        Outcome::Succeeded => {
            debug!(task = %record.id, kind, subject = %record.subject, "task succeeded");
            ctx.observe(|m| m.tasks.succeeded.with_label_values(&[kind]).inc());
        }
        Outcome::Rescheduled => {
            warn!(
                task = %record.id,
                kind,
                subject = %record.subject,
                retry = record.retry,
                deadline = record.deadline,
                error = record.last_error.as_deref().unwrap_or_default(),
                "task rescheduled"
            );
            ctx.observe(|m| m.tasks.retried.with_label_values(&[kind]).inc());
        }
        Outcome::Failed => {
            error!(
                task = %record.id,
                kind,
                subject = %record.subject,
                retry = record.retry,
                error = record.last_error.as_deref().unwrap_or_default(),
                "task failed permanently"
            );
            ctx.observe(|m| m.tasks.failed.with_label_values(&[kind]).inc());
        }
    }

    ctx.store.atomically(|txn| txn.put_task(&record))?;
    Ok(outcome)
}
