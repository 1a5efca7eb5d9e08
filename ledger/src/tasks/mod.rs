//! Durable background tasks.
//!
//! Tasks are stored as [`TaskRecord`] rows in the ledger store, enqueued in
//! the same unit of work as the state change that requires them, so a crash
//! can never lose a task for committed state. The [`scheduler::Scheduler`]
//! polls for due records and executes them.
//!
//! Task types form a closed set ([`TaskKind`]). A record only stores the
//! kind and a subject key (a resource id); [`TaskKind::instantiate`] turns
//! it back into a [`Task`] whose `execute` re-reads everything it needs
//! from the store, which makes executions safe to repeat.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::MintContext;
use crate::types::new_token;

pub mod propagate;
pub mod scheduler;

pub use self::propagate::{PropagateOffer, PropagateOperation};
pub use self::scheduler::{Scheduler, TickReport};

/// The closed set of background task types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    PropagateOperation,
    PropagateOffer,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::PropagateOperation, TaskKind::PropagateOffer];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::PropagateOperation => "propagate_operation",
            TaskKind::PropagateOffer => "propagate_offer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Builds the executable task for a stored subject.
    pub fn instantiate(&self, subject: String) -> Box<dyn Task> {
        match self {
            TaskKind::PropagateOperation => Box::new(PropagateOperation::new(subject)),
            TaskKind::PropagateOffer => Box::new(PropagateOffer::new(subject)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Transient failure; the task is rescheduled.
    #[error("retryable: {0}")]
    Retryable(String),
    /// The task can never succeed; it is marked failed immediately.
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Deadline for retry `n` under exponential backoff: `now + (2^n - 1)s`.
pub fn exponential_backoff(now_ms: u64, retry: u32) -> u64 {
    let secs = 1u64.checked_shl(retry).unwrap_or(u64::MAX).saturating_sub(1);
    now_ms.saturating_add(secs.saturating_mul(1_000))
}

#[async_trait]
pub trait Task: Send + Sync {
    fn kind(&self) -> TaskKind;

    /// Key of the record the task acts on.
    fn subject(&self) -> &str;

    fn max_retries(&self) -> u32;

    fn deadline_for_retry(&self, now_ms: u64, retry: u32) -> u64 {
        exponential_backoff(now_ms, retry)
    }

    async fn execute(&self, ctx: &MintContext) -> Result<(), TaskError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Persistent state of one task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub kind: TaskKind,
    pub subject: String,
    pub created: u64,
    pub status: TaskStatus,
    /// Number of failed attempts so far.
    pub retry: u32,
    /// Earliest time (ms) of the next attempt.
    pub deadline: u64,
    pub last_error: Option<String>,
}

impl TaskRecord {
    /// A pending task due immediately.
    pub fn new(kind: TaskKind, subject: String, now_ms: u64) -> Self {
        Self {
            id: new_token("task"),
            kind,
            subject,
            created: now_ms,
            status: TaskStatus::Pending,
            retry: 0,
            deadline: now_ms,
            last_error: None,
        }
    }
}
