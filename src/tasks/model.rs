//! Task data model: lifecycle status, the task record, and id generation.

use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::calculator::{Operation, Operator};
use crate::error::EvalError;

/// Prefix of every task identifier.
const TASK_ID_PREFIX: &str = "task_";

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a worker.
    Pending,
    /// Claimed by exactly one worker.
    InProgress,
    /// Result recorded.
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// One unit of arithmetic work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// `task_<nanos>`; sorts in creation order.
    pub id: String,
    /// Owning user.
    pub user_id: i64,
    /// Expression text as submitted.
    pub expression: String,
    /// Left operand for single-operation tasks, empty otherwise.
    pub arg1: String,
    /// Right operand for single-operation tasks, empty otherwise.
    pub arg2: String,
    /// Operator symbol for single-operation tasks, empty for whole expressions.
    pub operation: String,
    /// Set only once the task is completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Claim deadline; an `in_progress` task past it goes back to `pending`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a fresh `pending` task.
    pub fn new(
        id: impl Into<String>,
        user_id: i64,
        expression: impl Into<String>,
        operation: &Operation,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (arg1, arg2, op) = match operation {
            Operation::Binary { arg1, op, arg2 } => {
                (arg1.clone(), arg2.clone(), op.symbol().to_string())
            }
            Operation::Expression(_) => (String::new(), String::new(), String::new()),
        };
        Self {
            id: id.into(),
            user_id,
            expression: expression.into(),
            arg1,
            arg2,
            operation: op,
            result: None,
            status: TaskStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            lease_expires_at: None,
        }
    }

    /// The work a worker has to perform for this task.
    pub fn work(&self) -> Result<Operation, EvalError> {
        if self.operation.is_empty() {
            return Ok(Operation::Expression(self.expression.clone()));
        }
        Ok(Operation::Binary {
            arg1: self.arg1.clone(),
            op: Operator::from_symbol(&self.operation)?,
            arg2: self.arg2.clone(),
        })
    }

    /// Whether an `in_progress` claim has outlived its lease.
    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::InProgress
            && self.lease_expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Canonical fixed-width timestamp format used in storage.
///
/// Fixed width keeps lexical order equal to chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Clock-ordered task id source.
///
/// Every id is strictly greater than the previous one even when the wall
/// clock stalls or steps backwards; the task's `created_at` is derived from
/// the same value.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    last: AtomicI64,
}

impl TaskIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after an id already handed out (e.g. loaded from storage).
    pub fn starting_after(last_id: &str) -> Self {
        let last = parse_task_id(last_id).unwrap_or(0);
        Self {
            last: AtomicI64::new(last),
        }
    }

    /// Next id and its creation timestamp.
    pub fn next_id(&self) -> (String, DateTime<Utc>) {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX - 1);
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(now);
        let nanos = now.max(prev + 1);
        (
            format!("{TASK_ID_PREFIX}{nanos}"),
            DateTime::from_timestamp_nanos(nanos),
        )
    }
}

/// Extract the clock value from a `task_<nanos>` id.
pub fn parse_task_id(id: &str) -> Option<i64> {
    id.strip_prefix(TASK_ID_PREFIX)?.parse().ok()
}
