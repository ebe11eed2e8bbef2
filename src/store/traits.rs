//! Storage traits: the read/write contract every backend satisfies.
//!
//! The Task Store is the only component that mutates task rows. HTTP
//! handlers and the dispatch service go through these traits and never see
//! a concrete backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::calculator::Operation;
use crate::error::DatabaseError;
use crate::tasks::model::Task;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub login: String,
    /// bcrypt hash of the password.
    pub password_hash: String,
}

/// Task queue operations. All methods are safe under concurrent callers.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a `pending` task and return its id.
    async fn enqueue(
        &self,
        owner_id: i64,
        expression: &str,
        operation: &Operation,
    ) -> Result<String, DatabaseError>;

    /// Atomically claim the oldest `pending` task.
    ///
    /// Expired leases are requeued first. The claimed task moves to
    /// `in_progress` with `started_at = now` and a deadline of `now + lease`.
    /// Each pending task is handed to at most one caller.
    async fn claim_oldest_pending(
        &self,
        lease: chrono::Duration,
    ) -> Result<Option<Task>, DatabaseError>;

    /// Record a result and mark the task `completed`, whatever its current status.
    ///
    /// Fails with `NotFound` only if the id never existed.
    async fn complete_task(&self, id: &str, result: f64) -> Result<(), DatabaseError>;

    /// Fetch one task.
    async fn get_task(&self, id: &str) -> Result<Task, DatabaseError>;

    /// All tasks of one owner, newest first.
    async fn list_tasks_for_owner(&self, owner_id: i64) -> Result<Vec<Task>, DatabaseError>;

    /// Move `in_progress` tasks whose lease ended at or before `now` back to
    /// `pending`. Returns how many were requeued.
    async fn requeue_expired(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;
}

/// User records consumed by authentication.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; `Conflict` if the login is taken.
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, DatabaseError>;

    /// Look a user up by login.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, DatabaseError>;
}

/// Full persistence interface used by the server.
#[async_trait]
pub trait Database: TaskStore + UserStore {
    /// Create tables and indexes if absent.
    async fn init_schema(&self) -> Result<(), DatabaseError>;
}
