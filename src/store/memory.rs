//! In-process `Database` implementation.
//!
//! Every operation takes the same async mutex, which makes claim trivially
//! exclusive. Nothing survives a restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::calculator::Operation;
use crate::error::DatabaseError;
use crate::store::traits::{Database, TaskStore, User, UserStore};
use crate::tasks::model::{Task, TaskIdGenerator, TaskStatus};

#[derive(Default)]
struct State {
    /// Keyed by id, which sorts in creation order.
    tasks: BTreeMap<String, Task>,
    users: BTreeMap<String, User>,
    next_user_id: i64,
}

impl State {
    fn requeue_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut count = 0;
        for task in self.tasks.values_mut() {
            if task.is_lease_expired(now) {
                task.status = TaskStatus::Pending;
                task.started_at = None;
                task.lease_expires_at = None;
                count += 1;
            }
        }
        count
    }
}

/// Volatile store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    ids: TaskIdGenerator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn task_not_found(id: &str) -> DatabaseError {
    DatabaseError::NotFound {
        entity: "task".into(),
        id: id.to_string(),
    }
}

#[async_trait]
impl Database for MemoryStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn enqueue(
        &self,
        owner_id: i64,
        expression: &str,
        operation: &Operation,
    ) -> Result<String, DatabaseError> {
        let mut state = self.state.lock().await;
        let (id, created_at) = self.ids.next_id();
        let task = Task::new(id.clone(), owner_id, expression, operation, created_at);
        state.tasks.insert(id.clone(), task);
        debug!(task_id = %id, owner_id, "Task enqueued");
        Ok(id)
    }

    async fn claim_oldest_pending(
        &self,
        lease: chrono::Duration,
    ) -> Result<Option<Task>, DatabaseError> {
        let now = Utc::now();
        let expires = now.checked_add_signed(lease).ok_or_else(|| {
            DatabaseError::Query(format!("claim_oldest_pending: lease {lease} out of range"))
        })?;
        let mut state = self.state.lock().await;
        let requeued = state.requeue_expired(now);
        if requeued > 0 {
            info!(count = requeued, "Requeued tasks with expired leases");
        }

        let Some(task) = state
            .tasks
            .values_mut()
            .find(|t| t.status == TaskStatus::Pending)
        else {
            return Ok(None);
        };

        task.status = TaskStatus::InProgress;
        task.started_at = Some(now);
        task.lease_expires_at = Some(expires);
        debug!(task_id = %task.id, "Task claimed");
        Ok(Some(task.clone()))
    }

    async fn complete_task(&self, id: &str, result: f64) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        let task = state.tasks.get_mut(id).ok_or_else(|| task_not_found(id))?;
        task.status = TaskStatus::Completed;
        task.result = Some(result);
        task.completed_at = Some(Utc::now());
        task.lease_expires_at = None;
        debug!(task_id = %id, result, "Task completed");
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Task, DatabaseError> {
        let state = self.state.lock().await;
        state.tasks.get(id).cloned().ok_or_else(|| task_not_found(id))
    }

    async fn list_tasks_for_owner(&self, owner_id: i64) -> Result<Vec<Task>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .rev()
            .filter(|t| t.user_id == owner_id)
            .cloned()
            .collect())
    }

    async fn requeue_expired(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let count = self.state.lock().await.requeue_expired(now);
        if count > 0 {
            info!(count, "Requeued tasks with expired leases");
        }
        Ok(count)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, DatabaseError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(login) {
            return Err(DatabaseError::Conflict(format!(
                "user '{login}' already exists"
            )));
        }
        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.insert(
            login.to_string(),
            User {
                id,
                login: login.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        info!(user_id = id, login, "User created");
        Ok(id)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.state.lock().await.users.get(login).cloned())
    }
}
