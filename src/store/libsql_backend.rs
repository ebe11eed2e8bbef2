//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Claiming a task is a single
//! `UPDATE … RETURNING` statement, so two workers can never receive the same
//! row even when they race on separate connections or processes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::calculator::Operation;
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, TaskStore, User, UserStore};
use crate::tasks::model::{Task, TaskIdGenerator, TaskStatus, format_timestamp};

/// Columns selected for every task query, in `row_to_task` order.
const TASK_COLUMNS: &str = "id, user_id, expression, arg1, arg2, operation, result, status, \
     created_at, started_at, completed_at, lease_expires_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    ids: TaskIdGenerator,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::open(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::open(db).await
    }

    /// Connect, migrate, and resume id generation after the newest stored task.
    async fn open(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        let ids = match last_task_id(&conn).await? {
            Some(last) => TaskIdGenerator::starting_after(&last),
            None => TaskIdGenerator::new(),
        };

        Ok(Self {
            db: Arc::new(db),
            conn,
            ids,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

async fn last_task_id(conn: &Connection) -> Result<Option<String>, DatabaseError> {
    let mut rows = conn
        .query("SELECT MAX(id) FROM tasks", ())
        .await
        .map_err(|e| DatabaseError::Query(format!("last_task_id: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => Ok(row.get::<String>(0).ok()),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("last_task_id: {e}"))),
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    let column = |e: libsql::Error| DatabaseError::Query(format!("row_to_task: {e}"));
    let status_str: String = row.get(7).map_err(column)?;
    let status = status_str
        .parse::<TaskStatus>()
        .map_err(|e| DatabaseError::Query(format!("row_to_task: {e}")))?;
    let created_str: String = row.get(8).map_err(column)?;
    let started_str: Option<String> = row.get(9).ok();
    let completed_str: Option<String> = row.get(10).ok();
    let lease_str: Option<String> = row.get(11).ok();

    Ok(Task {
        id: row.get(0).map_err(column)?,
        user_id: row.get(1).map_err(column)?,
        expression: row.get(2).map_err(column)?,
        arg1: row.get(3).map_err(column)?,
        arg2: row.get(4).map_err(column)?,
        operation: row.get(5).map_err(column)?,
        result: row.get::<f64>(6).ok(),
        status,
        created_at: parse_datetime(&created_str),
        started_at: parse_optional_datetime(&started_str),
        completed_at: parse_optional_datetime(&completed_str),
        lease_expires_at: parse_optional_datetime(&lease_str),
    })
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }
}

#[async_trait]
impl TaskStore for LibSqlBackend {
    async fn enqueue(
        &self,
        owner_id: i64,
        expression: &str,
        operation: &Operation,
    ) -> Result<String, DatabaseError> {
        let (id, created_at) = self.ids.next_id();
        let task = Task::new(id, owner_id, expression, operation, created_at);

        self.conn()
            .execute(
                "INSERT INTO tasks
                     (id, user_id, expression, arg1, arg2, operation, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id.clone(),
                    task.user_id,
                    task.expression,
                    task.arg1,
                    task.arg2,
                    task.operation,
                    task.status.as_str(),
                    format_timestamp(task.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("enqueue: {e}")))?;

        debug!(task_id = %task.id, owner_id, "Task enqueued");
        Ok(task.id)
    }

    async fn claim_oldest_pending(
        &self,
        lease: chrono::Duration,
    ) -> Result<Option<Task>, DatabaseError> {
        let now = Utc::now();
        let expires = now.checked_add_signed(lease).ok_or_else(|| {
            DatabaseError::Query(format!("claim_oldest_pending: lease {lease} out of range"))
        })?;
        self.requeue_expired(now).await?;

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE tasks
                     SET status = 'in_progress', started_at = ?1, lease_expires_at = ?2
                     WHERE id = (
                         SELECT id FROM tasks
                         WHERE status = 'pending'
                         ORDER BY created_at ASC, id ASC
                         LIMIT 1
                     ) AND status = 'pending'
                     RETURNING {TASK_COLUMNS}"
                ),
                params![format_timestamp(now), format_timestamp(expires)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("claim_oldest_pending: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let task = row_to_task(&row)?;
                debug!(task_id = %task.id, "Task claimed");
                Ok(Some(task))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("claim_oldest_pending: {e}"))),
        }
    }

    async fn complete_task(&self, id: &str, result: f64) -> Result<(), DatabaseError> {
        let now = format_timestamp(Utc::now());
        let count = self
            .conn()
            .execute(
                "UPDATE tasks
                 SET status = 'completed', result = ?1, completed_at = ?2, lease_expires_at = NULL
                 WHERE id = ?3",
                params![result, now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_task: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "task".into(),
                id: id.to_string(),
            });
        }
        debug!(task_id = %id, result, "Task completed");
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Task, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_task: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_task(&row),
            Ok(None) => Err(DatabaseError::NotFound {
                entity: "task".into(),
                id: id.to_string(),
            }),
            Err(e) => Err(DatabaseError::Query(format!("get_task: {e}"))),
        }
    }

    async fn list_tasks_for_owner(&self, owner_id: i64) -> Result<Vec<Task>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC"
                ),
                params![owner_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tasks_for_owner: {e}")))?;

        let mut tasks = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_task(&row) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    tracing::warn!("Skipping task row: {e}");
                }
            }
        }
        Ok(tasks)
    }

    async fn requeue_expired(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE tasks
                 SET status = 'pending', started_at = NULL, lease_expires_at = NULL
                 WHERE status = 'in_progress'
                   AND lease_expires_at IS NOT NULL
                   AND lease_expires_at <= ?1",
                params![format_timestamp(now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("requeue_expired: {e}")))?;

        if count > 0 {
            info!(count, "Requeued tasks with expired leases");
        }
        Ok(count as usize)
    }
}

#[async_trait]
impl UserStore for LibSqlBackend {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO users (login, password_hash) VALUES (?1, ?2) RETURNING id",
                params![login, password_hash],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DatabaseError::Conflict(format!("user '{login}' already exists"))
                } else {
                    DatabaseError::Query(format!("create_user: {e}"))
                }
            })?;

        match rows.next().await {
            Ok(Some(row)) => {
                let id: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("create_user row parse: {e}")))?;
                info!(user_id = id, login, "User created");
                Ok(id)
            }
            Ok(None) => Err(DatabaseError::Query(
                "create_user: insert returned no id".into(),
            )),
            Err(e) if is_unique_violation(&e) => Err(DatabaseError::Conflict(format!(
                "user '{login}' already exists"
            ))),
            Err(e) => Err(DatabaseError::Query(format!("create_user: {e}"))),
        }
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, login, password_hash FROM users WHERE login = ?1",
                params![login],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_user_by_login: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = User {
                    id: row.get(0).map_err(|e| {
                        DatabaseError::Query(format!("find_user_by_login row parse: {e}"))
                    })?,
                    login: row.get(1).map_err(|e| {
                        DatabaseError::Query(format!("find_user_by_login row parse: {e}"))
                    })?,
                    password_hash: row.get(2).map_err(|e| {
                        DatabaseError::Query(format!("find_user_by_login row parse: {e}"))
                    })?,
                };
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_user_by_login: {e}"))),
        }
    }
}
