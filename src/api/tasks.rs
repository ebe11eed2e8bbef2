//! Asynchronous tasks: enqueue for remote workers and read back results.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use tracing::info;

use crate::api::AppState;
use crate::api::calculate::ExpressionRequest;
use crate::api::error::ApiError;
use crate::auth::AuthenticatedUser;
use crate::calculator::compile;
use crate::tasks::Task;

#[derive(Debug, Serialize)]
pub struct CreatedTask {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    body: Result<Json<ExpressionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedTask>), ApiError> {
    let Json(req) =
        body.map_err(|_| ApiError::Unprocessable("Invalid request format".into()))?;

    let operation = compile(&req.expression)?;
    let id = state
        .db
        .enqueue(user.user_id, &req.expression, &operation)
        .await?;
    info!(task_id = %id, user_id = user.user_id, login = %user.login, "Task submitted");
    Ok((StatusCode::CREATED, Json(CreatedTask { id })))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<TaskList>, ApiError> {
    let tasks = state.db.list_tasks_for_owner(user.user_id).await?;
    Ok(Json(TaskList { tasks }))
}

pub async fn get_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task = state.db.get_task(&id).await?;
    // Other users' tasks are indistinguishable from missing ones.
    if task.user_id != user.user_id {
        return Err(ApiError::NotFound("task not found".into()));
    }
    Ok(Json(task))
}
