//! Orchestrator side of the dispatch protocol.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{error, info, warn};

use crate::dispatch::proto::calculator_server::{Calculator, CalculatorServer};
use crate::dispatch::proto::{ResultRequest, ResultResponse, TaskRequest, TaskResponse};
use crate::error::DatabaseError;
use crate::store::Database;
use crate::tasks::Task;

/// Hands pending tasks to workers and records their results.
#[derive(Clone)]
pub struct CalculatorService {
    store: Arc<dyn Database>,
    lease: chrono::Duration,
}

impl CalculatorService {
    pub fn new(store: Arc<dyn Database>, lease: chrono::Duration) -> Self {
        Self { store, lease }
    }

    pub fn into_server(self) -> CalculatorServer<Self> {
        CalculatorServer::new(self)
    }
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        if task.operation.is_empty() {
            TaskResponse {
                id: task.id,
                expression: task.expression,
                ..Default::default()
            }
        } else {
            TaskResponse {
                id: task.id,
                arg1: task.arg1,
                arg2: task.arg2,
                operation: task.operation,
                expression: String::new(),
            }
        }
    }
}

fn status_from(err: DatabaseError) -> Status {
    match err {
        DatabaseError::NotFound { entity, id } => {
            Status::not_found(format!("{entity} {id} not found"))
        }
        other => {
            error!(error = %other, "Dispatch storage failure");
            Status::internal("storage failure")
        }
    }
}

#[tonic::async_trait]
impl Calculator for CalculatorService {
    async fn get_task(
        &self,
        _request: Request<TaskRequest>,
    ) -> Result<Response<TaskResponse>, Status> {
        let claimed = self
            .store
            .claim_oldest_pending(self.lease)
            .await
            .map_err(status_from)?;

        let response = match claimed {
            Some(task) => {
                info!(task_id = %task.id, "Task dispatched to worker");
                TaskResponse::from(task)
            }
            None => TaskResponse::default(),
        };
        Ok(Response::new(response))
    }

    async fn submit_result(
        &self,
        request: Request<ResultRequest>,
    ) -> Result<Response<ResultResponse>, Status> {
        let ResultRequest { id, result } = request.into_inner();
        if id.is_empty() {
            return Err(Status::invalid_argument("task id is required"));
        }
        if !result.is_finite() {
            warn!(task_id = %id, result, "Non-finite result rejected");
            return Err(Status::invalid_argument("result must be a finite number"));
        }

        self.store.complete_task(&id, result).await.map_err(|e| {
            warn!(task_id = %id, error = %e, "Result rejected");
            status_from(e)
        })?;

        info!(task_id = %id, result, "Task result recorded");
        Ok(Response::new(ResultResponse { success: true }))
    }
}
