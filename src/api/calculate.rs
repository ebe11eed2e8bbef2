//! Synchronous expression evaluation.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::ApiError;
use crate::auth::AuthenticatedUser;
use crate::calculator;

#[derive(Debug, Deserialize)]
pub struct ExpressionRequest {
    pub expression: String,
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub result: f64,
}

pub async fn calculate(
    user: AuthenticatedUser,
    body: Result<Json<ExpressionRequest>, JsonRejection>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let Json(req) =
        body.map_err(|_| ApiError::Unprocessable("Invalid request format".into()))?;

    let result = calculator::calculate(&req.expression).inspect_err(|e| {
        let stage = if e.is_validation() { "validation" } else { "evaluation" };
        debug!(login = %user.login, stage, error = %e, "Expression rejected");
    })?;
    debug!(login = %user.login, expression = %req.expression, result, "Expression evaluated");
    Ok(Json(CalculateResponse { result }))
}
