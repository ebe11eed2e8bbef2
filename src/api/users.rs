//! Registration and login.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::auth::{hash_password, verify_password};
use crate::error::AuthError;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(creds) = body.map_err(|_| ApiError::BadRequest("Invalid request format".into()))?;
    let login = creds.login.trim();
    if login.is_empty() || creds.password.is_empty() {
        return Err(ApiError::BadRequest(
            "login and password are required".into(),
        ));
    }

    let hash = hash_password(&creds.password, state.bcrypt_cost).await?;
    let user_id = state.db.create_user(login, &hash).await?;
    info!(user_id, login, "User registered");
    Ok(StatusCode::OK)
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(creds) = body.map_err(|_| ApiError::BadRequest("Invalid request format".into()))?;
    let login = creds.login.trim();

    let user = state
        .db
        .find_user_by_login(login)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(&creds.password, &user.password_hash).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.jwt.generate(user.id, &user.login)?;
    info!(user_id = user.id, "User logged in");
    Ok(Json(LoginResponse { token }))
}
