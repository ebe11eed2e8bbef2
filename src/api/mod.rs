//! HTTP surface: user registration, login, synchronous evaluation, and the
//! task endpoints that feed remote workers.

pub mod calculate;
pub mod error;
pub mod tasks;
pub mod users;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::auth::JwtService;
use crate::store::Database;

pub use error::ApiError;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub jwt: Arc<JwtService>,
    /// bcrypt work factor for new passwords.
    pub bcrypt_cost: u32,
}

/// Build the Axum router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/calculate", post(calculate::calculate))
        .route(
            "/api/v1/tasks",
            post(tasks::create_task).get(tasks::list_tasks),
        )
        .route("/api/v1/tasks/{id}", get(tasks::get_task))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/register", post(users::register))
        .route("/api/v1/login", post(users::login))
        .merge(protected)
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Resolve the caller from `Authorization` and stash it for the handler.
async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let user = state.jwt.authenticate(header).inspect_err(|e| {
        debug!(error = %e, path = %req.uri().path(), "Rejected unauthenticated request");
    })?;
    debug!(user_id = user.user_id, login = %user.login, "Request authenticated");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request as HttpRequest, StatusCode};
    use chrono::Duration;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::store::MemoryStore;

    fn test_state() -> AppState {
        AppState {
            db: Arc::new(MemoryStore::new()),
            jwt: Arc::new(JwtService::new(
                &SecretString::from("test-secret"),
                Duration::hours(1),
            )),
            bcrypt_cost: 4,
        }
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register_and_login(app: &Router, login: &str) -> String {
        let creds = json!({ "login": login, "password": "pw" });
        let (status, _) =
            send(app, Method::POST, "/api/v1/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(app, Method::POST, "/api/v1/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(test_state());
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_rules() {
        let app = router(test_state());
        register_and_login(&app, "alice").await;

        let creds = json!({ "login": "alice", "password": "other" });
        let (status, body) = send(&app, Method::POST, "/api/v1/register", None, Some(creds)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());

        let empty = json!({ "login": "", "password": "pw" });
        let (status, _) = send(&app, Method::POST, "/api/v1/register", None, Some(empty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&app, Method::POST, "/api/v1/register", None, Some(json!("nope"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request format");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let app = router(test_state());
        register_and_login(&app, "alice").await;

        let wrong = json!({ "login": "alice", "password": "wrong" });
        let (status, body) = send(&app, Method::POST, "/api/v1/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");

        let unknown = json!({ "login": "mallory", "password": "pw" });
        let (status, _) = send(&app, Method::POST, "/api/v1/login", None, Some(unknown)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn calculate_requires_token() {
        let app = router(test_state());
        let expr = json!({ "expression": "1+1" });
        let (status, body) =
            send(&app, Method::POST, "/api/v1/calculate", None, Some(expr.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing token");

        let (status, body) =
            send(&app, Method::POST, "/api/v1/calculate", Some("forged"), Some(expr)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn calculate_evaluates_and_rejects() {
        let app = router(test_state());
        let token = register_and_login(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/calculate",
            Some(&token),
            Some(json!({ "expression": "3+4*2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"].as_f64(), Some(11.0));

        for bad in ["2/0", "(2+2", "2+a", ""] {
            let (status, body) = send(
                &app,
                Method::POST,
                "/api/v1/calculate",
                Some(&token),
                Some(json!({ "expression": bad })),
            )
            .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{bad}");
            assert!(body["error"].is_string());
        }

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/calculate",
            Some(&token),
            Some(json!({ "formula": "1+1" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, Method::GET, "/api/v1/calculate", Some(&token), None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn out_of_range_expressions_are_unprocessable() {
        let app = router(test_state());
        let token = register_and_login(&app, "alice").await;

        let huge = format!("1{}", "0".repeat(400));
        let big = format!("1{}", "0".repeat(300));
        for expr in [format!("{huge}-{huge}"), format!("{big}*{big}")] {
            for path in ["/api/v1/calculate", "/api/v1/tasks"] {
                let (status, body) = send(
                    &app,
                    Method::POST,
                    path,
                    Some(&token),
                    Some(json!({ "expression": expr })),
                )
                .await;
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{path}");
                assert!(body["error"].is_string());
            }
        }

        let (_, listing) = send(&app, Method::GET, "/api/v1/tasks", Some(&token), None).await;
        assert_eq!(listing["tasks"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn tasks_are_private_to_their_owner() {
        let app = router(test_state());
        let alice = register_and_login(&app, "alice").await;
        let bob = register_and_login(&app, "bob").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&alice),
            Some(json!({ "expression": "6 * 7" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/tasks/{id}");
        let (status, body) = send(&app, Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["arg1"], "6");
        assert_eq!(body["operation"], "*");

        let (status, _) = send(&app, Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, listing) = send(&app, Method::GET, "/api/v1/tasks", Some(&bob), None).await;
        assert_eq!(listing["tasks"].as_array().unwrap().len(), 0);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/tasks",
            Some(&alice),
            Some(json!({ "expression": "1/0" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let app = router(test_state());
        let (status, body) = send(&app, Method::GET, "/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }
}
