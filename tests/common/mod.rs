//! Shared harness: a full orchestrator on random loopback ports.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use calc_dispatch::config::ServerConfig;
use calc_dispatch::server::Orchestrator;

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestServer {
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    pub shutdown: watch::Sender<bool>,
    pub handle: JoinHandle<anyhow::Result<()>>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let config = ServerConfig {
            http_addr: "127.0.0.1:0".parse().unwrap(),
            grpc_addr: "127.0.0.1:0".parse().unwrap(),
            db_path: ":memory:".into(),
            bcrypt_cost: 4,
            ..config
        };
        let orchestrator = Orchestrator::bind(config).await.unwrap();
        let http_addr = orchestrator.http_addr().unwrap();
        let grpc_addr = orchestrator.grpc_addr().unwrap();

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(orchestrator.serve(rx));

        // Give the servers a moment to start accepting connections.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            http_addr,
            grpc_addr,
            shutdown,
            handle,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.http_addr)
    }

    pub fn grpc_uri(&self) -> String {
        format!("http://{}", self.grpc_addr)
    }

    /// Register `login` with password `pw` and return a bearer token.
    pub async fn token_for(&self, login: &str) -> String {
        let creds = json!({ "login": login, "password": "pw" });
        let resp = self
            .client
            .post(self.url("/api/v1/register"))
            .json(&creds)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = self
            .client
            .post(self.url("/api/v1/login"))
            .json(&creds)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Submit an expression as an async task and return its id.
    pub async fn submit(&self, token: &str, expression: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/v1/tasks"))
            .bearer_auth(token)
            .json(&json!({ "expression": expression }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn task(&self, token: &str, id: &str) -> Value {
        let resp = self
            .client
            .get(self.url(&format!("/api/v1/tasks/{id}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    /// Stop both servers and wait for them to drain.
    pub async fn stop(self) {
        self.shutdown.send(true).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}
