//! Orchestrator bootstrap: storage, HTTP and gRPC listeners, lease sweeper.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use crate::api::{self, AppState};
use crate::auth::JwtService;
use crate::config::ServerConfig;
use crate::dispatch::CalculatorService;
use crate::runtime::wait_for_shutdown;
use crate::store::{Database, LibSqlBackend};
use crate::tasks::spawn_lease_sweeper;

/// Open the configured database.
pub async fn open_store(config: &ServerConfig) -> Result<Arc<dyn Database>> {
    let store = if config.db_path.as_os_str() == ":memory:" {
        LibSqlBackend::new_memory().await
    } else {
        LibSqlBackend::new_local(&config.db_path).await
    }
    .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;
    Ok(Arc::new(store))
}

/// Bound but not yet serving orchestrator.
pub struct Orchestrator {
    config: ServerConfig,
    store: Arc<dyn Database>,
    http_listener: TcpListener,
    grpc_listener: TcpListener,
}

impl Orchestrator {
    /// Open storage from the configuration and bind both listeners.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let store = open_store(&config).await?;
        Self::bind_with_store(config, store).await
    }

    /// Bind both listeners over an already opened store.
    pub async fn bind_with_store(config: ServerConfig, store: Arc<dyn Database>) -> Result<Self> {
        let http_listener = TcpListener::bind(config.http_addr)
            .await
            .with_context(|| format!("failed to bind http listener on {}", config.http_addr))?;
        let grpc_listener = TcpListener::bind(config.grpc_addr)
            .await
            .with_context(|| format!("failed to bind grpc listener on {}", config.grpc_addr))?;

        Ok(Self {
            config,
            store,
            http_listener,
            grpc_listener,
        })
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        self.http_listener
            .local_addr()
            .context("http listener has no local address")
    }

    pub fn grpc_addr(&self) -> Result<SocketAddr> {
        self.grpc_listener
            .local_addr()
            .context("grpc listener has no local address")
    }

    /// Serve until `shutdown` fires, then drain both servers.
    pub async fn serve(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let http_addr = self.http_addr()?;
        let grpc_addr = self.grpc_addr()?;
        let Self {
            config,
            store,
            http_listener,
            grpc_listener,
        } = self;

        let state = AppState {
            db: Arc::clone(&store),
            jwt: Arc::new(JwtService::new(&config.jwt_secret, config.jwt_ttl)),
            bcrypt_cost: config.bcrypt_cost,
        };
        let app = api::router(state);
        let service = CalculatorService::new(Arc::clone(&store), config.task_lease);

        info!(%http_addr, %grpc_addr, "calc-dispatch listening");

        let http_task: JoinHandle<Result<()>> = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                axum::serve(http_listener, app)
                    .with_graceful_shutdown(wait_for_shutdown(shutdown))
                    .await
                    .context("http server failed")
            }
        });

        let grpc_task: JoinHandle<Result<()>> = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                Server::builder()
                    .add_service(service.into_server())
                    .serve_with_incoming_shutdown(
                        TcpListenerStream::new(grpc_listener),
                        wait_for_shutdown(shutdown),
                    )
                    .await
                    .context("grpc server failed")
            }
        });

        let sweeper = spawn_lease_sweeper(store, config.lease_sweep_interval, shutdown);

        tokio::try_join!(flatten(http_task), flatten(grpc_task))?;
        sweeper.await.context("lease sweeper panicked")?;

        info!("calc-dispatch stopped");
        Ok(())
    }
}

async fn flatten(task: JoinHandle<Result<()>>) -> Result<()> {
    task.await.context("server task panicked")?
}

/// Run both servers and the sweeper until `shutdown` fires.
pub async fn run_servers(config: ServerConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    Orchestrator::bind(config).await?.serve(shutdown).await
}
