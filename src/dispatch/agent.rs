//! Worker agent: polls the orchestrator, computes, and reports back.
//!
//! The loop never gives up on transport failures: it sleeps for the retry
//! backoff and tries again. It stops only when the shutdown signal fires.

use tokio::sync::watch;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

use crate::calculator::{apply_binary, evaluate};
use crate::config::AgentConfig;
use crate::dispatch::proto::calculator_client::CalculatorClient;
use crate::dispatch::proto::{ResultRequest, TaskRequest, TaskResponse};
use crate::error::{EvalError, TransportError};

/// What one poll round did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    /// No task was pending.
    Idle,
    /// A task was computed and its result submitted (or the submit failed).
    Handled,
    /// The task could not be computed; nothing was submitted.
    Skipped,
}

/// Compute the result for a dispatched task.
pub fn compute(task: &TaskResponse) -> Result<f64, EvalError> {
    if task.operation.is_empty() {
        evaluate(&task.expression)
    } else {
        apply_binary(&task.arg1, &task.operation, &task.arg2)
    }
}

/// A single worker process.
pub struct Agent {
    config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Connect once with a dial timeout.
    pub async fn connect(&self) -> Result<CalculatorClient<Channel>, TransportError> {
        let addr = &self.config.orchestrator_addr;
        let endpoint = Endpoint::from_shared(addr.clone())
            .map_err(|e| TransportError::InvalidAddress {
                addr: addr.clone(),
                reason: e.to_string(),
            })?
            .connect_timeout(self.config.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| TransportError::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        Ok(CalculatorClient::new(channel))
    }

    /// Run until `shutdown` flips to `true` (or its sender goes away).
    ///
    /// Only an unusable orchestrator address is fatal; every other failure
    /// is logged and retried.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        let mut client = loop {
            match self.connect().await {
                Ok(client) => break client,
                Err(e @ TransportError::InvalidAddress { .. }) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Orchestrator unreachable, retrying");
                    if sleep_or_shutdown(self.config.retry_backoff, &mut shutdown).await {
                        return Ok(());
                    }
                }
            }
        };
        info!(addr = %self.config.orchestrator_addr, "Agent connected");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.poll_once(&mut client).await {
                Ok(Round::Idle) => Some(self.config.idle_backoff),
                Ok(Round::Handled) => Some(self.config.pause),
                Ok(Round::Skipped) => None,
                Err(e) => {
                    warn!(error = %e, "Error getting task");
                    Some(self.config.retry_backoff)
                }
            };

            if let Some(delay) = delay {
                if sleep_or_shutdown(delay, &mut shutdown).await {
                    break;
                }
            }
        }

        info!("Agent stopped");
        Ok(())
    }

    /// Fetch one task, compute it, and submit the result.
    pub async fn poll_once(
        &self,
        client: &mut CalculatorClient<Channel>,
    ) -> Result<Round, TransportError> {
        let task = client.get_task(TaskRequest {}).await?.into_inner();
        if task.id.is_empty() {
            return Ok(Round::Idle);
        }

        let result = match compute(&task) {
            Ok(result) => result,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Calculation error");
                return Ok(Round::Skipped);
            }
        };

        let request = ResultRequest {
            id: task.id.clone(),
            result,
        };
        match client.submit_result(request).await {
            Ok(ack) if ack.get_ref().success => {
                debug!(task_id = %task.id, result, "Result submitted");
            }
            Ok(_) => warn!(task_id = %task.id, "Result not accepted"),
            Err(status) => {
                warn!(task_id = %task.id, error = %status, "Error submitting result");
            }
        }
        Ok(Round::Handled)
    }
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile.
async fn sleep_or_shutdown(
    delay: std::time::Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
