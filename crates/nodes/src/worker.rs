//! The worker contract and its executor adapter.
//!
//! A [`Worker`] is an opaque data-fetching unit (a scraper, a model call, ...).
//! [`WorkerExecutor`] wraps one so it can sit in a graph:
//! 1. Accepts a `text` message and uses its payload as the query.
//! 2. Re-invokes the worker on `WorkerError::Retryable` up to
//!    `RetryPolicy::max_retries` times with exponential back-off.
//! 3. Broadcasts a `worker_result` message `{ "worker", "data" }` on success.
//! 4. Translates the final failure into `NodeError::Failed`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::message::{kinds, Input, Message};
use crate::traits::{Handler, WorkflowContext};
use crate::{Executor, NodeError, WorkerError};

/// An opaque callable taking a query and returning a domain payload.
///
/// Implementations must not panic across this boundary; internal faults are
/// reported as [`WorkerError`].
#[async_trait]
pub trait Worker: Send + Sync {
    /// Label used in results and logs.
    fn name(&self) -> &str;

    async fn execute(&self, query: &str) -> Result<Value, WorkerError>;
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Worker-level retry knobs. The engine itself never retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of times a retryable failure will be retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Longest wait between two attempts, however many retries came before.
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    /// Back-off before retry number `attempt` (1-based): `base_delay * 2^(attempt-1)`,
    /// capped at [`RetryPolicy::MAX_DELAY`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(Self::MAX_DELAY, |delay| delay.min(Self::MAX_DELAY))
    }

    /// Fail on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerExecutor
// ---------------------------------------------------------------------------

/// Handler that runs a [`Worker`] against the incoming query.
pub struct WorkerExecutor {
    worker: Arc<dyn Worker>,
    retry: RetryPolicy,
}

impl WorkerExecutor {
    pub fn new(worker: Arc<dyn Worker>, retry: RetryPolicy) -> Self {
        Self { worker, retry }
    }

    /// Build an executor with id `id` around `worker`.
    pub fn executor(id: impl Into<String>, worker: Arc<dyn Worker>, retry: RetryPolicy) -> Executor {
        Executor::new(id).on(kinds::TEXT, Self::new(worker, retry))
    }

    async fn execute_with_retry(&self, query: &str) -> Result<Value, NodeError> {
        let mut attempts = 0u32;

        loop {
            match self.worker.execute(query).await {
                Ok(data) => return Ok(data),

                Err(WorkerError::Fatal(msg)) => {
                    return Err(NodeError::Failed(format!(
                        "worker '{}' failed: {msg}",
                        self.worker.name()
                    )));
                }

                Err(WorkerError::Retryable(msg)) => {
                    attempts += 1;
                    if attempts > self.retry.max_retries {
                        return Err(NodeError::Failed(format!(
                            "worker '{}' exceeded retry limit: {msg}",
                            self.worker.name()
                        )));
                    }

                    let delay = self.retry.delay_for(attempts);

                    warn!(
                        "worker '{}' retryable error (attempt {}/{}), retrying in {:?}: {}",
                        self.worker.name(),
                        attempts,
                        self.retry.max_retries,
                        delay,
                        msg
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl Handler for WorkerExecutor {
    async fn handle(&self, input: Input, ctx: WorkflowContext) -> Result<(), NodeError> {
        let Input::Single(message) = input else {
            return Err(NodeError::InvalidPayload("worker expects a single query".into()));
        };
        let query = query_text(&message);

        debug!(worker = self.worker.name(), executor = ctx.executor_id(), "running worker");
        let data = self.execute_with_retry(&query).await?;

        ctx.send_message(
            kinds::WORKER_RESULT,
            json!({ "worker": self.worker.name(), "data": data }),
        );
        Ok(())
    }
}

fn query_text(message: &Message) -> String {
    match message.payload() {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
