//! `MockWorker` — a test double for [`Worker`].
//!
//! Useful in unit and integration tests, and for the offline demo, where a
//! real worker (scraper, model client) is either unavailable or irrelevant.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Worker, WorkerError};

/// Behaviour injected into `MockWorker` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Sleep, then return the value.
    Delayed(Duration, Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
    /// Never return.
    Hang,
}

/// A mock worker that records every query it receives and returns a
/// programmer-specified result.
pub struct MockWorker {
    /// Label used in results and test assertions.
    pub name: String,
    /// What the worker will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All queries seen by this worker (in call order).
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockWorker {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that succeeds after `delay`.
    pub fn delayed(name: impl Into<String>, delay: Duration, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::Delayed(delay, value))
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailFatal(msg.into()))
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailRetryable(msg.into()))
    }

    /// Create a mock that never completes.
    pub fn hanging(name: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Hang)
    }

    /// Number of times this worker has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Worker for MockWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, query: &str) -> Result<Value, WorkerError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.to_owned());

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::Delayed(delay, v) => {
                tokio::time::sleep(*delay).await;
                Ok(v.clone())
            }
            MockBehaviour::FailRetryable(msg) => Err(WorkerError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(WorkerError::Fatal(msg.clone())),
            MockBehaviour::Hang => std::future::pending().await,
        }
    }
}
