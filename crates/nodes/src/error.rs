//! Node-level error types.

use thiserror::Error;

use crate::message::HandlerKey;

/// Errors returned by a handler invocation.
///
/// The engine never retries any of these. A failure is either routed along
/// the executor's error edge or reported once the run settles.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// The handler reported a failure.
    #[error("{0}")]
    Failed(String),

    /// No entry in the dispatch table matches the delivered input.
    #[error("executor '{executor}' has no handler for {key}")]
    NoHandler { executor: String, key: HandlerKey },

    /// The handler was given a payload it cannot interpret.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A targeted send named an executor not connected to the sender.
    #[error("'{sender}' has no edge to '{target}'")]
    UnroutableTarget { sender: String, target: String },

    /// The handler panicked; the panic was contained at the engine boundary.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Errors returned by a [`Worker`](crate::Worker).
///
/// The variant decides retry behaviour inside
/// [`WorkerExecutor`](crate::worker::WorkerExecutor):
/// - `Retryable` — re-invoked with exponential back-off.
/// - `Fatal`     — reported immediately.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkerError {
    /// Transient failure; the worker may be re-invoked.
    #[error("retryable worker error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal worker error: {0}")]
    Fatal(String),
}
