//! Lifecycle events and run results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use nodes::NodeError;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
    TimedOut,
    Starved,
}

/// Streamed to the caller while a run is in progress, in a single total order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    NodeStarted { node_id: String },
    NodeCompleted { node_id: String },
    NodeFailed { node_id: String, error: String },
    OutputYielded { value: Value },
    /// Always the last event of a run.
    RunFinished { status: RunStatus },
}

/// A handler error that reached the run level.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFailure {
    pub node_id: String,
    pub error: NodeError,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.node_id, self.error)
    }
}

/// The result of a run that did not fail.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// `Completed` or `Cancelled`.
    pub status: RunStatus,
    /// Yielded outputs, in yield order.
    pub outputs: Vec<Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
