//! Engine-level error types.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::events::{HandlerFailure, RunStatus};

/// Errors raised by [`WorkflowBuilder::build`](crate::WorkflowBuilder::build).
///
/// Construction is all-or-nothing: any of these means no graph was produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No start executor was designated.
    #[error("no start executor was set")]
    MissingStart,

    /// The designated start executor was never added.
    #[error("start executor '{0}' is not part of the graph")]
    UnknownStart(String),

    /// Two or more executors share the same ID.
    #[error("duplicate executor ID: '{0}'")]
    DuplicateExecutor(String),

    /// The start executor is the target of an edge.
    #[error("start executor '{start}' has an incoming edge: {edge}")]
    StartHasIncoming { start: String, edge: String },

    /// An edge references an executor ID that doesn't exist in the graph.
    #[error("edge {edge} references unknown executor '{node_id}'")]
    UnknownEndpoint { edge: String, node_id: String },

    /// An edge without a source or a target.
    #[error("edge {0} has no source or no target")]
    EmptyEdge(String),

    /// A fan-in edge needs at least two distinct sources.
    #[error("fan-in edge {edge} needs at least 2 distinct sources, found {count}")]
    FanInTooFewSources { edge: String, count: usize },

    /// A fan-in edge must name exactly one target.
    #[error("fan-in edge {edge} needs exactly 1 target, found {count}")]
    FanInTargetCount { edge: String, count: usize },

    /// A second fan-in edge into the same target would split its barrier.
    #[error("fan-in target '{target}' already has a fan-in edge; {edge} must be merged into it")]
    DuplicateFanIn { target: String, edge: String },

    /// A non-fan-in edge reaches a fan-in target and would skip its barrier.
    #[error("fan-in target '{target}' is also reached by {edge}")]
    FanInBypassed { target: String, edge: String },

    /// The same source/target pair is connected more than once.
    #[error("'{from}' is connected to '{to}' more than once")]
    DuplicateEdge { from: String, to: String },

    /// A back-edge was whitelisted for a connection that doesn't exist.
    #[error("back-edge '{from}' -> '{to}' does not match any edge")]
    UnknownBackEdge { from: String, to: String },

    /// The edges (minus whitelisted back-edges) contain a cycle.
    #[error("graph contains a cycle through: {}", .nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    /// An executor cannot be reached from the start executor.
    #[error("executor '{0}' is not reachable from the start executor")]
    Unreachable(String),

    /// An executor lacks a handler of the shape its incoming edges deliver.
    #[error("executor '{executor}' has no {shape} handler")]
    MissingHandler {
        executor: String,
        shape: &'static str,
    },
}

/// Run-level failures. Each terminates the whole run and is reported once.
///
/// Cancellation is not an error; it ends in
/// [`RunStatus::Cancelled`](crate::RunStatus::Cancelled).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RunError {
    /// Handler failures that no error edge picked up. Sibling branches ran to
    /// completion; their outputs are kept.
    #[error("{} unhandled handler failure(s): {}", .failures.len(), summarize(.failures))]
    HandlerFailed {
        failures: Vec<HandlerFailure>,
        outputs: Vec<Value>,
    },

    /// A fan-in barrier can never complete. `causes` holds the handler
    /// failures that no error edge picked up, usually the missing source's.
    #[error(
        "fan-in target '{target}' is starved; missing sources: {}{}",
        .missing.join(", "),
        caused_by(.causes)
    )]
    Starved {
        target: String,
        missing: Vec<String>,
        received: Vec<String>,
        causes: Vec<HandlerFailure>,
    },

    /// The run deadline elapsed with work still in flight.
    #[error("run timed out after {after:?}; still running: {}", .running.join(", "))]
    TimedOut { after: Duration, running: Vec<String> },

    /// A single invocation exceeded its executor timeout.
    #[error("executor '{node_id}' timed out after {after:?}")]
    ExecutorTimedOut { node_id: String, after: Duration },

    /// The delivery budget of a looping graph was exhausted.
    #[error("run exceeded {limit} deliveries")]
    DeliveryLimit { limit: usize },

    /// The run task itself died.
    #[error("run aborted: {0}")]
    Aborted(String),
}

impl RunError {
    /// The terminal status this error is reported under.
    pub fn status(&self) -> RunStatus {
        match self {
            RunError::Starved { .. } => RunStatus::Starved,
            RunError::TimedOut { .. } | RunError::ExecutorTimedOut { .. } => RunStatus::TimedOut,
            RunError::HandlerFailed { .. }
            | RunError::DeliveryLimit { .. }
            | RunError::Aborted(_) => RunStatus::Failed,
        }
    }
}

fn summarize(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn caused_by(causes: &[HandlerFailure]) -> String {
    if causes.is_empty() {
        String::new()
    } else {
        format!("; caused by {}", summarize(causes))
    }
}
