//! Serialisable description of a workflow graph's structure.
//!
//! These types carry no behaviour: a [`Topology`] is what
//! [`Graph::topology`](crate::Graph::topology) exports and what
//! [`WorkflowBuilder::from_topology`](crate::WorkflowBuilder::from_topology)
//! turns back into a graph once executors are supplied.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// How an edge moves messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// One source, one target.
    Direct,
    /// One source, every target receives its own copy.
    FanOut,
    /// Many sources, one target behind a barrier.
    FanIn,
    /// One source, one target; carries the source's handler failures.
    Error,
}

/// Directed connection between executors.
///
/// `Direct`, `FanOut` and `Error` edges have exactly one source; `FanIn` edges
/// have exactly one target. Order is significant: a fan-in target receives
/// its batch in `sources` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

impl Edge {
    pub fn direct(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind: EdgeKind::Direct,
            sources: vec![from.into()],
            targets: vec![to.into()],
        }
    }

    pub fn fan_out<I, S>(from: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: EdgeKind::FanOut,
            sources: vec![from.into()],
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fan_in<I, S>(sources: I, to: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: EdgeKind::FanIn,
            sources: sources.into_iter().map(Into::into).collect(),
            targets: vec![to.into()],
        }
    }

    pub fn error(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind: EdgeKind::Error,
            sources: vec![from.into()],
            targets: vec![to.into()],
        }
    }

    /// Every `(source, target)` pair this edge connects.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources.iter().flat_map(move |source| {
            self.targets
                .iter()
                .map(move |target| (source.as_str(), target.as_str()))
        })
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources.iter().any(|s| s == id)
    }

    pub fn has_target(&self, id: &str) -> bool {
        self.targets.iter().any(|t| t == id)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EdgeKind::Direct => "direct",
            EdgeKind::FanOut => "fan-out",
            EdgeKind::FanIn => "fan-in",
            EdgeKind::Error => "error",
        };
        write!(
            f,
            "{kind} [{}] -> [{}]",
            self.sources.join(", "),
            self.targets.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// BackEdge
// ---------------------------------------------------------------------------

/// A connection explicitly allowed to close a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackEdge {
    pub from: String,
    pub to: String,
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// The structure of a graph without its executors' behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub start: String,
    /// Executor ids in declaration order.
    pub executors: Vec<String>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub back_edges: Vec<BackEdge>,
    #[serde(default)]
    pub output_is_terminal: bool,
}
