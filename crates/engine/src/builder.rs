//! `WorkflowBuilder` — declares executors and edges, then validates them
//! into a [`Graph`] in one step.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use nodes::Executor;

use crate::dag::validate_graph;
use crate::error::BuildError;
use crate::graph::Graph;
use crate::models::{BackEdge, Edge, Topology};

/// Collects a graph description. Nothing is checked until [`build`](Self::build).
///
/// ```ignore
/// let graph = WorkflowBuilder::new()
///     .add_executor(dispatcher("dispatcher"))
///     .add_executor(research)
///     .add_executor(marketing)
///     .add_executor(concat_aggregator("aggregator"))
///     .set_start("dispatcher")
///     .add_fan_out_edges("dispatcher", ["research", "marketing"])
///     .add_fan_in_edges(["research", "marketing"], "aggregator")
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    start: Option<String>,
    executors: Vec<Executor>,
    edges: Vec<Edge>,
    back_edges: Vec<BackEdge>,
    output_is_terminal: bool,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph description from `topology`, asking `factory` for the
    /// executor behind each id.
    pub fn from_topology(topology: Topology, mut factory: impl FnMut(&str) -> Executor) -> Self {
        Self {
            start: Some(topology.start),
            executors: topology.executors.iter().map(|id| factory(id)).collect(),
            edges: topology.edges,
            back_edges: topology.back_edges,
            output_is_terminal: topology.output_is_terminal,
        }
    }

    pub fn add_executor(mut self, executor: Executor) -> Self {
        self.executors.push(executor);
        self
    }

    pub fn set_start(mut self, id: impl Into<String>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Add `executor` and make it the start executor.
    pub fn set_start_executor(self, executor: Executor) -> Self {
        let id = executor.id().to_owned();
        self.add_executor(executor).set_start(id)
    }

    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.push_edge(Edge::direct(from, to))
    }

    pub fn add_fan_out_edges<I, S>(self, from: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_edge(Edge::fan_out(from, targets))
    }

    /// `target` fires once per wave, after every one of `sources` reported,
    /// and sees the batch in the order given here.
    pub fn add_fan_in_edges<I, S>(self, sources: I, target: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_edge(Edge::fan_in(sources, target))
    }

    /// Route handler failures of `from` to `to` as `error` messages.
    pub fn add_error_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.push_edge(Edge::error(from, to))
    }

    /// Exclude the existing connection `from -> to` from cycle detection.
    pub fn allow_back_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.back_edges.push(BackEdge {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// End the run as soon as the first output is yielded.
    pub fn output_is_terminal(mut self, terminal: bool) -> Self {
        self.output_is_terminal = terminal;
        self
    }

    /// Validate and freeze the graph.
    ///
    /// # Errors
    /// Any [`BuildError`]; see [`validate_graph`] for the check order.
    pub fn build(self) -> Result<Graph, BuildError> {
        let order = validate_graph(
            self.start.as_deref(),
            &self.executors,
            &self.edges,
            &self.back_edges,
        )?;
        debug!(executors = self.executors.len(), edges = self.edges.len(), "graph validated");

        let start_id = self.start.unwrap_or_default();
        let executors: Vec<Arc<Executor>> = self.executors.into_iter().map(Arc::new).collect();
        let index: HashMap<String, usize> = executors
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id().to_owned(), i))
            .collect();

        Ok(Graph {
            start_id,
            executors,
            index,
            edges: self.edges,
            back_edges: self.back_edges,
            order,
            output_is_terminal: self.output_is_terminal,
        })
    }

    fn push_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}
