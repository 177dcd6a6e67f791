//! The immutable, validated workflow graph.

use std::collections::HashMap;
use std::sync::Arc;

use nodes::Executor;

use crate::models::{BackEdge, Edge, EdgeKind, Topology};

/// A validated collection of executors and edges with one start executor.
///
/// Only [`WorkflowBuilder::build`](crate::WorkflowBuilder::build) creates
/// graphs, and nothing mutates one afterwards. Executors and edges keep
/// their declaration order.
#[derive(Debug)]
pub struct Graph {
    pub(crate) start_id: String,
    pub(crate) executors: Vec<Arc<Executor>>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) back_edges: Vec<BackEdge>,
    pub(crate) order: Vec<String>,
    pub(crate) output_is_terminal: bool,
}

impl Graph {
    pub fn start_id(&self) -> &str {
        &self.start_id
    }

    pub fn executor(&self, id: &str) -> Option<&Arc<Executor>> {
        self.index.get(id).map(|&i| &self.executors[i])
    }

    /// Executors in declaration order.
    pub fn executors(&self) -> impl Iterator<Item = &Executor> {
        self.executors.iter().map(Arc::as_ref)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn back_edges(&self) -> &[BackEdge] {
        &self.back_edges
    }

    pub fn is_back_edge(&self, from: &str, to: &str) -> bool {
        self.back_edges.iter().any(|b| b.from == from && b.to == to)
    }

    /// Executor ids in a topological order of the acyclic part of the graph.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// Whether the first yielded output ends the run.
    pub fn output_is_terminal(&self) -> bool {
        self.output_is_terminal
    }

    /// Data edges leaving `id`, with their index into [`Graph::edges`].
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = (usize, &'a Edge)> + 'a {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, edge)| edge.kind != EdgeKind::Error && edge.has_source(id))
    }

    /// Targets of the error edges leaving `id`.
    pub fn error_targets<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |edge| edge.kind == EdgeKind::Error && edge.has_source(id))
            .flat_map(|edge| edge.targets.iter().map(String::as_str))
    }

    /// The structure of this graph, without executor behaviour.
    pub fn topology(&self) -> Topology {
        Topology {
            start: self.start_id.clone(),
            executors: self.executors().map(|e| e.id().to_owned()).collect(),
            edges: self.edges.clone(),
            back_edges: self.back_edges.clone(),
            output_is_terminal: self.output_is_terminal,
        }
    }
}
