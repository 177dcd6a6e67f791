//! Graph validation — run by `WorkflowBuilder::build` before a graph exists.
//!
//! Rules enforced, in order:
//! 1. Executor IDs must be unique and the start executor must exist.
//! 2. The start executor has no incoming edges.
//! 3. Every edge endpoint references a known executor.
//! 4. Edges are well-formed: non-empty, fan-in edges have ≥2 distinct
//!    sources and one target, no source/target pair is connected twice, and
//!    every whitelisted back-edge matches a real connection.
//! 5. A fan-in target is fed by exactly one fan-in edge and by nothing else,
//!    so its barrier sees every message addressed to it.
//! 6. The graph minus whitelisted back-edges is acyclic (topological sort
//!    must succeed).
//! 7. Every executor is reachable from the start executor.
//! 8. Every executor can accept what its incoming edges deliver.
//!
//! Returns a topologically-sorted list of executor IDs on success.

use std::collections::{HashMap, HashSet, VecDeque};

use nodes::Executor;

use crate::error::BuildError;
use crate::models::{BackEdge, Edge, EdgeKind};

/// Validate a graph description and return executors in topological order.
///
/// Ties are broken by declaration order, so the result is deterministic.
///
/// # Errors
/// The first [`BuildError`] encountered, following the rule order above.
pub fn validate_graph(
    start: Option<&str>,
    executors: &[Executor],
    edges: &[Edge],
    back_edges: &[BackEdge],
) -> Result<Vec<String>, BuildError> {
    // -----------------------------------------------------------------------
    // 1. Unique IDs, known start
    // -----------------------------------------------------------------------
    let mut node_set: HashSet<&str> = HashSet::new();
    for executor in executors {
        if !node_set.insert(executor.id()) {
            return Err(BuildError::DuplicateExecutor(executor.id().to_owned()));
        }
    }

    let start = start.ok_or(BuildError::MissingStart)?;
    if !node_set.contains(start) {
        return Err(BuildError::UnknownStart(start.to_owned()));
    }

    // -----------------------------------------------------------------------
    // 2. Start has no incoming edges
    // -----------------------------------------------------------------------
    if let Some(edge) = edges.iter().find(|e| e.has_target(start)) {
        return Err(BuildError::StartHasIncoming {
            start: start.to_owned(),
            edge: edge.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // 3. Edge endpoints exist
    // -----------------------------------------------------------------------
    for edge in edges {
        if let Some(unknown) = edge
            .sources
            .iter()
            .chain(&edge.targets)
            .find(|id| !node_set.contains(id.as_str()))
        {
            return Err(BuildError::UnknownEndpoint {
                edge: edge.to_string(),
                node_id: unknown.clone(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // 4. Edge shape
    // -----------------------------------------------------------------------
    let mut connected: HashSet<(&str, &str)> = HashSet::new();
    for edge in edges {
        if edge.sources.is_empty() || edge.targets.is_empty() {
            return Err(BuildError::EmptyEdge(edge.to_string()));
        }
        if edge.kind == EdgeKind::FanIn {
            let distinct: HashSet<&String> = edge.sources.iter().collect();
            if distinct.len() < 2 || distinct.len() != edge.sources.len() {
                return Err(BuildError::FanInTooFewSources {
                    edge: edge.to_string(),
                    count: distinct.len(),
                });
            }
            if edge.targets.len() != 1 {
                return Err(BuildError::FanInTargetCount {
                    edge: edge.to_string(),
                    count: edge.targets.len(),
                });
            }
        }
        for (from, to) in edge.pairs() {
            if !connected.insert((from, to)) {
                return Err(BuildError::DuplicateEdge {
                    from: from.to_owned(),
                    to: to.to_owned(),
                });
            }
        }
    }

    let mut allowed: HashSet<(&str, &str)> = HashSet::new();
    for back in back_edges {
        let pair = (back.from.as_str(), back.to.as_str());
        if !connected.contains(&pair) {
            return Err(BuildError::UnknownBackEdge {
                from: back.from.clone(),
                to: back.to.clone(),
            });
        }
        allowed.insert(pair);
    }

    // -----------------------------------------------------------------------
    // 5. One barrier per fan-in target, and no way around it
    // -----------------------------------------------------------------------
    let mut fan_in_targets: HashSet<&str> = HashSet::new();
    for edge in edges.iter().filter(|e| e.kind == EdgeKind::FanIn) {
        let target = edge.targets[0].as_str();
        if !fan_in_targets.insert(target) {
            return Err(BuildError::DuplicateFanIn {
                target: target.to_owned(),
                edge: edge.to_string(),
            });
        }
    }
    for edge in edges.iter().filter(|e| e.kind != EdgeKind::FanIn) {
        if let Some(target) = edge
            .targets
            .iter()
            .find(|t| fan_in_targets.contains(t.as_str()))
        {
            return Err(BuildError::FanInBypassed {
                target: target.clone(),
                edge: edge.to_string(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // 6. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for executor in executors {
        adjacency.entry(executor.id()).or_default();
        in_degree.entry(executor.id()).or_insert(0);
    }

    for edge in edges {
        for pair in edge.pairs() {
            if allowed.contains(&pair) {
                continue;
            }
            let (from, to) = pair;
            adjacency.entry(from).or_default().push(to);
            *in_degree.entry(to).or_insert(0) += 1;
        }
    }

    // Seed the queue with executors that have no incoming edges, in declaration order.
    let mut queue: VecDeque<&str> = executors
        .iter()
        .map(Executor::id)
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(executors.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    // If we didn't visit every executor the graph contains a cycle.
    if sorted.len() != executors.len() {
        let nodes = executors
            .iter()
            .map(Executor::id)
            .filter(|id| in_degree[id] > 0)
            .map(str::to_owned)
            .collect();
        return Err(BuildError::CycleDetected { nodes });
    }

    // -----------------------------------------------------------------------
    // 7. Reachability from start (back-edges included)
    // -----------------------------------------------------------------------
    let mut reachable: HashSet<&str> = HashSet::from([start]);
    let mut frontier: VecDeque<&str> = VecDeque::from([start]);
    while let Some(node_id) = frontier.pop_front() {
        for edge in edges.iter().filter(|e| e.has_source(node_id)) {
            for target in &edge.targets {
                if reachable.insert(target.as_str()) {
                    frontier.push_back(target.as_str());
                }
            }
        }
    }

    if let Some(orphan) = executors.iter().find(|e| !reachable.contains(e.id())) {
        return Err(BuildError::Unreachable(orphan.id().to_owned()));
    }

    // -----------------------------------------------------------------------
    // 8. Handler shapes
    // -----------------------------------------------------------------------
    let by_id: HashMap<&str, &Executor> = executors.iter().map(|e| (e.id(), e)).collect();
    let missing = |id: &str, shape: &'static str| BuildError::MissingHandler {
        executor: id.to_owned(),
        shape,
    };

    if !by_id[start].accepts_single() {
        return Err(missing(start, "single-message"));
    }
    for edge in edges {
        for target in &edge.targets {
            let executor = by_id[target.as_str()];
            match edge.kind {
                EdgeKind::FanIn if !executor.accepts_batch() => {
                    return Err(missing(target, "batch"));
                }
                EdgeKind::Direct | EdgeKind::FanOut | EdgeKind::Error
                    if !executor.accepts_single() =>
                {
                    return Err(missing(target, "single-message"));
                }
                _ => {}
            }
        }
    }

    Ok(sorted)
}
