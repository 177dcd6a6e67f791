//! Render a [`Graph`] as Mermaid flow notation and Graphviz DOT.
//!
//! Both renderings are pure and deterministic: executors are declared once
//! each in declaration order, then every edge contributes one connection line
//! per `(source, target)` pair in edge order. A fan-out therefore shows as
//! several lines sharing a source, a fan-in as several lines sharing a target.

use std::collections::{HashMap, HashSet};

use crate::graph::Graph;
use crate::models::EdgeKind;

/// Both diagram notations for one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagrams {
    pub mermaid: String,
    pub dot: String,
}

pub fn render(graph: &Graph) -> Diagrams {
    Diagrams {
        mermaid: to_mermaid(graph),
        dot: to_dot(graph),
    }
}

/// Mermaid flowchart (`graph TD`).
pub fn to_mermaid(graph: &Graph) -> String {
    let ids = mermaid_ids(graph);
    let mut out = String::from("graph TD\n");

    for executor in graph.executors() {
        out.push_str(&format!(
            "  {}[\"{}\"]\n",
            ids[executor.id()],
            escape_mermaid(&label(graph, executor.id()))
        ));
    }

    for edge in graph.edges() {
        for (from, to) in edge.pairs() {
            let arrow = match edge.kind {
                EdgeKind::Error => "-.->|error|",
                _ if graph.is_back_edge(from, to) => "-->|loop|",
                _ => "-->",
            };
            out.push_str(&format!("  {} {} {}\n", ids[from], arrow, ids[to]));
        }
    }

    out
}

/// Graphviz `digraph`.
pub fn to_dot(graph: &Graph) -> String {
    let mut out = String::from("digraph Workflow {\n");
    out.push_str("  rankdir=TB;\n");
    out.push_str("  node [shape=box, fontname=\"Helvetica\"];\n");
    out.push('\n');

    for executor in graph.executors() {
        let id = executor.id();
        let style = if id == graph.start_id() {
            ", style=bold"
        } else {
            ""
        };
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\"{}];\n",
            escape_dot(id),
            escape_dot(&label(graph, id)),
            style
        ));
    }

    out.push('\n');

    for edge in graph.edges() {
        for (from, to) in edge.pairs() {
            let attrs = match edge.kind {
                EdgeKind::Error => " [style=dashed, label=\"error\"]",
                _ if graph.is_back_edge(from, to) => " [label=\"loop\", constraint=false]",
                _ => "",
            };
            out.push_str(&format!(
                "  \"{}\" -> \"{}\"{};\n",
                escape_dot(from),
                escape_dot(to),
                attrs
            ));
        }
    }

    out.push_str("}\n");
    out
}

fn label(graph: &Graph, id: &str) -> String {
    if id == graph.start_id() {
        format!("{id} (Start)")
    } else {
        id.to_owned()
    }
}

/// Words Mermaid's flowchart grammar treats as keywords when used as node ids.
const MERMAID_KEYWORDS: [&str; 9] = [
    "end",
    "graph",
    "flowchart",
    "subgraph",
    "style",
    "class",
    "classdef",
    "click",
    "linkstyle",
];

/// Mermaid node identifiers: the executor id with unsafe characters replaced,
/// keywords prefixed with `n_`, and a numeric suffix added until the
/// identifier is unused.
fn mermaid_ids(graph: &Graph) -> HashMap<&str, String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut ids = HashMap::new();

    for executor in graph.executors() {
        let mut base: String = executor
            .id()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() || MERMAID_KEYWORDS.contains(&base.to_ascii_lowercase().as_str()) {
            base = format!("n_{base}");
        }

        let mut candidate = base.clone();
        let mut suffix = 1;
        while !taken.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        ids.insert(executor.id(), candidate);
    }
    ids
}

fn escape_mermaid(s: &str) -> String {
    s.replace('"', "#quot;")
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
