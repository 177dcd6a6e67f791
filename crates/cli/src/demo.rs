//! The product-launch demo graph: one dispatcher fans a prompt out to three
//! expert personas, and an aggregator joins their answers.
//!
//! The experts are offline `MockWorker`s with staggered delays, so the
//! aggregator visibly waits for the slowest one.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use engine::{BuildError, EdgeKind, Graph, Topology, WorkflowBuilder};
use nodes::builtin::{concat_aggregator, dispatcher, passthrough};
use nodes::mock::MockWorker;
use nodes::{Executor, RetryPolicy, WorkerExecutor};

pub const DISPATCHER: &str = "dispatcher";
pub const AGGREGATOR: &str = "aggregator";

/// `(id, delay in ms, canned answer)`; `{}` is replaced by the prompt.
const EXPERTS: [(&str, u64, &str); 3] = [
    (
        "researcher",
        400,
        "Market sizing for '{}': early adopters are price-tolerant; two incumbents, neither ships an offline mode.",
    ),
    (
        "marketer",
        250,
        "Positioning for '{}': lead with reliability, launch with a waitlist and a short demo video.",
    ),
    (
        "legal",
        600,
        "Compliance for '{}': review the privacy notice, trademark search pending, no export restrictions.",
    ),
];

/// Build the demo graph for `prompt`.
pub fn launch_graph(prompt: &str) -> Result<Graph, BuildError> {
    let ids: Vec<&str> = EXPERTS.iter().map(|(id, _, _)| *id).collect();

    let mut builder = WorkflowBuilder::new().set_start_executor(dispatcher(DISPATCHER));
    for (id, delay, answer) in EXPERTS {
        let worker = MockWorker::delayed(
            id,
            Duration::from_millis(delay),
            json!(answer.replace("{}", prompt)),
        );
        builder = builder.add_executor(WorkerExecutor::executor(
            id,
            Arc::new(worker),
            RetryPolicy::default(),
        ));
    }

    builder
        .add_executor(concat_aggregator(AGGREGATOR))
        .add_fan_out_edges(DISPATCHER, ids.clone())
        .add_fan_in_edges(ids, AGGREGATOR)
        .build()
}

/// Stand-in executors for a topology loaded from disk: fan-in targets
/// aggregate, everything else forwards.
pub fn placeholder_factory(topology: &Topology) -> impl FnMut(&str) -> Executor {
    let aggregators: Vec<String> = topology
        .edges
        .iter()
        .filter(|edge| edge.kind == EdgeKind::FanIn)
        .flat_map(|edge| edge.targets.iter().cloned())
        .collect();

    move |id: &str| {
        if aggregators.iter().any(|a| a == id) {
            concat_aggregator(id)
        } else {
            passthrough(id)
        }
    }
}
