//! Built-in executors for common graph shapes.

use serde_json::Value;

use crate::message::{kinds, Input, Message};
use crate::traits::WorkflowContext;
use crate::{Executor, NodeError};

/// Re-broadcasts whatever it receives on all of its outgoing edges (fan-out head).
pub fn dispatcher(id: impl Into<String>) -> Executor {
    Executor::new(id).on_fn(kinds::ANY, |input: Input, ctx: WorkflowContext| async move {
        for message in input.into_messages() {
            ctx.forward(&message);
        }
        Ok(())
    })
}

/// Fan-in tail: joins a batch into one text output, in the order received.
///
/// Each section is headed by the producing executor's id.
pub fn concat_aggregator(id: impl Into<String>) -> Executor {
    Executor::new(id).on_batch_fn(kinds::ANY, |input: Input, ctx: WorkflowContext| async move {
        let sections: Vec<String> = input
            .into_messages()
            .iter()
            .map(|message| format!("[{}]\n{}", message.origin(), section_text(message)))
            .collect();
        ctx.yield_output(Value::String(sections.join("\n\n")));
        Ok(())
    })
}

/// Forwards every message unchanged. Stands in for real executors when only
/// the topology matters.
pub fn passthrough(id: impl Into<String>) -> Executor {
    let forward = |input: Input, ctx: WorkflowContext| async move {
        for message in input.into_messages() {
            ctx.forward(&message);
        }
        Ok::<(), NodeError>(())
    };
    Executor::new(id)
        .on_fn(kinds::ANY, forward)
        .on_batch_fn(kinds::ANY, forward)
}

/// Text carried by `message`: the `data` of a worker result, or the payload.
pub fn section_text(message: &Message) -> String {
    let value = match message.kind() {
        kinds::WORKER_RESULT => message.payload().get("data").unwrap_or(message.payload()),
        _ => message.payload(),
    };
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
