//! End-to-end tests for the run engine.
//!
//! Workers are `MockWorker`s or small closure executors; timing-sensitive
//! tests run on a paused clock so multi-second timeouts finish instantly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use nodes::builtin::{concat_aggregator, dispatcher, passthrough};
use nodes::mock::MockWorker;
use nodes::{kinds, Executor, Input, Message, NodeError, RetryPolicy, WorkerExecutor, WorkflowContext};

use crate::{run, Graph, RunError, RunEvent, RunOptions, RunStatus, WorkflowBuilder};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// dispatcher → {research, marketing, legal} → aggregator
fn launch_graph(research: MockWorker, marketing: MockWorker, legal: MockWorker) -> Arc<Graph> {
    let expert = |id: &str, worker: MockWorker| {
        WorkerExecutor::executor(id, Arc::new(worker), RetryPolicy::none())
    };
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("dispatcher"))
        .add_executor(expert("research", research))
        .add_executor(expert("marketing", marketing))
        .add_executor(expert("legal", legal))
        .add_executor(concat_aggregator("aggregator"))
        .add_fan_out_edges("dispatcher", ["research", "marketing", "legal"])
        .add_fan_in_edges(["research", "marketing", "legal"], "aggregator")
        .build()
        .expect("valid graph");
    Arc::new(graph)
}

/// Yields `value` whenever it receives anything.
fn yielding(id: &str, value: Value) -> Executor {
    Executor::new(id).on_fn(kinds::ANY, move |_, ctx: WorkflowContext| {
        let value = value.clone();
        async move {
            ctx.yield_output(value);
            Ok(())
        }
    })
}

/// Sleeps, then forwards its input.
fn delayed_forward(id: &str, delay: Duration) -> Executor {
    Executor::new(id).on_fn(kinds::ANY, move |input: Input, ctx: WorkflowContext| async move {
        tokio::time::sleep(delay).await;
        for message in input.into_messages() {
            ctx.forward(&message);
        }
        Ok(())
    })
}

fn failing(id: &str, reason: &'static str) -> Executor {
    Executor::new(id).on_fn(kinds::ANY, move |_, _| async move {
        Err(NodeError::Failed(reason.to_owned()))
    })
}

fn started(node_id: &str) -> RunEvent {
    RunEvent::NodeStarted {
        node_id: node_id.to_owned(),
    }
}

fn completed(node_id: &str) -> RunEvent {
    RunEvent::NodeCompleted {
        node_id: node_id.to_owned(),
    }
}

fn position(events: &[RunEvent], wanted: &RunEvent) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not found in {events:?}"))
}

fn outputs_of(events: &[RunEvent]) -> Vec<Value> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::OutputYielded { value } => Some(value.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================
// End-to-end scenario
// ============================================================

#[tokio::test(start_paused = true)]
async fn launch_scenario_fans_out_and_aggregates_in_declared_order() {
    // Completion order: legal, research, marketing.
    let graph = launch_graph(
        MockWorker::delayed("research", Duration::from_millis(20), json!("R")),
        MockWorker::delayed("marketing", Duration::from_millis(30), json!("M")),
        MockWorker::delayed("legal", Duration::from_millis(10), json!("L")),
    );

    let handle = run(graph, Message::text("launch X"), RunOptions::default());
    let (events, result) = handle.collect().await;
    let outcome = result.expect("run should succeed");

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(
        outcome.outputs,
        vec![json!("[research]\nR\n\n[marketing]\nM\n\n[legal]\nL")]
    );

    let aggregator_started = position(&events, &started("aggregator"));
    for branch in ["research", "marketing", "legal"] {
        assert!(position(&events, &started(branch)) < position(&events, &completed(branch)));
        assert!(position(&events, &completed(branch)) < aggregator_started);
    }
    let starts = events
        .iter()
        .filter(|e| matches!(e, RunEvent::NodeStarted { node_id } if node_id == "aggregator"))
        .count();
    assert_eq!(starts, 1);

    assert_eq!(outputs_of(&events), outcome.outputs);
    assert_eq!(
        events.last(),
        Some(&RunEvent::RunFinished {
            status: RunStatus::Completed
        })
    );
}

#[tokio::test]
async fn events_can_be_consumed_while_the_run_is_in_progress() {
    let graph = launch_graph(
        MockWorker::returning("research", json!("R")),
        MockWorker::returning("marketing", json!("M")),
        MockWorker::returning("legal", json!("L")),
    );

    let mut handle = run(graph, Message::text("launch X"), RunOptions::default());
    let mut seen = Vec::new();
    while let Some(event) = handle.next_event().await {
        seen.push(event);
    }

    assert_eq!(seen.first(), Some(&started("dispatcher")));
    assert_eq!(outputs_of(&seen).len(), 1);
    assert!(handle.wait().await.is_ok());
}

// ============================================================
// Fan-in barrier
// ============================================================

#[tokio::test(start_paused = true)]
async fn fan_in_waits_for_the_slowest_source() {
    let aggregator_calls = Arc::new(AtomicUsize::new(0));
    let fired_early = Arc::new(AtomicBool::new(false));

    let calls = Arc::clone(&aggregator_calls);
    let aggregator = Executor::new("agg").on_batch_fn(kinds::ANY, move |input: Input, ctx: WorkflowContext| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            ctx.yield_output(json!(input.into_messages().len()));
            Ok(())
        }
    });

    let calls = Arc::clone(&aggregator_calls);
    let early = Arc::clone(&fired_early);
    let slow = Executor::new("c").on_fn(kinds::ANY, move |input: Input, ctx: WorkflowContext| {
        let calls = Arc::clone(&calls);
        let early = Arc::clone(&early);
        async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            // A and B reported long ago; the barrier must still be holding.
            if calls.load(Ordering::SeqCst) != 0 {
                early.store(true, Ordering::SeqCst);
            }
            for message in input.into_messages() {
                ctx.forward(&message);
            }
            Ok(())
        }
    });

    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(passthrough("a"))
        .add_executor(passthrough("b"))
        .add_executor(slow)
        .add_executor(aggregator)
        .add_fan_out_edges("start", ["a", "b", "c"])
        .add_fan_in_edges(["a", "b", "c"], "agg")
        .build()
        .unwrap();

    let outcome = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .wait()
        .await
        .unwrap();

    assert!(!fired_early.load(Ordering::SeqCst), "fan-in fired before all sources reported");
    assert_eq!(aggregator_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.outputs, vec![json!(3)]);
}

#[tokio::test(start_paused = true)]
async fn fan_in_batch_follows_declaration_order_not_completion_order() {
    let aggregator = Executor::new("agg").on_batch_fn(kinds::ANY, |input: Input, ctx: WorkflowContext| async move {
        let origins: Vec<String> = input
            .into_messages()
            .iter()
            .map(|m| m.origin().to_owned())
            .collect();
        ctx.yield_output(json!(origins));
        Ok(())
    });

    // C finishes first, A last.
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(delayed_forward("a", Duration::from_millis(300)))
        .add_executor(delayed_forward("b", Duration::from_millis(200)))
        .add_executor(delayed_forward("c", Duration::from_millis(100)))
        .add_executor(aggregator)
        .add_fan_out_edges("start", ["a", "b", "c"])
        .add_fan_in_edges(["a", "b", "c"], "agg")
        .build()
        .unwrap();

    let (events, result) = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .collect()
        .await;

    assert!(position(&events, &completed("c")) < position(&events, &completed("a")));
    assert_eq!(result.unwrap().outputs, vec![json!(["a", "b", "c"])]);
}

#[tokio::test]
async fn fan_in_over_four_sources_fires_once_with_all_of_them() {
    let aggregator = Executor::new("agg").on_batch_fn(kinds::ANY, |input: Input, ctx: WorkflowContext| async move {
        let origins: Vec<String> = input
            .into_messages()
            .iter()
            .map(|m| m.origin().to_owned())
            .collect();
        ctx.yield_output(json!(origins));
        Ok(())
    });

    let split = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(passthrough("a"))
        .add_executor(passthrough("b"))
        .add_executor(passthrough("c"))
        .add_executor(passthrough("d"))
        .add_executor(aggregator.clone())
        .add_fan_out_edges("start", ["a", "b", "c", "d"])
        .add_fan_in_edges(["a", "b"], "agg")
        .add_fan_in_edges(["c", "d"], "agg")
        .build();
    assert!(matches!(split, Err(crate::BuildError::DuplicateFanIn { .. })));

    let merged = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(passthrough("a"))
        .add_executor(passthrough("b"))
        .add_executor(passthrough("c"))
        .add_executor(passthrough("d"))
        .add_executor(aggregator)
        .add_fan_out_edges("start", ["a", "b", "c", "d"])
        .add_fan_in_edges(["a", "b", "c", "d"], "agg")
        .build()
        .unwrap();

    let (events, result) = run(Arc::new(merged), Message::text("go"), RunOptions::default())
        .collect()
        .await;

    assert_eq!(result.unwrap().outputs, vec![json!(["a", "b", "c", "d"])]);
    assert_eq!(events.iter().filter(|e| **e == started("agg")).count(), 1);
}

#[tokio::test]
async fn direct_edge_into_a_fan_in_target_is_rejected() {
    let result = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(passthrough("a"))
        .add_executor(passthrough("b"))
        .add_executor(passthrough("agg"))
        .add_fan_out_edges("start", ["a", "b"])
        .add_fan_in_edges(["a", "b"], "agg")
        .add_edge("start", "agg")
        .build();

    assert!(matches!(
        result,
        Err(crate::BuildError::FanInBypassed { ref target, .. }) if target == "agg"
    ));
}

// ============================================================
// Failures
// ============================================================

#[tokio::test]
async fn failing_branch_does_not_stop_its_siblings() {
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(yielding("a", json!("A")))
        .add_executor(failing("b", "injected failure"))
        .add_executor(yielding("c", json!("C")))
        .add_fan_out_edges("start", ["a", "b", "c"])
        .build()
        .unwrap();

    let (events, result) = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .collect()
        .await;

    match result {
        Err(RunError::HandlerFailed { failures, mut outputs }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].node_id, "b");
            assert_eq!(failures[0].error, NodeError::Failed("injected failure".into()));
            outputs.sort_by_key(|v| v.to_string());
            assert_eq!(outputs, vec![json!("A"), json!("C")]);
        }
        other => panic!("expected HandlerFailed, got {other:?}"),
    }
    assert!(events.contains(&completed("a")));
    assert!(events.contains(&completed("c")));
    assert!(events.contains(&RunEvent::NodeFailed {
        node_id: "b".into(),
        error: "injected failure".into(),
    }));
    assert_eq!(
        events.last(),
        Some(&RunEvent::RunFinished {
            status: RunStatus::Failed
        })
    );
}

#[tokio::test]
async fn error_edge_turns_a_failure_into_a_message() {
    let on_error = Executor::new("on_error").on_fn(kinds::ERROR, |input: Input, ctx: WorkflowContext| async move {
        for message in input.into_messages() {
            ctx.yield_output(message.payload().clone());
        }
        Ok(())
    });

    let graph = WorkflowBuilder::new()
        .set_start_executor(failing("flaky", "upstream unavailable"))
        .add_executor(on_error)
        .add_error_edge("flaky", "on_error")
        .build()
        .unwrap();

    let outcome = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .wait()
        .await
        .expect("failure was handled by the graph");

    assert_eq!(
        outcome.outputs,
        vec![json!({ "executor_id": "flaky", "error": "upstream unavailable" })]
    );
}

#[tokio::test]
async fn emissions_before_a_failure_are_still_delivered() {
    let half_done = Executor::new("half").on_fn(kinds::ANY, |_, ctx: WorkflowContext| async move {
        ctx.send_message(kinds::TEXT, json!("partial"));
        Err(NodeError::Failed("gave up midway".into()))
    });

    let graph = WorkflowBuilder::new()
        .set_start_executor(half_done)
        .add_executor(yielding("sink", json!("received")))
        .add_edge("half", "sink")
        .build()
        .unwrap();

    let result = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .wait()
        .await;

    assert!(matches!(
        result,
        Err(RunError::HandlerFailed { ref outputs, .. }) if outputs == &vec![json!("received")]
    ));
}

#[tokio::test]
async fn send_to_an_unconnected_executor_is_a_handler_error() {
    let stray = Executor::new("stray").on_fn(kinds::ANY, |_, ctx: WorkflowContext| async move {
        ctx.send_to("ghost", kinds::TEXT, json!("hello?"));
        Ok(())
    });
    let graph = WorkflowBuilder::new().set_start_executor(stray).build().unwrap();

    let result = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .wait()
        .await;

    match result {
        Err(RunError::HandlerFailed { failures, .. }) => assert_eq!(
            failures[0].error,
            NodeError::UnroutableTarget {
                sender: "stray".into(),
                target: "ghost".into()
            }
        ),
        other => panic!("expected HandlerFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let panicky = Executor::new("panicky").on_fn(kinds::ANY, |_, _| async move {
        if true {
            panic!("worker exploded");
        }
        Ok(())
    });
    let graph = WorkflowBuilder::new().set_start_executor(panicky).build().unwrap();

    let result = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .wait()
        .await;

    match result {
        Err(RunError::HandlerFailed { failures, .. }) => {
            assert_eq!(failures[0].error, NodeError::Panicked("worker exploded".into()));
        }
        other => panic!("expected HandlerFailed, got {other:?}"),
    }
}

// ============================================================
// Starvation, timeouts, cancellation
// ============================================================

#[tokio::test(start_paused = true)]
async fn silent_branch_starves_the_aggregator_at_the_deadline() {
    let graph = launch_graph(
        MockWorker::returning("research", json!("R")),
        MockWorker::hanging("marketing"),
        MockWorker::returning("legal", json!("L")),
    );

    let options = RunOptions::default().with_timeout(Duration::from_secs(2));
    let (events, result) = run(graph, Message::text("launch X"), options).collect().await;

    match result {
        Err(RunError::Starved {
            target,
            missing,
            received,
            causes,
        }) => {
            assert_eq!(target, "aggregator");
            assert_eq!(missing, vec!["marketing"]);
            assert_eq!(received, vec!["research", "legal"]);
            assert!(causes.is_empty());
        }
        other => panic!("expected Starved, got {other:?}"),
    }
    assert!(outputs_of(&events).is_empty());
    assert!(!events.contains(&started("aggregator")));
    assert_eq!(
        events.last(),
        Some(&RunEvent::RunFinished {
            status: RunStatus::Starved
        })
    );
}

#[tokio::test]
async fn failed_source_starves_the_aggregator_once_the_run_is_idle() {
    let graph = launch_graph(
        MockWorker::returning("research", json!("R")),
        MockWorker::failing_fatal("marketing", "quota exceeded"),
        MockWorker::returning("legal", json!("L")),
    );

    let result = run(graph, Message::text("launch X"), RunOptions::default())
        .wait()
        .await;

    match result {
        Err(RunError::Starved {
            target,
            missing,
            causes,
            ..
        }) => {
            assert_eq!(target, "aggregator");
            assert_eq!(missing, vec!["marketing"]);
            assert_eq!(causes.len(), 1);
            assert_eq!(causes[0].node_id, "marketing");
            assert_eq!(
                causes[0].error,
                NodeError::Failed("worker 'marketing' failed: quota exceeded".into())
            );
        }
        other => panic!("expected Starved, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_without_a_partial_barrier_is_a_plain_timeout() {
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(delayed_forward("slow", Duration::from_secs(60)))
        .add_edge("start", "slow")
        .build()
        .unwrap();

    let options = RunOptions::default().with_timeout(Duration::from_secs(2));
    let result = run(Arc::new(graph), Message::text("go"), options).wait().await;

    assert_eq!(
        result.unwrap_err(),
        RunError::TimedOut {
            after: Duration::from_secs(2),
            running: vec!["slow".into()],
        }
    );
}

#[tokio::test(start_paused = true)]
async fn executor_timeout_cancels_the_run() {
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(delayed_forward("slow", Duration::from_secs(60)))
        .add_executor(yielding("fast", json!("fast")))
        .add_fan_out_edges("start", ["slow", "fast"])
        .build()
        .unwrap();

    let options = RunOptions::default().with_timeout_for("slow", Duration::from_secs(1));
    let result = run(Arc::new(graph), Message::text("go"), options).wait().await;

    assert_eq!(
        result.unwrap_err(),
        RunError::ExecutorTimedOut {
            node_id: "slow".into(),
            after: Duration::from_secs(1),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_scheduling_and_discards_late_emissions() {
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(delayed_forward("slow", Duration::from_secs(10)))
        .add_executor(yielding("after_slow", json!("too late")))
        .add_edge("start", "slow")
        .add_edge("slow", "after_slow")
        .build()
        .unwrap();

    let handle = run(Arc::new(graph), Message::text("go"), RunOptions::default());
    let token = handle.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let (events, result) = handle.collect().await;
    let outcome = result.expect("cancellation is not an error");

    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert!(outcome.outputs.is_empty());
    assert!(!events.contains(&started("after_slow")));
    assert_eq!(
        events.last(),
        Some(&RunEvent::RunFinished {
            status: RunStatus::Cancelled
        })
    );
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let graph = WorkflowBuilder::new()
        .set_start_executor(yielding("only", json!(1)))
        .build()
        .unwrap();
    let token = tokio_util::sync::CancellationToken::new();
    token.cancel();

    let options = RunOptions::default().with_cancellation(token);
    let (events, result) = run(Arc::new(graph), Message::text("go"), options).collect().await;

    assert_eq!(result.unwrap().status, RunStatus::Cancelled);
    assert_eq!(
        events,
        vec![RunEvent::RunFinished {
            status: RunStatus::Cancelled
        }]
    );
}

// ============================================================
// Completion policies and loops
// ============================================================

#[tokio::test(start_paused = true)]
async fn terminal_output_ends_the_run() {
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(yielding("fast", json!("first")))
        .add_executor(delayed_forward("slow", Duration::from_secs(5)))
        .add_executor(yielding("late", json!("second")))
        .add_fan_out_edges("start", ["fast", "slow"])
        .add_edge("slow", "late")
        .output_is_terminal(true)
        .build()
        .unwrap();

    let outcome = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .wait()
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.outputs, vec![json!("first")]);
}

#[tokio::test]
async fn outputs_are_collected_in_yield_order_when_not_terminal() {
    let chatty = Executor::new("chatty").on_fn(kinds::ANY, |_, ctx: WorkflowContext| async move {
        ctx.yield_output(json!(1));
        ctx.yield_output(json!(2));
        ctx.send_message(kinds::TEXT, json!("more"));
        Ok(())
    });
    let graph = WorkflowBuilder::new()
        .set_start_executor(chatty)
        .add_executor(yielding("tail", json!(3)))
        .add_edge("chatty", "tail")
        .build()
        .unwrap();

    let outcome = run(Arc::new(graph), Message::text("go"), RunOptions::default())
        .wait()
        .await
        .unwrap();

    assert_eq!(outcome.outputs, vec![json!(1), json!(2), json!(3)]);
}

fn counting_loop(stop_at: Option<u64>) -> Graph {
    let counter = Executor::new("counter").on_fn("count", move |input: Input, ctx: WorkflowContext| async move {
        let n = input
            .into_messages()
            .first()
            .and_then(|m| m.payload().as_u64())
            .unwrap_or_default();
        match stop_at {
            Some(limit) if n >= limit => ctx.yield_output(json!(n)),
            _ => ctx.send_message("count", json!(n + 1)),
        }
        Ok(())
    });

    WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(counter)
        .add_executor(passthrough("echo"))
        .add_edge("start", "counter")
        .add_edge("counter", "echo")
        .add_edge("echo", "counter")
        .allow_back_edge("echo", "counter")
        .build()
        .unwrap()
}

#[tokio::test]
async fn whitelisted_loop_runs_until_it_yields() {
    let outcome = run(
        Arc::new(counting_loop(Some(3))),
        Message::new("count", json!(0)),
        RunOptions::default(),
    )
    .wait()
    .await
    .unwrap();

    assert_eq!(outcome.outputs, vec![json!(3)]);
}

#[tokio::test]
async fn runaway_loop_hits_the_delivery_limit() {
    let options = RunOptions::default().with_max_deliveries(50);
    let result = run(
        Arc::new(counting_loop(None)),
        Message::new("count", json!(0)),
        options,
    )
    .wait()
    .await;

    assert_eq!(result.unwrap_err(), RunError::DeliveryLimit { limit: 50 });
}

#[tokio::test]
async fn delivery_limit_does_not_apply_to_acyclic_graphs() {
    let graph = WorkflowBuilder::new()
        .set_start_executor(dispatcher("start"))
        .add_executor(yielding("a", json!("A")))
        .add_executor(yielding("b", json!("B")))
        .add_executor(yielding("c", json!("C")))
        .add_fan_out_edges("start", ["a", "b", "c"])
        .build()
        .unwrap();

    let options = RunOptions::default().with_max_deliveries(2);
    let outcome = run(Arc::new(graph), Message::text("go"), options)
        .wait()
        .await
        .expect("acyclic graphs are never cut short");

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.outputs.len(), 3);
}

#[tokio::test]
async fn handlers_can_observe_the_run_id_and_received_log() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let recorder = Executor::new("recorder").on_fn(kinds::TEXT, move |input: Input, ctx: WorkflowContext| {
        let log = Arc::clone(&log);
        async move {
            let text = input.into_messages()[0].as_text().unwrap_or_default().to_owned();
            log.lock().unwrap().push(format!("{}:{}", ctx.executor_id(), text));
            ctx.yield_output(json!(ctx.run_id().to_string()));
            Ok(())
        }
    });
    let graph = WorkflowBuilder::new().set_start_executor(recorder).build().unwrap();

    let handle = run(Arc::new(graph), Message::text("hello"), RunOptions::default());
    let run_id = handle.run_id();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.run_id, run_id);
    assert_eq!(outcome.outputs, vec![json!(run_id.to_string())]);
    assert_eq!(*seen.lock().unwrap(), vec!["recorder:hello".to_string()]);
}
