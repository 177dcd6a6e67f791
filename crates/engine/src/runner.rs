//! Workflow run engine.
//!
//! [`run`] spawns one coordinator task per run:
//! 1. Wraps the initial input as a message and delivers it to the start executor.
//! 2. Spawns every delivery as its own task; handlers report back over a channel.
//! 3. Routes each finished invocation's emissions along the sender's edges,
//!    buffering fan-in messages in per-edge barriers until a wave completes.
//! 4. Stops on quiescence, a terminal output, cancellation, the run deadline,
//!    or a fatal run-level error.
//!
//! The coordinator is the only writer of barrier state, outputs and events,
//! so all three have a single total order regardless of how handlers overlap.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use nodes::{kinds, Emission, Executor, Input, Message, NodeError, WorkflowContext};

use crate::barrier::Barrier;
use crate::error::RunError;
use crate::events::{HandlerFailure, RunEvent, RunOutcome, RunStatus};
use crate::graph::Graph;
use crate::models::EdgeKind;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Deadline for the whole run.
    pub timeout: Option<Duration>,
    /// Default limit for one handler invocation.
    pub executor_timeout: Option<Duration>,
    /// Per-executor overrides of `executor_timeout`.
    pub executor_timeouts: HashMap<String, Duration>,
    /// Upper bound on deliveries in a graph with whitelisted back-edges.
    /// Acyclic graphs always terminate and are not limited.
    pub max_deliveries: usize,
    /// Cancelling this token stops the run.
    pub cancellation: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            executor_timeout: None,
            executor_timeouts: HashMap::new(),
            max_deliveries: 10_000,
            cancellation: CancellationToken::new(),
        }
    }
}

impl RunOptions {
    /// Create options from environment variables, falling back to defaults.
    ///
    /// - `FANFLOW_RUN_TIMEOUT_MS`: run deadline in milliseconds
    /// - `FANFLOW_EXECUTOR_TIMEOUT_MS`: default per-invocation limit
    /// - `FANFLOW_MAX_DELIVERIES`: delivery budget
    pub fn from_env() -> Self {
        let millis = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
        };
        let defaults = Self::default();

        Self {
            timeout: millis("FANFLOW_RUN_TIMEOUT_MS"),
            executor_timeout: millis("FANFLOW_EXECUTOR_TIMEOUT_MS"),
            max_deliveries: std::env::var("FANFLOW_MAX_DELIVERIES")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.max_deliveries),
            ..defaults
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_executor_timeout(mut self, timeout: Duration) -> Self {
        self.executor_timeout = Some(timeout);
        self
    }

    /// Limit invocations of executor `id` only.
    pub fn with_timeout_for(mut self, id: impl Into<String>, timeout: Duration) -> Self {
        self.executor_timeouts.insert(id.into(), timeout);
        self
    }

    pub fn with_max_deliveries(mut self, max: usize) -> Self {
        self.max_deliveries = max.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    fn timeout_for(&self, id: &str) -> Option<Duration> {
        self.executor_timeouts
            .get(id)
            .copied()
            .or(self.executor_timeout)
    }
}

// ---------------------------------------------------------------------------
// RunHandle
// ---------------------------------------------------------------------------

/// Caller's side of a run: the event stream, a cancellation handle, and the
/// final result.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    events: mpsc::UnboundedReceiver<RunEvent>,
    cancellation: CancellationToken,
    task: JoinHandle<Result<RunOutcome, RunError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Next lifecycle event; `None` once the run has finished and the stream is drained.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Wait for the run to end, ignoring events not yet consumed.
    pub async fn wait(self) -> Result<RunOutcome, RunError> {
        join(self.task).await
    }

    /// Wait for the run to end and return every event not yet consumed.
    pub async fn collect(mut self) -> (Vec<RunEvent>, Result<RunOutcome, RunError>) {
        let result = join(self.task).await;
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        (events, result)
    }
}

async fn join(task: JoinHandle<Result<RunOutcome, RunError>>) -> Result<RunOutcome, RunError> {
    task.await
        .unwrap_or_else(|join| Err(RunError::Aborted(join.to_string())))
}

/// Start running `graph` against `input`.
///
/// Must be called from within a tokio runtime.
pub fn run(graph: Arc<Graph>, input: Message, options: RunOptions) -> RunHandle {
    let run_id = Uuid::new_v4();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let cancellation = options.cancellation.clone();

    let coordinator = Coordinator {
        run_id,
        halt: cancellation.child_token(),
        barriers: graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.kind == EdgeKind::FanIn)
            .map(|(index, edge)| (index, Barrier::new(edge)))
            .collect(),
        graph,
        options,
        events: event_tx,
        done_tx,
        running: HashMap::new(),
        in_flight: 0,
        deliveries: 0,
        outputs: Vec::new(),
        failures: Vec::new(),
        halted: None,
    };
    let task = tokio::spawn(coordinator.drive(input, done_rx));

    RunHandle {
        run_id,
        events: event_rx,
        cancellation,
        task,
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// A finished handler invocation.
struct Completion {
    node_id: String,
    invocation: Invocation,
    emissions: Vec<Emission>,
}

enum Invocation {
    Finished(Result<(), NodeError>),
    TimedOut(Duration),
}

/// Why scheduling stopped before the run went quiet.
enum Halt {
    TerminalOutput,
    Fatal(RunError),
}

enum Ending {
    Quiescent,
    Halted(Halt),
    Cancelled,
    Deadline,
}

struct Coordinator {
    run_id: Uuid,
    graph: Arc<Graph>,
    options: RunOptions,
    /// Child of the caller's token; also cancelled when the run ends on its own.
    halt: CancellationToken,
    events: mpsc::UnboundedSender<RunEvent>,
    done_tx: mpsc::UnboundedSender<Completion>,
    /// Keyed by fan-in edge index.
    barriers: HashMap<usize, Barrier>,
    running: HashMap<String, usize>,
    in_flight: usize,
    deliveries: usize,
    outputs: Vec<Value>,
    failures: Vec<HandlerFailure>,
    halted: Option<Halt>,
}

impl Coordinator {
    #[instrument(skip_all, fields(run_id = %self.run_id, start = %self.graph.start_id()))]
    async fn drive(
        mut self,
        input: Message,
        mut done_rx: mpsc::UnboundedReceiver<Completion>,
    ) -> Result<RunOutcome, RunError> {
        let started_at = Utc::now();
        let deadline = self.options.timeout.map(|t| Instant::now() + t);
        let cancel = self.options.cancellation.clone();
        info!("run started");

        let start = self.graph.start_id().to_owned();
        self.deliver(&start, Input::Single(input));

        let ending = loop {
            if let Some(halt) = self.halted.take() {
                break Ending::Halted(halt);
            }
            if cancel.is_cancelled() {
                break Ending::Cancelled;
            }
            if self.in_flight == 0 {
                break Ending::Quiescent;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ending::Cancelled,
                _ = elapsed(deadline) => break Ending::Deadline,
                Some(done) = done_rx.recv() => self.complete(done),
            }
        };

        // In-flight handlers may still finish; their completions go nowhere.
        self.halt.cancel();
        drop(done_rx);

        let result = self.conclude(ending);
        let status = match &result {
            Ok(status) => *status,
            Err(err) => err.status(),
        };
        self.emit(RunEvent::RunFinished { status });

        match result {
            Ok(status) => {
                info!(?status, outputs = self.outputs.len(), "run finished");
                Ok(RunOutcome {
                    run_id: self.run_id,
                    status,
                    outputs: self.outputs,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(err) => {
                warn!(error = %err, "run failed");
                Err(err)
            }
        }
    }

    /// Schedule one invocation of `target`.
    fn deliver(&mut self, target: &str, input: Input) {
        if self.halted.is_some() || self.halt.is_cancelled() {
            debug!(target, "run is stopping; delivery dropped");
            return;
        }
        if !self.graph.back_edges().is_empty() && self.deliveries >= self.options.max_deliveries {
            self.halted = Some(Halt::Fatal(RunError::DeliveryLimit {
                limit: self.options.max_deliveries,
            }));
            return;
        }
        let Some(executor) = self.graph.executor(target).cloned() else {
            warn!(target, "delivery to unknown executor dropped");
            return;
        };

        self.deliveries += 1;
        self.in_flight += 1;
        *self.running.entry(target.to_owned()).or_default() += 1;
        self.emit(RunEvent::NodeStarted {
            node_id: target.to_owned(),
        });

        let ctx = WorkflowContext::new(self.run_id, target, self.halt.clone());
        let limit = self.options.timeout_for(target);
        let done_tx = self.done_tx.clone();
        let node_id = target.to_owned();

        tokio::spawn(async move {
            let invocation = invoke(&executor, input, ctx.clone(), limit).await;
            let emissions = ctx.take_emissions();
            // The receiver is gone once the run has ended.
            let _ = done_tx.send(Completion {
                node_id,
                invocation,
                emissions,
            });
        });
    }

    fn complete(&mut self, done: Completion) {
        let Completion {
            node_id,
            invocation,
            emissions,
        } = done;

        self.in_flight -= 1;
        if let Some(count) = self.running.get_mut(&node_id) {
            *count -= 1;
            if *count == 0 {
                self.running.remove(&node_id);
            }
        }

        match invocation {
            Invocation::Finished(Ok(())) => {
                debug!(node_id, emissions = emissions.len(), "handler completed");
                self.emit(RunEvent::NodeCompleted {
                    node_id: node_id.clone(),
                });
                self.route(&node_id, emissions);
            }
            Invocation::Finished(Err(error)) => {
                warn!(node_id, %error, "handler failed");
                self.emit(RunEvent::NodeFailed {
                    node_id: node_id.clone(),
                    error: error.to_string(),
                });
                // Emissions made before the failure still go out.
                self.route(&node_id, emissions);
                self.fail(&node_id, error);
            }
            Invocation::TimedOut(after) => {
                warn!(node_id, ?after, "handler timed out");
                self.emit(RunEvent::NodeFailed {
                    node_id: node_id.clone(),
                    error: format!("timed out after {after:?}"),
                });
                self.halted = Some(Halt::Fatal(RunError::ExecutorTimedOut { node_id, after }));
            }
        }
    }

    fn route(&mut self, source: &str, emissions: Vec<Emission>) {
        for emission in emissions {
            match emission {
                Emission::Output(value) => self.yield_output(value),
                Emission::Send { message, target } => {
                    if let Err(error) = self.send(source, message, target.as_deref()) {
                        self.fail(source, error);
                    }
                }
            }
        }
    }

    fn yield_output(&mut self, value: Value) {
        if self.halted.is_some() {
            return;
        }
        self.outputs.push(value.clone());
        self.emit(RunEvent::OutputYielded { value });
        if self.graph.output_is_terminal() {
            self.halted = Some(Halt::TerminalOutput);
        }
    }

    /// Deliver `message` along the data edges leaving `source`, optionally
    /// only those reaching `target`.
    fn send(&mut self, source: &str, message: Message, target: Option<&str>) -> Result<(), NodeError> {
        let graph = Arc::clone(&self.graph);
        let wanted = |id: &str| target.map_or(true, |t| t == id);
        let mut routed = false;

        for (index, edge) in graph.outgoing(source) {
            match edge.kind {
                EdgeKind::FanIn => {
                    let Some(fan_in_target) = edge.targets.first() else {
                        continue;
                    };
                    if !wanted(fan_in_target) {
                        continue;
                    }
                    routed = true;
                    let wave = self
                        .barriers
                        .get_mut(&index)
                        .and_then(|barrier| barrier.record(source, message.clone()));
                    if let Some(wave) = wave {
                        debug!(target = %fan_in_target, size = wave.len(), "fan-in wave complete");
                        self.deliver(fan_in_target, Input::Batch(wave));
                    }
                }
                _ => {
                    for edge_target in edge.targets.iter().filter(|t| wanted(t)) {
                        routed = true;
                        self.deliver(edge_target, Input::Single(message.clone()));
                    }
                }
            }
        }

        match target {
            Some(target) if !routed => Err(NodeError::UnroutableTarget {
                sender: source.to_owned(),
                target: target.to_owned(),
            }),
            None if !routed => {
                debug!(source, kind = message.kind(), "no outgoing edges; message dropped");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Route a handler error along the executor's error edges, or keep it for
    /// the run result.
    fn fail(&mut self, node_id: &str, error: NodeError) {
        let handlers: Vec<String> = self
            .graph
            .error_targets(node_id)
            .map(str::to_owned)
            .collect();

        if handlers.is_empty() {
            self.failures.push(HandlerFailure {
                node_id: node_id.to_owned(),
                error,
            });
            return;
        }

        let message = Message::from_executor(
            node_id,
            kinds::ERROR,
            json!({ "executor_id": node_id, "error": error.to_string() }),
        );
        for handler in handlers {
            self.deliver(&handler, Input::Single(message.clone()));
        }
    }

    fn conclude(&mut self, ending: Ending) -> Result<RunStatus, RunError> {
        match ending {
            Ending::Halted(Halt::TerminalOutput) => Ok(RunStatus::Completed),
            Ending::Halted(Halt::Fatal(err)) => Err(err),
            Ending::Cancelled => {
                info!(in_flight = self.in_flight, "run cancelled");
                Ok(RunStatus::Cancelled)
            }
            Ending::Deadline => Err(self.starvation().unwrap_or_else(|| {
                let mut running: Vec<String> = self.running.keys().cloned().collect();
                running.sort();
                RunError::TimedOut {
                    after: self.options.timeout.unwrap_or_default(),
                    running,
                }
            })),
            Ending::Quiescent => {
                if let Some(starved) = self.starvation() {
                    return Err(starved);
                }
                if !self.failures.is_empty() {
                    return Err(RunError::HandlerFailed {
                        failures: std::mem::take(&mut self.failures),
                        outputs: self.outputs.clone(),
                    });
                }
                Ok(RunStatus::Completed)
            }
        }
    }

    /// The first partially-filled barrier, in edge order, together with the
    /// handler failures collected so far.
    fn starvation(&self) -> Option<RunError> {
        let mut indices: Vec<&usize> = self.barriers.keys().collect();
        indices.sort();
        indices
            .into_iter()
            .map(|index| &self.barriers[index])
            .find(|barrier| barrier.is_partial())
            .map(|barrier| RunError::Starved {
                target: barrier.target().to_owned(),
                missing: barrier.missing(),
                received: barrier.received(),
                causes: self.failures.clone(),
            })
    }

    fn emit(&self, event: RunEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

async fn elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn invoke(
    executor: &Executor,
    input: Input,
    ctx: WorkflowContext,
    limit: Option<Duration>,
) -> Invocation {
    let call = AssertUnwindSafe(executor.invoke(input, ctx)).catch_unwind();
    let caught = match limit {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(caught) => caught,
            Err(_) => return Invocation::TimedOut(limit),
        },
        None => call.await,
    };
    Invocation::Finished(caught.unwrap_or_else(|panic| Err(NodeError::Panicked(panic_message(&*panic)))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
