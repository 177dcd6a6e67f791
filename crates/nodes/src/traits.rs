//! The `Handler` trait and the context every invocation receives.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::message::{Input, Message};
use crate::NodeError;

// ---------------------------------------------------------------------------
// Emissions
// ---------------------------------------------------------------------------

/// Something a handler asked the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Deliver `message` along the sender's outgoing edges, optionally only
    /// the edge(s) reaching `target`.
    Send {
        message: Message,
        target: Option<String>,
    },
    /// A workflow output.
    Output(Value),
}

// ---------------------------------------------------------------------------
// WorkflowContext
// ---------------------------------------------------------------------------

/// Handle passed to every handler invocation.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// executors can use it without a circular dependency. It exposes exactly two
/// side effects, sending and yielding; the engine drains and validates them
/// once the invocation returns.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    run_id: Uuid,
    executor_id: Arc<str>,
    cancellation: CancellationToken,
    emissions: Arc<Mutex<Vec<Emission>>>,
}

impl WorkflowContext {
    pub fn new(run_id: Uuid, executor_id: impl Into<Arc<str>>, cancellation: CancellationToken) -> Self {
        Self {
            run_id,
            executor_id: executor_id.into(),
            cancellation,
            emissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Id of the executor this invocation belongs to.
    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    /// Send a message on every outgoing edge.
    pub fn send_message(&self, kind: impl Into<String>, payload: Value) {
        let message = Message::from_executor(self.executor_id.as_ref(), kind, payload);
        self.push(Emission::Send { message, target: None });
    }

    /// Send a message only to `target`, which must be connected to this executor.
    pub fn send_to(&self, target: impl Into<String>, kind: impl Into<String>, payload: Value) {
        let message = Message::from_executor(self.executor_id.as_ref(), kind, payload);
        self.push(Emission::Send {
            message,
            target: Some(target.into()),
        });
    }

    /// Re-send a received message under this executor's id.
    pub fn forward(&self, message: &Message) {
        self.send_message(message.kind(), message.payload().clone());
    }

    /// Yield a workflow output.
    pub fn yield_output(&self, value: Value) {
        self.push(Emission::Output(value));
    }

    /// `true` once the run has been cancelled. Long-running handlers may poll this.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Drain everything emitted so far, in emission order.
    pub fn take_emissions(&self) -> Vec<Emission> {
        std::mem::take(&mut *self.emissions.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, emission: Emission) {
        self.emissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(emission);
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// The core handler trait.
///
/// One invocation receives exactly one [`Input`]. It may emit through `ctx`
/// and then return; emissions made before an `Err` are still delivered.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, input: Input, ctx: WorkflowContext) -> Result<(), NodeError>;
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F>(F);

/// Wrap `f` as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Input, WorkflowContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Input, WorkflowContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
{
    async fn handle(&self, input: Input, ctx: WorkflowContext) -> Result<(), NodeError> {
        (self.0)(input, ctx).await
    }
}
