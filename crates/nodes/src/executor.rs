//! `Executor` — a named node with a closed dispatch table.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::message::{HandlerKey, Input};
use crate::traits::{handler_fn, Handler, WorkflowContext};
use crate::NodeError;

/// A named processing node.
///
/// Handlers are keyed by [`HandlerKey`] and resolved at delivery time: the
/// exact kind first, then the wildcard of the same shape. The engine never
/// inspects anything else about an executor.
#[derive(Clone)]
pub struct Executor {
    id: String,
    handlers: BTreeMap<HandlerKey, Arc<dyn Handler>>,
}

impl Executor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handlers: BTreeMap::new(),
        }
    }

    /// Register `handler` for single messages of `kind`.
    pub fn on(self, kind: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.with_handler(HandlerKey::One(kind.into()), handler)
    }

    /// Register `handler` for fan-in batches of `kind`.
    pub fn on_batch(self, kind: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.with_handler(HandlerKey::Batch(kind.into()), handler)
    }

    /// Closure form of [`Executor::on`].
    pub fn on_fn<F, Fut>(self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(Input, WorkflowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
    {
        self.on(kind, handler_fn(f))
    }

    /// Closure form of [`Executor::on_batch`].
    pub fn on_batch_fn<F, Fut>(self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(Input, WorkflowContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
    {
        self.on_batch(kind, handler_fn(f))
    }

    /// Register `handler` under an explicit key. A later registration for the
    /// same key replaces the earlier one.
    pub fn with_handler(mut self, key: HandlerKey, handler: impl Handler + 'static) -> Self {
        self.handlers.insert(key, Arc::new(handler));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Accepted keys, in a stable order.
    pub fn accepts(&self) -> impl Iterator<Item = &HandlerKey> {
        self.handlers.keys()
    }

    pub fn accepts_single(&self) -> bool {
        self.handlers.keys().any(|key| !key.is_batch())
    }

    pub fn accepts_batch(&self) -> bool {
        self.handlers.keys().any(HandlerKey::is_batch)
    }

    /// Look up the handler for `input`.
    pub fn resolve(&self, input: &Input) -> Option<Arc<dyn Handler>> {
        let key = input.key();
        self.handlers
            .get(&key)
            .or_else(|| self.handlers.get(&key.wildcard()))
            .cloned()
    }

    /// Deliver `input` to the matching handler.
    ///
    /// # Errors
    /// [`NodeError::NoHandler`] when nothing matches, otherwise whatever the
    /// handler returns.
    pub async fn invoke(&self, input: Input, ctx: WorkflowContext) -> Result<(), NodeError> {
        let handler = self.resolve(&input).ok_or_else(|| NodeError::NoHandler {
            executor: self.id.clone(),
            key: input.key(),
        })?;
        handler.handle(input, ctx).await
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("accepts", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
