//! `nodes` crate — messages, the executor contract, and built-in executors.
//!
//! Every node in a workflow graph is an [`Executor`]: a named dispatch table
//! from payload kind to [`Handler`]. The engine crate delivers messages
//! through [`Executor::invoke`] and reads back what the handler emitted on
//! its [`WorkflowContext`].

pub mod builtin;
pub mod error;
pub mod executor;
pub mod message;
pub mod mock;
pub mod traits;
pub mod worker;

pub use error::{NodeError, WorkerError};
pub use executor::Executor;
pub use message::{kinds, HandlerKey, Input, Message};
pub use traits::{handler_fn, Emission, Handler, WorkflowContext};
pub use worker::{RetryPolicy, Worker, WorkerExecutor};
