//! `engine` crate — graph model, validation, the run engine, and diagram export.
//!
//! Build a [`Graph`] with [`WorkflowBuilder`], start it with [`run`], and read
//! [`RunEvent`]s and the final [`RunOutcome`] from the returned [`RunHandle`].
//! [`visualize`] renders the same graph as Mermaid or DOT at any time.

pub mod barrier;
pub mod builder;
pub mod dag;
pub mod error;
pub mod events;
pub mod graph;
pub mod models;
pub mod runner;
pub mod visualize;

pub use builder::WorkflowBuilder;
pub use dag::validate_graph;
pub use error::{BuildError, RunError};
pub use events::{HandlerFailure, RunEvent, RunOutcome, RunStatus};
pub use graph::Graph;
pub use models::{BackEdge, Edge, EdgeKind, Topology};
pub use runner::{run, RunHandle, RunOptions};
pub use visualize::Diagrams;

#[cfg(test)]
mod runner_tests;
