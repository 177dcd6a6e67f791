//! `fanflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `demo`     — run the product-launch fan-out/fan-in scenario.
//! - `viz`      — print the demo graph as Mermaid and/or DOT.
//! - `validate` — build a topology JSON file and report its execution order.

mod demo;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::{visualize, RunEvent, RunOptions, Topology, WorkflowBuilder};
use nodes::Message;

#[derive(Parser)]
#[command(
    name = "fanflow",
    about = "Concurrent executor-graph workflows with fan-out and fan-in",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the demo graph against a prompt.
    Demo {
        /// Text handed to the start executor.
        prompt: String,
        /// Deadline for the whole run, in milliseconds.
        #[arg(long, env = "FANFLOW_RUN_TIMEOUT_MS")]
        timeout_ms: Option<u64>,
        /// Print events as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Render the demo graph.
    Viz {
        #[arg(long, value_enum, default_value_t = Format::Mermaid)]
        format: Format,
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a topology JSON file.
    Validate {
        /// Path to the topology JSON file.
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Mermaid,
    Dot,
    Both,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            prompt,
            timeout_ms,
            json,
        } => run_demo(&prompt, timeout_ms, json).await,
        Command::Viz { format, out } => {
            let graph = demo::launch_graph("example")?;
            let text = match format {
                Format::Mermaid => visualize::to_mermaid(&graph),
                Format::Dot => visualize::to_dot(&graph),
                Format::Both => {
                    let diagrams = visualize::render(&graph);
                    format!("{}\n{}", diagrams.mermaid, diagrams.dot)
                }
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    info!("Diagram written to {}", path.display());
                }
                None => print!("{text}"),
            }
            Ok(())
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let topology: Topology = serde_json::from_str(&content).context("invalid topology JSON")?;

            let factory = demo::placeholder_factory(&topology);
            match WorkflowBuilder::from_topology(topology, factory).build() {
                Ok(graph) => {
                    println!("Topology is valid. Execution order: {:?}", graph.topological_order());
                    Ok(())
                }
                Err(e) => bail!("validation failed: {e}"),
            }
        }
    }
}

async fn run_demo(prompt: &str, timeout_ms: Option<u64>, json: bool) -> anyhow::Result<()> {
    let graph = Arc::new(demo::launch_graph(prompt)?);

    let mut options = RunOptions::from_env();
    if let Some(ms) = timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }

    let mut handle = engine::run(graph, Message::text(prompt), options);
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        match event {
            RunEvent::NodeStarted { node_id } => println!("▶ {node_id}"),
            RunEvent::NodeCompleted { node_id } => println!("✓ {node_id}"),
            RunEvent::NodeFailed { node_id, error } => println!("✗ {node_id}: {error}"),
            RunEvent::OutputYielded { value } => match value.as_str() {
                Some(text) => println!("\n{text}\n"),
                None => println!("\n{value}\n"),
            },
            RunEvent::RunFinished { status } => println!("run finished: {status:?}"),
        }
    }

    let outcome = handle.wait().await?;
    info!(
        run_id = %outcome.run_id,
        elapsed_ms = (outcome.finished_at - outcome.started_at).num_milliseconds(),
        "demo complete"
    );
    Ok(())
}
