//! TRIAD CLI
//!
//! Evaluate a translation triple, re-score a saved state document, or
//! inspect the evaluation graph.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod logging;
mod progress;
mod report;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use triad_plan::{EvaluationGraph, GraphValidator};
use triad_runtime::EvaluationEngine;

use crate::config::{EvaluateArgs, read_state};
use crate::logging::LogFormat;
use crate::progress::{ProgressReporter, summary};
use crate::report::RunReport;

#[derive(Parser)]
#[command(name = "triad", version)]
#[command(about = "TRIAD - hierarchical machine translation quality evaluation", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one triple and write a run report
    Evaluate(EvaluateArgs),
    /// Re-aggregate a saved state document
    Score {
        /// State document
        #[arg(short, long)]
        state: PathBuf,
    },
    /// Print the evaluation graph and its validation verdict
    Graph {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.log_format)?;
    debug!("triad v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Evaluate(args) => evaluate(args).await,
        Commands::Score { state } => score(&state),
        Commands::Graph { json } => graph(json),
    }
}

async fn evaluate(args: EvaluateArgs) -> Result<()> {
    let fixture = args.load_fixture()?;
    let triple = args.load_triple(fixture.as_ref())?;
    let oracle = args.build_oracle(fixture.as_ref())?;

    let reporter = Arc::new(ProgressReporter::new(!args.no_progress));
    let engine = EvaluationEngine::new(oracle, args.engine_config())?.with_progress(reporter.clone());

    let result = engine.evaluate(triple).await;
    reporter.finish();
    let outcome = result?;

    let report = RunReport::from_outcome(&outcome, args.include_state);
    report.write(&args.output)?;
    info!(path = %args.output.display(), "Report written");

    println!(
        "{}",
        summary(&outcome.aggregation, &outcome.failures, outcome.partial)
    );
    println!(
        "{} {}",
        style("Report:").dim(),
        args.output.display()
    );
    Ok(())
}

/// Accepts a state document or a run report written with `--include-state`
fn score(path: &Path) -> Result<()> {
    let state = read_state(path)?;
    let aggregation = triad_score::aggregate(&state);
    println!("{}", serde_json::to_string_pretty(&aggregation.scores)?);
    Ok(())
}

fn graph(json: bool) -> Result<()> {
    let graph = EvaluationGraph::standard()?;
    let verdict = GraphValidator::new().validate(&graph);
    let errors: Vec<String> = match &verdict {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    };

    if json {
        let nodes: Vec<_> = graph
            .nodes()
            .map(|node| {
                serde_json::json!({
                    "node": node,
                    "dependencies": graph.dependencies(node),
                })
            })
            .collect();
        let doc = serde_json::json!({
            "nodes": nodes,
            "valid": errors.is_empty(),
            "errors": errors,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    for node in graph.nodes() {
        let deps: Vec<String> = graph
            .dependencies(node)
            .iter()
            .map(ToString::to_string)
            .collect();
        if deps.is_empty() {
            println!("{}", style(node).bold());
        } else {
            println!("{} <- {}", style(node).bold(), deps.join(", "));
        }
    }
    if errors.is_empty() {
        println!("{}", style("graph valid").green());
    } else {
        for error in &errors {
            println!("{} {}", style("invalid:").red(), error);
        }
    }
    Ok(())
}
