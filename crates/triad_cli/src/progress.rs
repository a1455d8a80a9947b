//! Terminal progress bar and run summary.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use triad_core::SuperCategory;
use triad_plan::EvaluationGraph;
use triad_runtime::{NodeFailure, ProgressSink, TraceEvent};
use triad_score::Aggregation;

/// Progress bar advanced once per resolved node
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Bar drawn on stderr, or a hidden one
    #[must_use]
    pub fn new(visible: bool) -> Self {
        let len = EvaluationGraph::NODE_COUNT as u64;
        let bar = if visible {
            ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    /// Clear the bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for ProgressReporter {
    fn on_event(&self, event: &TraceEvent) {
        if event.status.is_final() {
            self.bar.inc(1);
        }
        self.bar.set_message(format!("{} {:?}", event.node, event.status));
    }
}

/// Render the run summary for the terminal
#[must_use]
pub fn summary(aggregation: &Aggregation, failures: &[NodeFailure], partial: bool) -> String {
    let mut lines = Vec::new();
    lines.push(style("Error probabilities").bold().to_string());
    for group in SuperCategory::ALL {
        let score = aggregation.scores.group(group);
        let mut line = format!("  {:<12} {:.4}", group.as_str(), score);
        if aggregation
            .categories
            .get(&group)
            .is_some_and(|c| c.is_degenerate())
        {
            line.push_str(&format!(" {}", style("(no sub-category judgments)").yellow()));
        }
        lines.push(line);
    }
    lines.push(format!(
        "  {:<12} {}",
        "overall",
        style(format!("{:.4}", aggregation.scores.overall_error_probability)).bold()
    ));

    if partial {
        lines.push(style("Scores cover an incomplete evaluation").yellow().to_string());
    }
    for failure in failures {
        let mut line = format!(
            "  {} {}: {}",
            style("failed").red(),
            failure.key,
            failure.message
        );
        if !failure.cancelled.is_empty() {
            line.push_str(&format!(" ({} cancelled)", failure.cancelled.len()));
        }
        lines.push(line);
    }
    lines.join("\n")
}
