//! Run report persisted by `triad evaluate`.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use triad_core::{EvaluationState, RunId, SuperCategory};
use triad_runtime::{EvaluationOutcome, Metrics, NodeFailure};
use triad_score::{CategoryScore, ScoreRecord};

/// Report of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier
    pub run_id: RunId,
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Oracle that produced the judgments
    pub oracle: String,
    /// Every recorded judgment, if requested, inlined as a state document
    #[serde(flatten)]
    pub state: Option<EvaluationState>,
    /// Final scores
    pub aggregation: ScoreRecord,
    /// Per-group diagnostics
    pub categories: IndexMap<SuperCategory, CategoryScore>,
    /// True if scores cover an incomplete state
    pub partial: bool,
    /// Node failures
    pub failures: Vec<NodeFailure>,
    /// Run metrics
    pub metrics: Metrics,
}

impl RunReport {
    /// Build a report from a finished run
    #[must_use]
    pub fn from_outcome(outcome: &EvaluationOutcome, include_state: bool) -> Self {
        Self {
            run_id: outcome.run_id,
            generated_at: Utc::now(),
            oracle: outcome.oracle.clone(),
            state: include_state.then(|| outcome.state.clone()),
            aggregation: outcome.aggregation.scores,
            categories: outcome.aggregation.categories.clone(),
            partial: outcome.partial,
            failures: outcome.failures.clone(),
            metrics: outcome.metrics.clone(),
        }
    }

    /// Write the report as pretty-printed UTF-8 JSON
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).wrap_err_with(|| format!("Failed to write {}", path.display()))
    }
}
