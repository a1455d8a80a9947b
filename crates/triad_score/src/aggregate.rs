//! Score aggregation over an evaluation state.
//!
//! A group's base score is the confidence-weighted mean of its present
//! Stage-2 probabilities. Verification then adjusts it: no verdict leaves it
//! unchanged, `NO` damps it by a fixed factor, and `YES` scales it by the
//! consistency score. The two verified branches are deliberately distinct.

use crate::weights::{NO_ERRORS_DAMPING, weight};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use triad_core::{ErrorsExist, EvaluationState, SuperCategory};

/// Confidence-weighted mean of probabilities
///
/// Each weight is `confidence / 100`. Returns 0.0 when either sequence is
/// empty or the weights sum to zero. Pairs beyond the shorter sequence are
/// ignored.
#[must_use]
pub fn weighted_mean(probabilities: &[f64], confidences: &[f64]) -> f64 {
    if probabilities.is_empty() || confidences.is_empty() {
        return 0.0;
    }

    let (weighted, total) = probabilities
        .iter()
        .zip(confidences)
        .fold((0.0, 0.0), |(sum, total), (p, c)| {
            let w = c / 100.0;
            (sum + p * w, total + w)
        });

    if total == 0.0 {
        return 0.0;
    }
    weighted / total
}

/// Effect verification had on a group's score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Verification {
    /// No Stage-3 record; score equals base
    Unverified,
    /// Stage-3 found no errors; base damped
    Dampened,
    /// Stage-3 confirmed errors; base scaled by consistency
    Scaled {
        /// Consistency score in [0, 100]
        consistency: f64,
    },
}

/// Score of one group with diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Final group error score
    pub score: f64,
    /// Weighted mean before verification
    pub base: f64,
    /// Number of Stage-2 judgments that went into `base`
    ///
    /// Zero marks a degenerate input rather than a clean translation.
    pub contributing: usize,
    /// Verification effect applied
    pub verification: Verification,
}

impl CategoryScore {
    /// True if no Stage-2 judgment contributed
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.contributing == 0
    }
}

/// Final error probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Accuracy group score
    pub accuracy_error: f64,
    /// Fluency group score
    pub fluency_error: f64,
    /// Terminology group score
    pub terminology_error: f64,
    /// Style group score
    pub style_error: f64,
    /// Weighted sum of the group scores
    pub overall_error_probability: f64,
}

impl ScoreRecord {
    /// Score of one group
    #[must_use]
    pub const fn group(&self, group: SuperCategory) -> f64 {
        match group {
            SuperCategory::Accuracy => self.accuracy_error,
            SuperCategory::Fluency => self.fluency_error,
            SuperCategory::Terminology => self.terminology_error,
            SuperCategory::Style => self.style_error,
        }
    }
}

/// Scores plus per-group diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Final scores
    pub scores: ScoreRecord,
    /// Per-group breakdown, in group order
    pub categories: IndexMap<SuperCategory, CategoryScore>,
}

fn score_group(state: &EvaluationState, group: SuperCategory) -> CategoryScore {
    let (probabilities, confidences): (Vec<f64>, Vec<f64>) = state
        .siblings(group)
        .map(|(_, j)| (j.re_evaluated_prob, j.re_evaluated_confidence))
        .unzip();
    let contributing = probabilities.len();
    let base = weighted_mean(&probabilities, &confidences);

    let (score, verification) = match state.stage3(group) {
        None => (base, Verification::Unverified),
        Some(v) => match v.errors_exists {
            ErrorsExist::No => (base * NO_ERRORS_DAMPING, Verification::Dampened),
            ErrorsExist::Yes => (
                base * v.consistency_score / 100.0,
                Verification::Scaled {
                    consistency: v.consistency_score,
                },
            ),
        },
    };

    CategoryScore {
        score,
        base,
        contributing,
        verification,
    }
}

/// Error score of one group
#[must_use]
pub fn category_score(state: &EvaluationState, group: SuperCategory) -> f64 {
    score_group(state, group).score
}

/// Weighted sum of the four group scores
#[must_use]
pub fn overall_score(state: &EvaluationState) -> f64 {
    SuperCategory::ALL
        .iter()
        .map(|g| weight(*g) * category_score(state, *g))
        .sum()
}

/// Aggregate a state into scores and diagnostics
#[must_use]
pub fn aggregate(state: &EvaluationState) -> Aggregation {
    let categories: IndexMap<SuperCategory, CategoryScore> = SuperCategory::ALL
        .iter()
        .map(|g| (*g, score_group(state, *g)))
        .collect();
    let of = |g: SuperCategory| categories.get(&g).map_or(0.0, |c| c.score);
    let overall = SuperCategory::ALL.iter().map(|g| weight(*g) * of(*g)).sum();

    let scores = ScoreRecord {
        accuracy_error: of(SuperCategory::Accuracy),
        fluency_error: of(SuperCategory::Fluency),
        terminology_error: of(SuperCategory::Terminology),
        style_error: of(SuperCategory::Style),
        overall_error_probability: overall,
    };

    Aggregation { scores, categories }
}
