//! Judgment records produced by the oracle.
//!
//! Each stage has its own record shape. Field names on the wire are the
//! camelCase names the instruction prompts ask for, including the historical
//! `existanceReasoning` spelling.

use crate::category::{CategoryKey, Stage};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Stage-1 broad detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage1Judgment {
    /// Probability that an error of this category exists, in [0, 1]
    pub probability: f64,
    /// Free-text justification
    pub reason: String,
    /// Confidence in [0, 100]
    pub confidence: f64,
}

/// Stage-2 sub-category re-evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage2Judgment {
    /// Re-evaluated probability, in [0, 1]
    pub re_evaluated_prob: f64,
    /// Critique of the Stage-1 verdict
    pub thoughts_on_stage1: String,
    /// Free-text justification
    pub reason: String,
    /// Confidence in [0, 100]
    pub re_evaluated_confidence: f64,
}

/// Verdict of a Stage-3 verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorsExist {
    /// Errors confirmed
    #[serde(rename = "YES", alias = "yes", alias = "Yes")]
    Yes,
    /// No errors
    #[serde(rename = "NO", alias = "no", alias = "No")]
    No,
}

impl ErrorsExist {
    /// Wire literal
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }
}

impl std::fmt::Display for ErrorsExist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-3 group verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage3Judgment {
    /// Consistency of the group's judgments, in [0, 100]
    pub consistency_score: f64,
    /// Whether errors of this group exist
    pub errors_exists: ErrorsExist,
    /// Free-text justification
    pub existance_reasoning: String,
}

/// One recorded judgment of any stage
///
/// Serializes as the bare record; the stage is implied by the key it is
/// stored under.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Judgment {
    /// Stage-1 record
    Stage1(Stage1Judgment),
    /// Stage-2 record
    Stage2(Stage2Judgment),
    /// Stage-3 record
    Stage3(Stage3Judgment),
}

impl Judgment {
    /// Stage whose shape this record has
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Stage1(_) => Stage::Initial,
            Self::Stage2(_) => Stage::Critique,
            Self::Stage3(_) => Stage::Verification,
        }
    }

    /// Decode a record of the given stage from a JSON value
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ParseError` if the value does not have the shape.
    pub fn from_value(stage: Stage, value: serde_json::Value) -> CoreResult<Self> {
        Ok(match stage {
            Stage::Initial => Self::Stage1(serde_json::from_value(value)?),
            Stage::Critique => Self::Stage2(serde_json::from_value(value)?),
            Stage::Verification => Self::Stage3(serde_json::from_value(value)?),
        })
    }

    /// Check the record matches the key's stage and every number is in range
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidOutput` describing the first violation.
    pub fn validate(&self, key: CategoryKey) -> CoreResult<()> {
        if self.stage() != key.stage() {
            return Err(invalid(
                key,
                format!("expected {} record, got {}", key.stage(), self.stage()),
            ));
        }
        match self {
            Self::Stage1(j) => {
                check_range(key, "probability", j.probability, 1.0)?;
                check_range(key, "confidence", j.confidence, 100.0)
            }
            Self::Stage2(j) => {
                check_range(key, "reEvaluatedProb", j.re_evaluated_prob, 1.0)?;
                check_range(key, "reEvaluatedConfidence", j.re_evaluated_confidence, 100.0)
            }
            Self::Stage3(j) => check_range(key, "consistencyScore", j.consistency_score, 100.0),
        }
    }

    /// Stage-1 record, if this is one
    #[must_use]
    pub const fn as_stage1(&self) -> Option<&Stage1Judgment> {
        match self {
            Self::Stage1(j) => Some(j),
            _ => None,
        }
    }

    /// Stage-2 record, if this is one
    #[must_use]
    pub const fn as_stage2(&self) -> Option<&Stage2Judgment> {
        match self {
            Self::Stage2(j) => Some(j),
            _ => None,
        }
    }

    /// Stage-3 record, if this is one
    #[must_use]
    pub const fn as_stage3(&self) -> Option<&Stage3Judgment> {
        match self {
            Self::Stage3(j) => Some(j),
            _ => None,
        }
    }
}

impl From<Stage1Judgment> for Judgment {
    fn from(j: Stage1Judgment) -> Self {
        Self::Stage1(j)
    }
}

impl From<Stage2Judgment> for Judgment {
    fn from(j: Stage2Judgment) -> Self {
        Self::Stage2(j)
    }
}

impl From<Stage3Judgment> for Judgment {
    fn from(j: Stage3Judgment) -> Self {
        Self::Stage3(j)
    }
}

fn invalid(key: CategoryKey, reason: String) -> CoreError {
    CoreError::InvalidOutput {
        key: key.as_str().to_string(),
        reason,
    }
}

fn check_range(key: CategoryKey, field: &str, value: f64, max: f64) -> CoreResult<()> {
    if !value.is_finite() {
        return Err(invalid(key, format!("{} is not finite", field)));
    }
    if !(0.0..=max).contains(&value) {
        return Err(invalid(key, format!("{} {} outside [0, {}]", field, value, max)));
    }
    Ok(())
}
