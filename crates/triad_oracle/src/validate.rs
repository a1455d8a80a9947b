//! Validation of oracle replies.

use crate::error::OracleError;
use triad_core::{CategoryKey, Judgment};

/// Checks a returned judgment against its key's record contract
///
/// Range and shape checks always apply. Empty free-text fields are rejected
/// only when `require_reasoning` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JudgmentValidator {
    /// Reject records whose reasoning text is blank
    pub require_reasoning: bool,
}

impl JudgmentValidator {
    /// Create a new validator with range and shape checks only
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether reasoning text must be present
    #[must_use]
    pub fn with_require_reasoning(mut self, require: bool) -> Self {
        self.require_reasoning = require;
        self
    }

    /// Validate a judgment produced for `key`
    ///
    /// # Errors
    ///
    /// Returns `OracleError::InvalidOutput` describing the first violation
    pub fn validate(&self, key: CategoryKey, judgment: &Judgment) -> Result<(), OracleError> {
        judgment.validate(key)?;

        if self.require_reasoning {
            let (field, text) = match judgment {
                Judgment::Stage1(j) => ("reason", &j.reason),
                Judgment::Stage2(j) => ("reason", &j.reason),
                Judgment::Stage3(j) => ("existanceReasoning", &j.existance_reasoning),
            };
            if text.trim().is_empty() {
                return Err(OracleError::InvalidOutput {
                    message: format!("Invalid judgment for {}: {} is empty", key, field),
                });
            }
        }

        Ok(())
    }
}
