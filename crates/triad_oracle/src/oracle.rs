//! The judgment oracle boundary.

use crate::error::OracleError;
use crate::instruction::InstructionSet;
use async_trait::async_trait;
use serde::Serialize;
use triad_core::{
    CategoryKey, Judgment, Stage, Stage1Judgment, Stage2Judgment, SubCategory, TranslationTriple,
};

/// Prior judgments an oracle call builds on
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OracleContext {
    /// Stage-1: the triple alone
    Initial,
    /// Stage-2: the parent group's Stage-1 verdict
    Critique {
        /// Parent Stage-1 judgment
        parent: Stage1Judgment,
    },
    /// Stage-3: the parent verdict and every recorded sibling
    Verification {
        /// Parent Stage-1 judgment
        parent: Stage1Judgment,
        /// Present Stage-2 siblings in group-table order
        siblings: Vec<(SubCategory, Stage2Judgment)>,
    },
}

/// One judgment request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleRequest {
    /// Category being judged
    pub key: CategoryKey,
    /// Criteria for this category
    pub instruction: InstructionSet,
    /// Evaluated triple
    pub triple: TranslationTriple,
    /// Prior judgments
    pub context: OracleContext,
}

impl OracleRequest {
    /// Record shape the oracle must return
    #[must_use]
    pub const fn expected_stage(&self) -> Stage {
        self.key.stage()
    }

    /// Keys whose judgments are embedded in the context
    #[must_use]
    pub fn context_keys(&self) -> Vec<CategoryKey> {
        let group = self.key.group();
        match &self.context {
            OracleContext::Initial => Vec::new(),
            OracleContext::Critique { .. } => vec![group.stage1_key()],
            OracleContext::Verification { siblings, .. } => {
                let mut keys = vec![group.stage1_key()];
                keys.extend(siblings.iter().map(|(sub, _)| CategoryKey::Stage2(*sub)));
                keys
            }
        }
    }
}

/// A judgment function
///
/// Implementations are not trusted to respect the record contract; callers
/// validate every returned judgment.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Oracle name, for logs and reports
    fn name(&self) -> &str;

    /// Produce a judgment for the request
    async fn judge(&self, request: &OracleRequest) -> Result<Judgment, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionCatalog;
    use triad_core::SuperCategory;

    fn stage1() -> Stage1Judgment {
        Stage1Judgment {
            probability: 0.6,
            reason: "dropped clause".to_string(),
            confidence: 80.0,
        }
    }

    fn stage2() -> Stage2Judgment {
        Stage2Judgment {
            re_evaluated_prob: 0.7,
            thoughts_on_stage1: "agree".to_string(),
            reason: "clause missing".to_string(),
            re_evaluated_confidence: 85.0,
        }
    }

    #[test]
    fn test_context_keys() {
        let catalog = InstructionCatalog::standard();
        let key = SuperCategory::Accuracy.stage3_key();
        let request = OracleRequest {
            key,
            instruction: catalog.get(key).unwrap().clone(),
            triple: TranslationTriple::new("a", "b", "c"),
            context: OracleContext::Verification {
                parent: stage1(),
                siblings: vec![(SubCategory::Omission, stage2())],
            },
        };
        assert_eq!(request.expected_stage(), Stage::Verification);
        assert_eq!(
            request.context_keys(),
            vec![
                SuperCategory::Accuracy.stage1_key(),
                CategoryKey::Stage2(SubCategory::Omission),
            ]
        );
    }

    #[test]
    fn test_initial_context_has_no_keys() {
        let catalog = InstructionCatalog::standard();
        let key = SuperCategory::Style.stage1_key();
        let request = OracleRequest {
            key,
            instruction: catalog.get(key).unwrap().clone(),
            triple: TranslationTriple::new("a", "b", "c"),
            context: OracleContext::Initial,
        };
        assert!(request.context_keys().is_empty());
    }

    #[test]
    fn test_context_serializes_with_kind() {
        let value = serde_json::to_value(OracleContext::Critique { parent: stage1() }).unwrap();
        assert_eq!(value["kind"], "critique");
        assert_eq!(value["parent"]["probability"], 0.6);
    }
}
