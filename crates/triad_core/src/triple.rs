//! The (source, translation, reference) input.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// One translation to evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationTriple {
    /// Source-language sentence
    pub source: String,
    /// Machine translation under evaluation
    #[serde(alias = "mt")]
    pub machine_translation: String,
    /// Human reference translation
    pub reference: String,
}

impl TranslationTriple {
    /// Create a triple
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        machine_translation: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            machine_translation: machine_translation.into(),
            reference: reference.into(),
        }
    }

    /// Check every field is non-empty after trimming
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` naming the first blank field.
    pub fn validate(&self) -> CoreResult<()> {
        for (field, value) in [
            ("source", &self.source),
            ("machineTranslation", &self.machine_translation),
            ("reference", &self.reference),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Validation {
                    field: field.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_validate() {
        let triple = TranslationTriple::new("Hallo Welt", "Hello world", "Hello, world");
        assert!(triple.validate().is_ok());
    }

    #[test]
    fn test_triple_blank_field() {
        let triple = TranslationTriple::new("Hallo", "   ", "Hello");
        let err = triple.validate().unwrap_err();
        assert_eq!(
            err,
            CoreError::Validation {
                field: "machineTranslation".to_string(),
                reason: "must not be empty".to_string(),
            }
        );
    }

    #[test]
    fn test_triple_json_names() {
        let triple = TranslationTriple::new("a", "b", "c");
        let json = serde_json::to_value(&triple).unwrap();
        assert_eq!(json["machineTranslation"], "b");

        let parsed: TranslationTriple =
            serde_json::from_str(r#"{"source":"x","mt":"y","reference":"z"}"#).unwrap();
        assert_eq!(parsed.machine_translation, "y");
    }

    #[test]
    fn test_triple_missing_field() {
        let parsed = serde_json::from_str::<TranslationTriple>(r#"{"source":"x","mt":"y"}"#);
        assert!(parsed.is_err());
    }
}
