//! Per-request evaluation state.
//!
//! The state is append-only: every category key is written at most once and
//! never removed. On the wire it is a flat object holding the triple fields
//! followed by one field per recorded key.

use crate::category::{CategoryKey, SubCategory, SuperCategory};
use crate::error::{CoreError, CoreResult};
use crate::judgment::{Judgment, Stage1Judgment, Stage2Judgment, Stage3Judgment};
use crate::triple::TranslationTriple;
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Triple plus every judgment recorded so far
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationState {
    triple: TranslationTriple,
    entries: IndexMap<CategoryKey, Judgment>,
}

impl EvaluationState {
    /// Fresh state with no judgments
    #[must_use]
    pub fn new(triple: TranslationTriple) -> Self {
        Self {
            triple,
            entries: IndexMap::with_capacity(CategoryKey::COUNT),
        }
    }

    /// The evaluated triple
    #[must_use]
    pub fn triple(&self) -> &TranslationTriple {
        &self.triple
    }

    /// Record a judgment
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyExists` if the key was already recorded, or
    /// `CoreError::Validation` if the record shape does not match the key's
    /// stage.
    pub fn insert(&mut self, key: CategoryKey, judgment: Judgment) -> CoreResult<()> {
        if self.entries.contains_key(&key) {
            return Err(CoreError::AlreadyExists {
                kind: "Judgment".to_string(),
                id: key.as_str().to_string(),
            });
        }
        if judgment.stage() != key.stage() {
            return Err(CoreError::Validation {
                field: key.as_str().to_string(),
                reason: format!(
                    "{} key cannot hold a {} record",
                    key.stage(),
                    judgment.stage()
                ),
            });
        }
        self.entries.insert(key, judgment);
        Ok(())
    }

    /// Judgment recorded under `key`
    #[must_use]
    pub fn get(&self, key: CategoryKey) -> Option<&Judgment> {
        self.entries.get(&key)
    }

    /// Whether `key` has been recorded
    #[must_use]
    pub fn contains(&self, key: CategoryKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Number of recorded judgments
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (CategoryKey, &Judgment)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Stage-1 record of a group
    #[must_use]
    pub fn stage1(&self, group: SuperCategory) -> Option<&Stage1Judgment> {
        self.get(group.stage1_key()).and_then(Judgment::as_stage1)
    }

    /// Stage-2 record of a sub-category
    #[must_use]
    pub fn stage2(&self, sub: SubCategory) -> Option<&Stage2Judgment> {
        self.get(CategoryKey::Stage2(sub)).and_then(Judgment::as_stage2)
    }

    /// Stage-3 record of a group
    #[must_use]
    pub fn stage3(&self, group: SuperCategory) -> Option<&Stage3Judgment> {
        self.get(group.stage3_key()).and_then(Judgment::as_stage3)
    }

    /// Present Stage-2 records of a group, in table order
    pub fn siblings(
        &self,
        group: SuperCategory,
    ) -> impl Iterator<Item = (SubCategory, &Stage2Judgment)> {
        group
            .sub_categories()
            .iter()
            .filter_map(|sub| self.stage2(*sub).map(|j| (*sub, j)))
    }
}

impl Serialize for EvaluationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.entries.len()))?;
        map.serialize_entry("source", &self.triple.source)?;
        map.serialize_entry("machineTranslation", &self.triple.machine_translation)?;
        map.serialize_entry("reference", &self.triple.reference)?;
        for key in CategoryKey::all() {
            if let Some(judgment) = self.entries.get(&key) {
                map.serialize_entry(key.as_str(), judgment)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EvaluationState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = serde_json::Map::deserialize(deserializer)?;

        let mut take_text = |names: &[&'static str]| -> Result<String, D::Error> {
            for name in names {
                if let Some(value) = fields.remove(*name) {
                    return match value {
                        serde_json::Value::String(text) => Ok(text),
                        _ => Err(D::Error::custom(format!("{} must be a string", name))),
                    };
                }
            }
            Err(D::Error::missing_field(names[0]))
        };
        let source = take_text(&["source"])?;
        let machine_translation = take_text(&["machineTranslation", "mt"])?;
        let reference = take_text(&["reference"])?;

        let mut state = EvaluationState::new(TranslationTriple {
            source,
            machine_translation,
            reference,
        });
        for (name, value) in fields {
            let Ok(key) = name.parse::<CategoryKey>() else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let judgment = Judgment::from_value(key.stage(), value)
                .map_err(|e| D::Error::custom(format!("{}: {}", name, e)))?;
            state.insert(key, judgment).map_err(D::Error::custom)?;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::ErrorsExist;

    fn triple() -> TranslationTriple {
        TranslationTriple::new("Der Hund bellt.", "The dog barks.", "The dog is barking.")
    }

    fn s1(p: f64) -> Judgment {
        Judgment::Stage1(Stage1Judgment {
            probability: p,
            reason: "r".to_string(),
            confidence: 90.0,
        })
    }

    fn s2(p: f64) -> Judgment {
        Judgment::Stage2(Stage2Judgment {
            re_evaluated_prob: p,
            thoughts_on_stage1: "t".to_string(),
            reason: "r".to_string(),
            re_evaluated_confidence: 80.0,
        })
    }

    #[test]
    fn test_insert_and_get() {
        let mut state = EvaluationState::new(triple());
        state.insert(SuperCategory::Accuracy.stage1_key(), s1(0.2)).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(
            state.stage1(SuperCategory::Accuracy).map(|j| j.probability),
            Some(0.2)
        );
        assert!(state.stage1(SuperCategory::Fluency).is_none());
    }

    #[test]
    fn test_single_assignment() {
        let mut state = EvaluationState::new(triple());
        let key = CategoryKey::Stage2(SubCategory::Omission);
        state.insert(key, s2(0.1)).unwrap();
        let err = state.insert(key, s2(0.9)).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
        assert_eq!(state.stage2(SubCategory::Omission).map(|j| j.re_evaluated_prob), Some(0.1));
    }

    #[test]
    fn test_shape_must_match_key() {
        let mut state = EvaluationState::new(triple());
        let err = state
            .insert(CategoryKey::Stage2(SubCategory::Grammar), s1(0.5))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(state.is_empty());
    }

    #[test]
    fn test_siblings_in_table_order() {
        let mut state = EvaluationState::new(triple());
        state.insert(CategoryKey::Stage2(SubCategory::UntranslatedText), s2(0.4)).unwrap();
        state.insert(CategoryKey::Stage2(SubCategory::Addition), s2(0.1)).unwrap();
        let subs: Vec<_> = state.siblings(SuperCategory::Accuracy).map(|(s, _)| s).collect();
        assert_eq!(subs, vec![SubCategory::Addition, SubCategory::UntranslatedText]);
    }

    #[test]
    fn test_json_flat_form() {
        let mut state = EvaluationState::new(triple());
        state.insert(SuperCategory::Style.stage1_key(), s1(0.3)).unwrap();
        state
            .insert(
                SuperCategory::Style.stage3_key(),
                Judgment::Stage3(Stage3Judgment {
                    consistency_score: 75.0,
                    errors_exists: ErrorsExist::Yes,
                    existance_reasoning: "awkward".to_string(),
                }),
            )
            .unwrap();

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["machineTranslation"], "The dog barks.");
        assert_eq!(value["styleStage1"]["probability"], 0.3);
        assert_eq!(value["styleStage3"]["errorsExists"], "YES");

        let back: EvaluationState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_json_ignores_unknown_fields() {
        let json = r#"{
            "source": "a", "mt": "b", "reference": "c",
            "run_id": "run_x",
            "omission": {"reEvaluatedProb": 0.5, "thoughtsOnStage1": "", "reason": "", "reEvaluatedConfidence": 60},
            "styleStage3": null
        }"#;
        let state: EvaluationState = serde_json::from_str(json).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.triple().machine_translation, "b");
    }

    #[test]
    fn test_json_wrong_shape_rejected() {
        let json = r#"{"source":"a","machineTranslation":"b","reference":"c",
            "grammar":{"probability":0.5,"reason":"","confidence":10}}"#;
        assert!(serde_json::from_str::<EvaluationState>(json).is_err());
    }

    #[test]
    fn test_json_non_ascii_preserved() {
        let state = EvaluationState::new(TranslationTriple::new("猫", "Katze", "Die Katze"));
        let text = serde_json::to_string(&state).unwrap();
        assert!(text.contains("猫"));
    }
}
