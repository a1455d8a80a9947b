//! Instruction catalog: evaluation criteria per category key.
//!
//! Each key maps to one [`InstructionSet`] with a stable identifier of the
//! form `mqm.<group>.stage1`, `mqm.<group>.<sub>.stage2` or
//! `mqm.<group>.stage3`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use triad_core::{CategoryKey, CoreError, CoreResult, SubCategory, SuperCategory};

/// Criteria handed to the oracle for one category key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSet {
    /// Stable identifier
    pub id: String,
    /// Key these criteria apply to
    pub key: CategoryKey,
    /// Evaluation instructions
    pub criteria: String,
}

impl InstructionSet {
    /// Stable identifier for a key
    #[must_use]
    pub fn id_for(key: CategoryKey) -> String {
        match key {
            CategoryKey::Stage1(group) => format!("mqm.{}.stage1", group),
            CategoryKey::Stage2(sub) => format!("mqm.{}.{}.stage2", sub.parent(), sub),
            CategoryKey::Stage3(group) => format!("mqm.{}.stage3", group),
        }
    }
}

/// Mapping from every category key to its criteria
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstructionCatalog {
    sets: IndexMap<CategoryKey, InstructionSet>,
}

impl InstructionCatalog {
    /// Empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with condensed MQM criteria for all 21 keys
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for key in CategoryKey::all() {
            let criteria = match key {
                CategoryKey::Stage1(group) => stage1_criteria(group),
                CategoryKey::Stage2(sub) => stage2_criteria(sub),
                CategoryKey::Stage3(group) => stage3_criteria(group),
            };
            catalog.insert(InstructionSet {
                id: InstructionSet::id_for(key),
                key,
                criteria,
            });
        }
        catalog
    }

    /// Add or replace the criteria for a key
    pub fn insert(&mut self, set: InstructionSet) -> Option<InstructionSet> {
        self.sets.insert(set.key, set)
    }

    /// Criteria for a key
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` if the key has no entry
    pub fn get(&self, key: CategoryKey) -> CoreResult<&InstructionSet> {
        self.sets.get(&key).ok_or_else(|| CoreError::NotFound {
            kind: "InstructionSet".to_string(),
            id: key.as_str().to_string(),
        })
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True if the catalog has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &InstructionSet> {
        self.sets.values()
    }
}

fn stage1_criteria(group: SuperCategory) -> String {
    let (role, errors, rules) = match group {
        SuperCategory::Accuracy => (
            "You are an expert machine translation evaluator. Determine whether the MACHINE \
             TRANSLATED SENTENCE contains ACCURACY errors when compared to the SOURCE SENTENCE \
             and REFERENCE SENTENCE.",
            "missing information (omission); added information not present in the source; \
             incorrect meaning (mistranslation); untranslated words or phrases",
            "Focus strictly on meaning transfer and ignore stylistic or fluency issues. If \
             meaning is perfectly preserved the probability should be close to 0; if it is \
             clearly distorted or incomplete, close to 1.",
        ),
        SuperCategory::Fluency => (
            "You are an expert linguistic quality evaluator. Determine whether the MACHINE \
             TRANSLATED SENTENCE contains FLUENCY errors in the target language.",
            "grammar mistakes; spelling mistakes; incorrect punctuation; awkward syntax; \
             register mismatch; character encoding issues",
            "Evaluate only linguistic well-formedness, not semantic accuracy. Consider whether \
             a native speaker would find the sentence natural.",
        ),
        SuperCategory::Terminology => (
            "You are a terminology consistency expert. Determine whether the MACHINE \
             TRANSLATED SENTENCE contains TERMINOLOGY errors.",
            "domain-specific terms translated incorrectly; inconsistent term usage; \
             inappropriate terminology for the context",
            "Focus strictly on term usage and ignore general grammar and style. If technical \
             terms are perfectly preserved the probability should be low.",
        ),
        SuperCategory::Style => (
            "You are a stylistic evaluator. Determine whether the MACHINE TRANSLATED SENTENCE \
             contains STYLE errors.",
            "awkward phrasing; tone inconsistency; stylistic choices inappropriate for the \
             context",
            "Focus on tone, phrasing and stylistic alignment. Do not evaluate meaning or \
             grammar unless it affects style.",
        ),
    };
    format!(
        "{}\n\nErrors in this category include: {}.\n\n{} Justify your reasoning with concrete \
         words or phrases from the sentences.",
        role, errors, rules
    )
}

const STAGE2_PREAMBLE: &str = "You are a second-level expert evaluator in a hierarchical \
machine translation evaluation framework. You are given the source sentence, the machine \
translated sentence, the reference sentence and the Stage-1 evaluation for a broad error \
category. Do not blindly trust Stage-1: critically assess it for one sub-category only. Do not \
evaluate other error types, ignore Stage-1 reasoning outside your scope, use direct textual \
evidence, do not hallucinate missing or added content, and be conservative when unsure.";

fn stage2_criteria(sub: SubCategory) -> String {
    let (name, definition, notes) = match sub {
        SubCategory::Addition => (
            "ADDITION",
            "the translation introduces information that does not exist in the source",
            "Paraphrasing is not addition. Clarification is not addition unless new meaning \
             is introduced.",
        ),
        SubCategory::Omission => (
            "OMISSION",
            "information present in the source is missing from the translation",
            "Implicit meaning preservation and minor stylistic compression do not count as \
             omission.",
        ),
        SubCategory::Mistranslation => (
            "MISTRANSLATION",
            "meaning from the source is transferred incorrectly or distorted",
            "Lexical variation alone is not mistranslation. Cite the exact words as evidence.",
        ),
        SubCategory::UntranslatedText => (
            "UNTRANSLATED TEXT",
            "source-language words remain unchanged in the translation without justification",
            "Proper names and accepted loanwords may be legitimately preserved.",
        ),
        SubCategory::Punctuation => (
            "PUNCTUATION",
            "punctuation marks are incorrect, missing or misplaced",
            "Do not evaluate grammar or style unless directly related to punctuation.",
        ),
        SubCategory::Spelling => (
            "SPELLING",
            "words contain orthographic mistakes in the target language",
            "Ignore grammar and punctuation. Ignore capitalization unless it changes meaning.",
        ),
        SubCategory::Grammar => (
            "GRAMMAR",
            "agreement, tense, word order or sentence structure violate target-language syntax",
            "Do not assess meaning accuracy. Stylistic awkwardness alone is not a grammatical \
             error.",
        ),
        SubCategory::Register => (
            "REGISTER",
            "the tone or level of formality does not match the source context",
            "Minor stylistic variation does not imply a register mismatch.",
        ),
        SubCategory::Inconsistency => (
            "INTERNAL INCONSISTENCY",
            "terms or references are used inconsistently within the translation itself",
            "Ignore terminology domain issues; look only within this sentence.",
        ),
        SubCategory::CharacterEncoding => (
            "CHARACTER ENCODING",
            "the text contains corrupted characters, unreadable symbols or encoding artifacts",
            "If the text is fully readable and correctly encoded the probability should be \
             near 0.",
        ),
        SubCategory::InappropriateForContext => (
            "INAPPROPRIATE TERMINOLOGY",
            "domain-specific terms are translated in a way that does not fit the domain meaning",
            "Do not consider general grammar; focus on domain precision.",
        ),
        SubCategory::InconsistencyUse => (
            "TERMINOLOGY INCONSISTENT USE",
            "the same source term is translated differently within the translation",
            "If the term occurs only once the probability should be near 0.",
        ),
        SubCategory::Awkward => (
            "AWKWARD STYLE",
            "the phrasing is unnatural or clumsy for a native reader although it is \
             grammatical",
            "Base the verdict on specific phrases, not on meaning.",
        ),
    };
    format!(
        "{}\n\nYou are evaluating {} errors only. Such an error occurs when {}.\n\nIdentify \
         concrete instances, state explicitly whether you agree or disagree with Stage-1, and \
         re-evaluate the probability strictly for this sub-category. {}",
        STAGE2_PREAMBLE, name, definition, notes
    )
}

fn stage3_criteria(group: SuperCategory) -> String {
    format!(
        "You are a senior meta-evaluator. You are given the Stage-1 {group} evaluation and all \
         {group} sub-category evaluations.\n\nDetermine how consistent the agents are with each \
         other and verify whether the flagged errors truly exist. Do not re-evaluate from \
         scratch; verify only on the evidence provided by prior agents.\n\nIf at least one \
         verified {group} error exists return YES, otherwise return NO. Provide brief \
         reasoning.",
        group = group
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_covers_all_keys() {
        let catalog = InstructionCatalog::standard();
        assert_eq!(catalog.len(), CategoryKey::COUNT);
        for key in CategoryKey::all() {
            let set = catalog.get(key).unwrap();
            assert_eq!(set.key, key);
            assert!(!set.criteria.is_empty());
        }
    }

    #[test]
    fn test_instruction_ids() {
        assert_eq!(
            InstructionSet::id_for(SuperCategory::Accuracy.stage1_key()),
            "mqm.accuracy.stage1"
        );
        assert_eq!(
            InstructionSet::id_for(CategoryKey::Stage2(SubCategory::CharacterEncoding)),
            "mqm.fluency.characterEncoding.stage2"
        );
        assert_eq!(
            InstructionSet::id_for(SuperCategory::Terminology.stage3_key()),
            "mqm.terminology.stage3"
        );
    }

    #[test]
    fn test_ids_unique() {
        let catalog = InstructionCatalog::standard();
        let mut ids: Vec<_> = catalog.iter().map(|s| s.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), CategoryKey::COUNT);
    }

    #[test]
    fn test_missing_key_not_found() {
        let catalog = InstructionCatalog::new();
        let err = catalog.get(SuperCategory::Style.stage1_key()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_criteria_are_scoped() {
        let catalog = InstructionCatalog::standard();
        let grammar = catalog.get(CategoryKey::Stage2(SubCategory::Grammar)).unwrap();
        assert!(grammar.criteria.contains("GRAMMAR errors only"));
        let style3 = catalog.get(SuperCategory::Style.stage3_key()).unwrap();
        assert!(style3.criteria.contains("return YES"));
    }
}
