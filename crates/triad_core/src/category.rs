//! Category keys and the static group table.
//!
//! Every judgment in an evaluation is addressed by a [`CategoryKey`]. The
//! mapping from a super-category to its ordered sub-categories is a
//! compile-time table; nothing selects sub-categories by comparing strings.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Top-level MT quality dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuperCategory {
    /// Meaning transfer
    Accuracy,
    /// Linguistic well-formedness
    Fluency,
    /// Term usage
    Terminology,
    /// Tone and phrasing
    Style,
}

const ACCURACY_SUBS: [SubCategory; 4] = [
    SubCategory::Addition,
    SubCategory::Omission,
    SubCategory::Mistranslation,
    SubCategory::UntranslatedText,
];

const FLUENCY_SUBS: [SubCategory; 6] = [
    SubCategory::Punctuation,
    SubCategory::Spelling,
    SubCategory::Grammar,
    SubCategory::Register,
    SubCategory::Inconsistency,
    SubCategory::CharacterEncoding,
];

const TERMINOLOGY_SUBS: [SubCategory; 2] = [
    SubCategory::InappropriateForContext,
    SubCategory::InconsistencyUse,
];

const STYLE_SUBS: [SubCategory; 1] = [SubCategory::Awkward];

impl SuperCategory {
    /// All groups in evaluation order
    pub const ALL: [SuperCategory; 4] = [
        SuperCategory::Accuracy,
        SuperCategory::Fluency,
        SuperCategory::Terminology,
        SuperCategory::Style,
    ];

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Fluency => "fluency",
            Self::Terminology => "terminology",
            Self::Style => "style",
        }
    }

    /// Ordered sub-categories of this group
    #[must_use]
    pub const fn sub_categories(self) -> &'static [SubCategory] {
        match self {
            Self::Accuracy => &ACCURACY_SUBS,
            Self::Fluency => &FLUENCY_SUBS,
            Self::Terminology => &TERMINOLOGY_SUBS,
            Self::Style => &STYLE_SUBS,
        }
    }

    /// Key of this group's initial judgment
    #[must_use]
    pub const fn stage1_key(self) -> CategoryKey {
        CategoryKey::Stage1(self)
    }

    /// Key of this group's verification judgment
    #[must_use]
    pub const fn stage3_key(self) -> CategoryKey {
        CategoryKey::Stage3(self)
    }
}

impl std::fmt::Display for SuperCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained error type nested under one super-category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubCategory {
    /// Content not present in the source
    Addition,
    /// Source content missing from the translation
    Omission,
    /// Meaning rendered incorrectly
    Mistranslation,
    /// Source text left untranslated
    UntranslatedText,
    /// Punctuation errors
    Punctuation,
    /// Spelling errors
    Spelling,
    /// Grammar errors
    Grammar,
    /// Wrong formality level
    Register,
    /// Internal inconsistency
    Inconsistency,
    /// Garbled or mis-encoded characters
    CharacterEncoding,
    /// Term unsuitable for the domain
    InappropriateForContext,
    /// Same concept translated with different terms
    InconsistencyUse,
    /// Unnatural phrasing
    Awkward,
}

impl SubCategory {
    /// All sub-categories, grouped in table order
    pub const ALL: [SubCategory; 13] = [
        SubCategory::Addition,
        SubCategory::Omission,
        SubCategory::Mistranslation,
        SubCategory::UntranslatedText,
        SubCategory::Punctuation,
        SubCategory::Spelling,
        SubCategory::Grammar,
        SubCategory::Register,
        SubCategory::Inconsistency,
        SubCategory::CharacterEncoding,
        SubCategory::InappropriateForContext,
        SubCategory::InconsistencyUse,
        SubCategory::Awkward,
    ];

    /// Stable key string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Omission => "omission",
            Self::Mistranslation => "mistranslation",
            Self::UntranslatedText => "untranslated_text",
            Self::Punctuation => "punctuation",
            Self::Spelling => "spelling",
            Self::Grammar => "grammar",
            Self::Register => "register",
            Self::Inconsistency => "inconsistency",
            Self::CharacterEncoding => "characterEncoding",
            Self::InappropriateForContext => "inappropriate_for_context",
            Self::InconsistencyUse => "inconsistency_use",
            Self::Awkward => "awkward",
        }
    }

    /// Owning super-category
    #[must_use]
    pub const fn parent(self) -> SuperCategory {
        match self {
            Self::Addition | Self::Omission | Self::Mistranslation | Self::UntranslatedText => {
                SuperCategory::Accuracy
            }
            Self::Punctuation
            | Self::Spelling
            | Self::Grammar
            | Self::Register
            | Self::Inconsistency
            | Self::CharacterEncoding => SuperCategory::Fluency,
            Self::InappropriateForContext | Self::InconsistencyUse => SuperCategory::Terminology,
            Self::Awkward => SuperCategory::Style,
        }
    }
}

impl Serialize for SubCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SubCategory::ALL
            .into_iter()
            .find(|sub| sub.as_str() == raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown sub-category: {}", raw)))
    }
}

impl std::fmt::Display for SubCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Judgment pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage-1: broad category detection
    Initial,
    /// Stage-2: sub-category re-evaluation of the Stage-1 verdict
    Critique,
    /// Stage-3: meta-verification over a whole group
    Verification,
}

impl Stage {
    /// 1, 2 or 3
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Initial => 1,
            Self::Critique => 2,
            Self::Verification => 3,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage-{}", self.number())
    }
}

/// Key of one judgment slot in the evaluation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryKey {
    /// Initial judgment for a group
    Stage1(SuperCategory),
    /// Re-evaluation for one sub-category
    Stage2(SubCategory),
    /// Verification for a group
    Stage3(SuperCategory),
}

impl CategoryKey {
    /// Number of category keys in a full evaluation
    pub const COUNT: usize = SuperCategory::ALL.len() * 2 + SubCategory::ALL.len();

    /// Every key, Stage-1 first, then Stage-2 in table order, then Stage-3
    #[must_use]
    pub fn all() -> Vec<CategoryKey> {
        let mut keys = Vec::with_capacity(Self::COUNT);
        keys.extend(SuperCategory::ALL.iter().map(|g| CategoryKey::Stage1(*g)));
        keys.extend(SubCategory::ALL.iter().map(|s| CategoryKey::Stage2(*s)));
        keys.extend(SuperCategory::ALL.iter().map(|g| CategoryKey::Stage3(*g)));
        keys
    }

    /// Stable key string, as used in state documents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stage1(SuperCategory::Accuracy) => "accuracyStage1",
            Self::Stage1(SuperCategory::Fluency) => "fluencyStage1",
            Self::Stage1(SuperCategory::Terminology) => "terminologyStage1",
            Self::Stage1(SuperCategory::Style) => "styleStage1",
            Self::Stage2(sub) => sub.as_str(),
            Self::Stage3(SuperCategory::Accuracy) => "accuracyStage3",
            Self::Stage3(SuperCategory::Fluency) => "fluencyStage3",
            Self::Stage3(SuperCategory::Terminology) => "terminologyStage3",
            Self::Stage3(SuperCategory::Style) => "styleStage3",
        }
    }

    /// Judgment pass this key belongs to
    #[must_use]
    pub const fn stage(self) -> Stage {
        match self {
            Self::Stage1(_) => Stage::Initial,
            Self::Stage2(_) => Stage::Critique,
            Self::Stage3(_) => Stage::Verification,
        }
    }

    /// Group this key belongs to
    #[must_use]
    pub const fn group(self) -> SuperCategory {
        match self {
            Self::Stage1(group) | Self::Stage3(group) => group,
            Self::Stage2(sub) => sub.parent(),
        }
    }

    /// Keys that must be recorded before this key can be judged
    ///
    /// Stage-2 depends on its parent's Stage-1; Stage-3 depends on the parent
    /// Stage-1 and every sibling Stage-2 (the group barrier).
    #[must_use]
    pub fn prerequisites(self) -> Vec<CategoryKey> {
        match self {
            Self::Stage1(_) => Vec::new(),
            Self::Stage2(sub) => vec![Self::Stage1(sub.parent())],
            Self::Stage3(group) => {
                let mut keys = vec![Self::Stage1(group)];
                keys.extend(group.sub_categories().iter().map(|s| Self::Stage2(*s)));
                keys
            }
        }
    }
}

impl std::fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKey {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::all()
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| CoreError::ParseError {
                message: format!("unknown category key: {}", s),
            })
    }
}

impl Serialize for CategoryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CategoryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
