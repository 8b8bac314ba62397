use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ItemId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// An item whose payload cannot be rendered or answered.
///
/// This blocks submission for the item; it is never reported as a wrong answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MalformedItem {
    #[error("item {0} has no answer options")]
    NoChoices(ItemId),
    #[error("item {0} has no match pairs configured")]
    NoPairs(ItemId),
    #[error("item {item_id} has duplicate left value {left:?}")]
    DuplicateLeft { item_id: ItemId, left: String },
    #[error("item {item_id} has unsupported type {type_tag:?}")]
    Unsupported { item_id: ItemId, type_tag: String },
}

//
// ─── ITEM ──────────────────────────────────────────────────────────────────────
//

/// Kind tag of an item, as far as the runner cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    SingleChoice,
    TrueFalse,
    MatchPairs,
    Cloze,
    Unsupported,
}

/// One canonical left→right association of a match item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

impl MatchPair {
    #[must_use]
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Kind-specific part of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPayload {
    /// Multiple choice; `correct` must equal one option byte-for-byte.
    SingleChoice { choices: Vec<String>, correct: String },
    TrueFalse { choices: Vec<String>, correct: String },
    MatchPairs { pairs: Vec<MatchPair> },
    /// Free-text gap fill, graded by exact equality like single choice.
    Cloze { correct: String },
    Unsupported { type_tag: String },
}

/// One question/exercise unit. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    stem: String,
    payload: ItemPayload,
    explanation: Option<String>,
}

impl Item {
    #[must_use]
    pub fn new(
        id: ItemId,
        stem: impl Into<String>,
        payload: ItemPayload,
        explanation: Option<String>,
    ) -> Self {
        Self {
            id,
            stem: stem.into(),
            payload,
            explanation: explanation.filter(|text| !text.trim().is_empty()),
        }
    }

    /// Convenience constructor for a single-choice item.
    #[must_use]
    pub fn single_choice<S: Into<String>>(
        id: ItemId,
        stem: impl Into<String>,
        choices: impl IntoIterator<Item = S>,
        correct: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            stem,
            ItemPayload::SingleChoice {
                choices: choices.into_iter().map(Into::into).collect(),
                correct: correct.into(),
            },
            None,
        )
    }

    /// Convenience constructor for a match-pairs item.
    #[must_use]
    pub fn match_pairs(
        id: ItemId,
        stem: impl Into<String>,
        pairs: impl IntoIterator<Item = MatchPair>,
    ) -> Self {
        Self::new(
            id,
            stem,
            ItemPayload::MatchPairs {
                pairs: pairs.into_iter().collect(),
            },
            None,
        )
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        self.explanation = (!explanation.trim().is_empty()).then_some(explanation);
        self
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    #[must_use]
    pub fn payload(&self) -> &ItemPayload {
        &self.payload
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match &self.payload {
            ItemPayload::SingleChoice { .. } => ItemKind::SingleChoice,
            ItemPayload::TrueFalse { .. } => ItemKind::TrueFalse,
            ItemPayload::MatchPairs { .. } => ItemKind::MatchPairs,
            ItemPayload::Cloze { .. } => ItemKind::Cloze,
            ItemPayload::Unsupported { .. } => ItemKind::Unsupported,
        }
    }

    /// Options to present for choice items; empty for every other kind.
    #[must_use]
    pub fn choices(&self) -> &[String] {
        match &self.payload {
            ItemPayload::SingleChoice { choices, .. } | ItemPayload::TrueFalse { choices, .. } => {
                choices
            }
            _ => &[],
        }
    }

    /// Canonical pairs for match items; empty for every other kind.
    #[must_use]
    pub fn pairs(&self) -> &[MatchPair] {
        match &self.payload {
            ItemPayload::MatchPairs { pairs } => pairs,
            _ => &[],
        }
    }

    /// Human-readable canonical answer, used by feedback and the summary.
    ///
    /// Match items render as `left → right` joined by `; `.
    #[must_use]
    pub fn canonical_answer(&self) -> String {
        match &self.payload {
            ItemPayload::SingleChoice { correct, .. }
            | ItemPayload::TrueFalse { correct, .. }
            | ItemPayload::Cloze { correct } => correct.clone(),
            ItemPayload::MatchPairs { pairs } => pairs
                .iter()
                .map(|pair| format!("{} → {}", pair.left, pair.right))
                .collect::<Vec<_>>()
                .join("; "),
            ItemPayload::Unsupported { .. } => String::new(),
        }
    }

    /// Checks that the payload can be presented and answered.
    ///
    /// # Errors
    ///
    /// Returns `MalformedItem` when a choice item has no options, a match item has
    /// no pairs or repeats a left value, or the type is unsupported.
    pub fn validate_payload(&self) -> Result<(), MalformedItem> {
        match &self.payload {
            ItemPayload::SingleChoice { choices, .. } | ItemPayload::TrueFalse { choices, .. } => {
                if choices.is_empty() {
                    return Err(MalformedItem::NoChoices(self.id));
                }
                Ok(())
            }
            ItemPayload::MatchPairs { pairs } => {
                if pairs.is_empty() {
                    return Err(MalformedItem::NoPairs(self.id));
                }
                for (idx, pair) in pairs.iter().enumerate() {
                    if pairs[..idx].iter().any(|prev| prev.left == pair.left) {
                        return Err(MalformedItem::DuplicateLeft {
                            item_id: self.id,
                            left: pair.left.clone(),
                        });
                    }
                }
                Ok(())
            }
            ItemPayload::Cloze { .. } => Ok(()),
            ItemPayload::Unsupported { type_tag } => Err(MalformedItem::Unsupported {
                item_id: self.id,
                type_tag: type_tag.clone(),
            }),
        }
    }
}
