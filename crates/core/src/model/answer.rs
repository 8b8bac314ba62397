use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ItemId;

/// What the student submitted for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Submission {
    /// A choice string (single choice, true/false) or typed text (cloze).
    Text(String),
    /// A left→right assignment for a match item.
    Mapping(BTreeMap<String, String>),
}

impl Submission {
    #[must_use]
    pub fn choice(value: impl Into<String>) -> Self {
        Submission::Text(value.into())
    }

    #[must_use]
    pub fn mapping<L, R>(pairs: impl IntoIterator<Item = (L, R)>) -> Self
    where
        L: Into<String>,
        R: Into<String>,
    {
        Submission::Mapping(
            pairs
                .into_iter()
                .map(|(left, right)| (left.into(), right.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Submission::Text(text) => f.write_str(text),
            Submission::Mapping(map) => {
                let mut first = true;
                for (left, right) in map {
                    if !first {
                        f.write_str("; ")?;
                    }
                    first = false;
                    write!(f, "{left} → {right}")?;
                }
                Ok(())
            }
        }
    }
}

/// One committed answer. Created exactly once per item; never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub item_id: ItemId,
    pub submission: Submission,
    pub is_correct: bool,
    pub started_at: DateTime<Utc>,
    pub answered_at: DateTime<Utc>,
}

impl AnswerRecord {
    /// Time spent on the item, clamped at zero if the clock moved backwards.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.answered_at - self.started_at).max(Duration::zero())
    }

    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }
}
