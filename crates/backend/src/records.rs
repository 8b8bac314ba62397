//! Wire shapes of the activity API (JSON over HTTP).
//!
//! Field names follow the server contract, which still calls activity kinds
//! "activity types" and content scopes "content uploads".

use activity_core::model::{
    ActivityKindId, ContentScopeId, Item, ItemId, ItemPayload, MatchPair, SessionId, StudentId,
    SubjectId, TermId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Catalog entry for an activity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityKindRecord {
    pub id: ActivityKindId,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `POST /activities/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    pub student_id: StudentId,
    #[serde(rename = "activity_type_id")]
    pub activity_kind_id: ActivityKindId,
    pub subject_id: SubjectId,
    pub term_id: TermId,
    pub topic_id: Option<String>,
    pub item_count: u32,
    #[serde(rename = "content_upload_id")]
    pub content_scope_id: Option<ContentScopeId>,
    pub device_type: String,
}

/// Subset of the session resource the runner reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
}

/// One item as served by `GET /activities/sessions/{id}/items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub stem: String,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl ItemRecord {
    /// A `multiple_choice` item with a bare option list.
    #[must_use]
    pub fn choice<S: Into<String>>(
        stem: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        correct: impl Into<String>,
    ) -> Self {
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        Self {
            id: ItemId::random(),
            type_tag: "multiple_choice".into(),
            stem: stem.into(),
            options: Some(Value::from(options)),
            correct_answer: correct.into(),
            explanation: None,
        }
    }

    /// A `match` item carrying `{pairs: [{left, right}]}`.
    #[must_use]
    pub fn pairs<L: Into<String>, R: Into<String>>(
        stem: impl Into<String>,
        pairs: impl IntoIterator<Item = (L, R)>,
    ) -> Self {
        let pairs: Vec<Value> = pairs
            .into_iter()
            .map(|(left, right)| {
                let (left, right): (String, String) = (left.into(), right.into());
                serde_json::json!({ "left": left, "right": right })
            })
            .collect();
        Self {
            id: ItemId::random(),
            type_tag: "match".into(),
            stem: stem.into(),
            options: Some(serde_json::json!({ "pairs": pairs })),
            correct_answer: String::new(),
            explanation: None,
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Convert the record into a domain `Item`.
    ///
    /// Never fails: unusable payloads become items that report themselves as
    /// malformed when presented, so one bad item does not sink the session.
    #[must_use]
    pub fn into_item(self) -> Item {
        let choices = choices_of(self.options.as_ref());
        let pairs = pairs_of(self.options.as_ref());

        let payload = match self.type_tag.as_str() {
            "multiple_choice" | "single_choice" | "mcq" => ItemPayload::SingleChoice {
                choices,
                correct: self.correct_answer,
            },
            "true_false" => ItemPayload::TrueFalse {
                choices,
                correct: self.correct_answer,
            },
            "match" | "match_pairs" | "matching" => ItemPayload::MatchPairs {
                pairs: pairs.unwrap_or_default(),
            },
            "cloze" | "fill_blank" => ItemPayload::Cloze {
                correct: self.correct_answer,
            },
            other => match pairs {
                Some(pairs) => ItemPayload::MatchPairs { pairs },
                None => ItemPayload::Unsupported {
                    type_tag: other.to_string(),
                },
            },
        };

        Item::new(self.id, self.stem, payload, self.explanation)
    }
}

// Options arrive either as a bare list or as `{choices: [...]}`.
fn choices_of(options: Option<&Value>) -> Vec<String> {
    let list = match options {
        Some(Value::Array(list)) => list,
        Some(Value::Object(map)) => match map.get("choices") {
            Some(Value::Array(list)) => list,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    list.iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

// `None` when the options carry no `pairs` array at all.
fn pairs_of(options: Option<&Value>) -> Option<Vec<MatchPair>> {
    let Some(Value::Array(raw)) = options.and_then(|o| o.get("pairs")) else {
        return None;
    };
    Some(
        raw.iter()
            .filter_map(|pair| {
                let left = pair.get("left")?.as_str()?;
                let right = pair.get("right")?.as_str()?;
                Some(MatchPair::new(left, right))
            })
            .collect(),
    )
}

/// Body of `POST /activities/sessions/{id}/responses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub student_id: StudentId,
    pub item_id: ItemId,
    pub subject_id: SubjectId,
    pub term_id: TermId,
    pub topic_id: Option<String>,
    pub microconcept_id: Option<String>,
    #[serde(rename = "activity_type_id")]
    pub activity_kind_id: ActivityKindId,
    pub is_correct: bool,
    pub duration_ms: i64,
    pub attempt_number: u32,
    pub response_normalized: String,
    pub hint_used: Option<String>,
    pub difficulty_at_time: Option<i32>,
    pub timestamp_start: DateTime<Utc>,
    pub timestamp_end: DateTime<Utc>,
}

/// Body of `POST /activities/sessions/{id}/feedback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub rating: u8,
    pub text: Option<String>,
}

/// Error payload returned by the API.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

impl ErrorBody {
    // Validation errors send a structured detail; keep it readable as text.
    pub(crate) fn into_detail(self) -> Option<String> {
        match self.detail? {
            Value::String(text) => Some(text),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
