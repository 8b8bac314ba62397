//! Kind-dispatched answer evaluation.
//!
//! Evaluation is a pure function of the item and the submission. Scoring is
//! all-or-nothing: there is no partial credit and no normalization of text.

use thiserror::Error;

use crate::model::{Item, ItemId, ItemKind, ItemPayload, MalformedItem, MatchPair, Submission};

/// Reasons an item cannot be evaluated at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error(transparent)]
    Malformed(#[from] MalformedItem),
    #[error("submission shape does not fit {kind:?} item {item_id}")]
    ShapeMismatch { item_id: ItemId, kind: ItemKind },
}

/// Returns whether `submission` is a correct answer to `item`.
///
/// - Single choice, true/false and cloze: byte-for-byte equality with the
///   designated correct value.
/// - Match pairs: the mapping must assign every left value, every assignment
///   must equal that pair's canonical right value, and no unknown left values
///   may appear.
///
/// # Errors
///
/// Returns `EvaluationError::Malformed` when the payload cannot be answered and
/// `EvaluationError::ShapeMismatch` when a mapping is sent for a text item or
/// the other way around.
pub fn evaluate(item: &Item, submission: &Submission) -> Result<bool, EvaluationError> {
    item.validate_payload()?;

    match (item.payload(), submission) {
        (
            ItemPayload::SingleChoice { correct, .. }
            | ItemPayload::TrueFalse { correct, .. }
            | ItemPayload::Cloze { correct },
            Submission::Text(value),
        ) => Ok(value == correct),
        (ItemPayload::MatchPairs { pairs }, Submission::Mapping(mapping)) => {
            Ok(mapping_matches(pairs, mapping))
        }
        _ => Err(EvaluationError::ShapeMismatch {
            item_id: item.id(),
            kind: item.kind(),
        }),
    }
}

fn mapping_matches(
    pairs: &[MatchPair],
    mapping: &std::collections::BTreeMap<String, String>,
) -> bool {
    let complete = pairs.iter().all(|pair| mapping.contains_key(&pair.left));
    let exact = pairs
        .iter()
        .all(|pair| mapping.get(&pair.left) == Some(&pair.right));
    let no_strays = mapping.len() == pairs.len();
    complete && exact && no_strays
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, MatchPair};

    fn choice_item(correct: &str) -> Item {
        Item::single_choice(ItemId::random(), "Capital of France?", ["Paris", "Rome"], correct)
    }

    fn match_item() -> Item {
        Item::match_pairs(
            ItemId::random(),
            "Pair them",
            [MatchPair::new("A", "1"), MatchPair::new("B", "2")],
        )
    }

    #[test]
    fn single_choice_requires_exact_bytes() {
        let item = choice_item("Paris");
        assert_eq!(evaluate(&item, &Submission::choice("Paris")), Ok(true));
        assert_eq!(evaluate(&item, &Submission::choice("paris")), Ok(false));
        assert_eq!(evaluate(&item, &Submission::choice("Paris ")), Ok(false));
        assert_eq!(evaluate(&item, &Submission::choice("Rome")), Ok(false));
    }

    #[test]
    fn trailing_whitespace_in_canonical_value_is_not_normalized() {
        let item = choice_item("Paris\n");
        assert_eq!(evaluate(&item, &Submission::choice("Paris")), Ok(false));
    }

    #[test]
    fn exact_match_mapping_is_correct() {
        let submission = Submission::mapping([("A", "1"), ("B", "2")]);
        assert_eq!(evaluate(&match_item(), &submission), Ok(true));
    }

    #[test]
    fn duplicate_right_value_is_incorrect() {
        let submission = Submission::mapping([("A", "1"), ("B", "1")]);
        assert_eq!(evaluate(&match_item(), &submission), Ok(false));
    }

    #[test]
    fn partial_mapping_is_incorrect() {
        let submission = Submission::mapping([("A", "1")]);
        assert_eq!(evaluate(&match_item(), &submission), Ok(false));
    }

    #[test]
    fn swapped_mapping_is_incorrect() {
        let submission = Submission::mapping([("A", "2"), ("B", "1")]);
        assert_eq!(evaluate(&match_item(), &submission), Ok(false));
    }

    #[test]
    fn unknown_left_value_is_incorrect() {
        let submission = Submission::mapping([("A", "1"), ("B", "2"), ("C", "3")]);
        assert_eq!(evaluate(&match_item(), &submission), Ok(false));
    }

    #[test]
    fn match_item_without_pairs_blocks_evaluation() {
        let item = Item::match_pairs(ItemId::random(), "Empty", Vec::new());
        let err = evaluate(&item, &Submission::mapping(Vec::<(String, String)>::new())).unwrap_err();
        assert!(matches!(err, EvaluationError::Malformed(MalformedItem::NoPairs(_))));
    }

    #[test]
    fn choice_item_without_options_blocks_evaluation() {
        let item = Item::single_choice(ItemId::random(), "Q", Vec::<String>::new(), "x");
        let err = evaluate(&item, &Submission::choice("x")).unwrap_err();
        assert!(matches!(err, EvaluationError::Malformed(MalformedItem::NoChoices(_))));
    }

    #[test]
    fn wrong_submission_shape_is_an_error_not_a_wrong_answer() {
        let err = evaluate(&choice_item("Paris"), &Submission::mapping([("A", "1")])).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::ShapeMismatch {
                kind: ItemKind::SingleChoice,
                ..
            }
        ));
    }
}
