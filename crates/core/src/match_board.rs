//! Presentation aid for match-pairs items.
//!
//! The board shuffles the right-hand values once per render and keeps each
//! right value assigned to at most one left value. It never relaxes grading:
//! the final submission still goes through [`crate::evaluator::evaluate`].

use std::collections::BTreeMap;

use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::model::{Item, MalformedItem, Submission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MatchBoardError {
    #[error(transparent)]
    Malformed(#[from] MalformedItem),
    #[error("unknown left value {0:?}")]
    UnknownLeft(String),
    #[error("unknown right value {0:?}")]
    UnknownRight(String),
    #[error("right value {right:?} is already assigned to {left:?}")]
    RightTaken { right: String, left: String },
}

/// Assignment state for one rendered match item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchBoard {
    lefts: Vec<String>,
    rights: Vec<String>,
    assignments: BTreeMap<String, String>,
}

impl MatchBoard {
    /// Builds a board with the right values shuffled by the thread rng.
    ///
    /// # Errors
    ///
    /// Returns `MatchBoardError::Malformed` if the item is not a usable match item.
    pub fn new(item: &Item) -> Result<Self, MatchBoardError> {
        Self::with_rng(item, &mut rng())
    }

    /// Builds a board using the given rng for the uniform shuffle.
    ///
    /// # Errors
    ///
    /// Returns `MatchBoardError::Malformed` if the item is not a usable match item.
    pub fn with_rng<R: Rng + ?Sized>(item: &Item, rng: &mut R) -> Result<Self, MatchBoardError> {
        item.validate_payload()?;
        let pairs = item.pairs();
        if pairs.is_empty() {
            return Err(MalformedItem::NoPairs(item.id()).into());
        }

        let lefts = pairs.iter().map(|pair| pair.left.clone()).collect();
        let mut rights: Vec<String> = pairs.iter().map(|pair| pair.right.clone()).collect();
        rights.as_mut_slice().shuffle(rng);

        Ok(Self {
            lefts,
            rights,
            assignments: BTreeMap::new(),
        })
    }

    /// Left values in canonical order.
    #[must_use]
    pub fn lefts(&self) -> &[String] {
        &self.lefts
    }

    /// Right values in presentation (shuffled) order.
    #[must_use]
    pub fn rights(&self) -> &[String] {
        &self.rights
    }

    #[must_use]
    pub fn assigned(&self, left: &str) -> Option<&str> {
        self.assignments.get(left).map(String::as_str)
    }

    /// Right values a given left may still pick: its own current value plus
    /// every value no other left holds.
    #[must_use]
    pub fn available_for(&self, left: &str) -> Vec<&str> {
        self.rights
            .iter()
            .filter(|right| {
                self.assignments
                    .iter()
                    .all(|(other, taken)| other == left || taken != *right)
            })
            .map(String::as_str)
            .collect()
    }

    /// Assigns `right` to `left`, replacing any previous value for `left`.
    ///
    /// # Errors
    ///
    /// Returns an error if either value is unknown or `right` is held by another left.
    pub fn assign(&mut self, left: &str, right: &str) -> Result<(), MatchBoardError> {
        if !self.lefts.iter().any(|l| l == left) {
            return Err(MatchBoardError::UnknownLeft(left.to_string()));
        }
        if !self.rights.iter().any(|r| r == right) {
            return Err(MatchBoardError::UnknownRight(right.to_string()));
        }
        if let Some((holder, _)) = self
            .assignments
            .iter()
            .find(|(other, taken)| other.as_str() != left && taken.as_str() == right)
        {
            return Err(MatchBoardError::RightTaken {
                right: right.to_string(),
                left: holder.clone(),
            });
        }
        self.assignments.insert(left.to_string(), right.to_string());
        Ok(())
    }

    pub fn clear(&mut self, left: &str) {
        self.assignments.remove(left);
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.lefts.iter().all(|left| self.assignments.contains_key(left))
    }

    /// Current assignments as a submission; incomplete boards still grade as wrong.
    #[must_use]
    pub fn submission(&self) -> Submission {
        Submission::Mapping(self.assignments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::model::{ItemId, MatchPair};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn item() -> Item {
        Item::match_pairs(
            ItemId::random(),
            "Capitals",
            [
                MatchPair::new("France", "Paris"),
                MatchPair::new("Italy", "Rome"),
                MatchPair::new("Spain", "Madrid"),
            ],
        )
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let item = item();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let board = MatchBoard::with_rng(&item, &mut rng).unwrap();
            let mut shown = board.rights().to_vec();
            shown.sort();
            assert_eq!(shown, vec!["Madrid", "Paris", "Rome"]);
        }
    }

    #[test]
    fn shuffle_reaches_every_ordering() {
        let item = item();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..600 {
            let board = MatchBoard::with_rng(&item, &mut rng).unwrap();
            seen.insert(board.rights().to_vec());
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn assigned_right_is_hidden_from_other_lefts() {
        let mut board = MatchBoard::with_rng(&item(), &mut StdRng::seed_from_u64(1)).unwrap();
        board.assign("France", "Paris").unwrap();

        assert!(!board.available_for("Italy").contains(&"Paris"));
        assert!(board.available_for("France").contains(&"Paris"));

        let err = board.assign("Italy", "Paris").unwrap_err();
        assert_eq!(
            err,
            MatchBoardError::RightTaken {
                right: "Paris".into(),
                left: "France".into()
            }
        );
    }

    #[test]
    fn clearing_releases_the_right_value() {
        let mut board = MatchBoard::with_rng(&item(), &mut StdRng::seed_from_u64(1)).unwrap();
        board.assign("France", "Rome").unwrap();
        board.clear("France");
        board.assign("Italy", "Rome").unwrap();
        assert_eq!(board.assigned("Italy"), Some("Rome"));
        assert_eq!(board.assigned("France"), None);
    }

    #[test]
    fn complete_board_grades_through_evaluator() {
        let item = item();
        let mut board = MatchBoard::with_rng(&item, &mut StdRng::seed_from_u64(3)).unwrap();
        board.assign("France", "Paris").unwrap();
        board.assign("Italy", "Rome").unwrap();
        assert!(!board.is_complete());
        assert_eq!(evaluate(&item, &board.submission()), Ok(false));

        board.assign("Spain", "Madrid").unwrap();
        assert!(board.is_complete());
        assert_eq!(evaluate(&item, &board.submission()), Ok(true));
    }

    #[test]
    fn rejects_items_without_pairs() {
        let empty = Item::match_pairs(ItemId::random(), "Empty", Vec::new());
        assert!(matches!(
            MatchBoard::new(&empty),
            Err(MatchBoardError::Malformed(MalformedItem::NoPairs(_)))
        ));
    }
}
