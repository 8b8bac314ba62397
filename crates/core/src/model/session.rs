use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::evaluator::{EvaluationError, evaluate};
use crate::model::{
    ActivityKind, ActivityKindId, AnswerRecord, ContentScopeId, Item, ItemId, SessionId,
    SessionMode, StudentId, SubjectId, Submission, TermId,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no items available for session")]
    Empty,
    #[error("session already finished")]
    Terminal,
    #[error("current item has not been answered yet")]
    NotAnswered,
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

//
// ─── SCOPE AND STATE ───────────────────────────────────────────────────────────
//

/// Who the session is for and which content it draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionScope {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub term_id: TermId,
    pub content_scope_id: Option<ContentScopeId>,
    pub activity_kind: ActivityKind,
    pub activity_kind_id: ActivityKindId,
}

/// Sub-state of the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPhase {
    Unanswered,
    Answered,
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// The student advanced past the last item.
    Completed,
    /// The exam countdown reached zero.
    TimeExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Terminal {
    reason: TerminalReason,
    at: DateTime<Utc>,
}

/// Result of submitting an answer for the current item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded(AnswerRecord),
    /// The item already holds an answer; nothing changed.
    AlreadyAnswered,
}

/// Result of moving past the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next { cursor: usize },
    Finished,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One attempt at an activity: the ordered items, the cursor and the answers.
///
/// A session has a single owner. Answers are committed once per item, the
/// cursor never moves backwards and the score only grows as answers land.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    scope: SessionScope,
    mode: SessionMode,
    items: Vec<Item>,
    cursor: usize,
    answers: HashMap<ItemId, AnswerRecord>,
    score: u32,
    started_at: DateTime<Utc>,
    terminal: Option<Terminal>,
}

impl Session {
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `items` is empty.
    pub fn new(
        id: SessionId,
        scope: SessionScope,
        mode: SessionMode,
        items: Vec<Item>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if items.is_empty() {
            return Err(SessionError::Empty);
        }
        Ok(Self {
            id,
            scope,
            mode,
            items,
            cursor: 0,
            answers: HashMap::new(),
            score: 0,
            started_at,
            terminal: None,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn answer_for(&self, item_id: ItemId) -> Option<&AnswerRecord> {
        self.answers.get(&item_id)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    #[must_use]
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal.map(|t| t.reason)
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.terminal.map(|t| t.at)
    }

    /// The item being presented, or `None` once the session is terminal.
    #[must_use]
    pub fn current_item(&self) -> Option<&Item> {
        if self.is_terminal() {
            return None;
        }
        self.items.get(self.cursor)
    }

    #[must_use]
    pub fn item_phase(&self) -> ItemPhase {
        match self.items.get(self.cursor) {
            Some(item) if self.answers.contains_key(&item.id()) => ItemPhase::Answered,
            _ => ItemPhase::Unanswered,
        }
    }

    /// Evaluate and commit an answer for the current item.
    ///
    /// A second submission for an item that already holds an answer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` once the session is finished, and
    /// `SessionError::Evaluation` when the item cannot be evaluated; in that case
    /// nothing is recorded.
    pub fn submit(
        &mut self,
        submission: Submission,
        started_at: DateTime<Utc>,
        answered_at: DateTime<Utc>,
    ) -> Result<SubmitOutcome, SessionError> {
        let item = self.current_item().ok_or(SessionError::Terminal)?;
        if self.answers.contains_key(&item.id()) {
            return Ok(SubmitOutcome::AlreadyAnswered);
        }

        let is_correct = evaluate(item, &submission)?;
        let record = AnswerRecord {
            item_id: item.id(),
            submission,
            is_correct,
            started_at,
            answered_at,
        };

        if is_correct {
            self.score = self.score.saturating_add(1);
        }
        self.answers.insert(record.item_id, record.clone());
        Ok(SubmitOutcome::Recorded(record))
    }

    /// Move past the answered current item, finishing the session after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Terminal` if already finished and
    /// `SessionError::NotAnswered` if the current item has no answer.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Advance, SessionError> {
        if self.is_terminal() {
            return Err(SessionError::Terminal);
        }
        if self.item_phase() != ItemPhase::Answered {
            return Err(SessionError::NotAnswered);
        }

        if self.cursor + 1 < self.items.len() {
            self.cursor += 1;
            return Ok(Advance::Next {
                cursor: self.cursor,
            });
        }

        self.terminate(TerminalReason::Completed, now);
        Ok(Advance::Finished)
    }

    /// Freeze the session. Returns `true` only for the call that actually did it.
    pub fn terminate(&mut self, reason: TerminalReason, at: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.terminal = Some(Terminal { reason, at });
        true
    }

    /// Per-item review built purely from local state.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        let rows = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let answer = self.answers.get(&item.id());
                SummaryRow {
                    position: idx + 1,
                    item_id: item.id(),
                    stem: item.stem().to_string(),
                    submitted: answer.map(|a| a.submission.to_string()),
                    canonical: item.canonical_answer(),
                    status: match answer {
                        Some(a) if a.is_correct => AnswerStatus::Correct,
                        Some(_) => AnswerStatus::Incorrect,
                        None => AnswerStatus::Unanswered,
                    },
                }
            })
            .collect();

        SessionSummary {
            session_id: self.id,
            score: self.score,
            total: self.items.len(),
            started_at: self.started_at,
            ended_at: self.ended_at(),
            reason: self.terminal_reason(),
            rows,
        }
    }
}

//
// ─── SUMMARY ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    Correct,
    Incorrect,
    Unanswered,
}

impl AnswerStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AnswerStatus::Correct => "correct",
            AnswerStatus::Incorrect => "incorrect",
            AnswerStatus::Unanswered => "unanswered",
        }
    }
}

/// One line of the post-session review table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub position: usize,
    pub item_id: ItemId,
    pub stem: String,
    pub submitted: Option<String>,
    pub canonical: String,
    pub status: AnswerStatus,
}

/// Final tally and review rows of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub score: u32,
    pub total: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub reason: Option<TerminalReason>,
    pub rows: Vec<SummaryRow>,
}

impl SessionSummary {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.status == AnswerStatus::Unanswered)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchPair;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn scope() -> SessionScope {
        SessionScope {
            student_id: StudentId::random(),
            subject_id: SubjectId::random(),
            term_id: TermId::random(),
            content_scope_id: None,
            activity_kind: ActivityKind::Quiz,
            activity_kind_id: ActivityKindId::random(),
        }
    }

    fn quiz(n: usize) -> Session {
        let items = (0..n)
            .map(|i| {
                Item::single_choice(
                    ItemId::random(),
                    format!("Q{i}"),
                    ["right", "wrong"],
                    "right",
                )
            })
            .collect();
        Session::new(SessionId::random(), scope(), SessionMode::Practice, items, fixed_now())
            .unwrap()
    }

    fn answer(session: &mut Session, value: &str) -> SubmitOutcome {
        let now = fixed_now();
        session
            .submit(Submission::choice(value), now, now + Duration::seconds(2))
            .unwrap()
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let err = Session::new(
            SessionId::random(),
            scope(),
            SessionMode::Practice,
            Vec::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }

    #[test]
    fn second_submission_is_a_no_op() {
        let mut session = quiz(2);
        assert!(matches!(answer(&mut session, "wrong"), SubmitOutcome::Recorded(_)));
        assert_eq!(answer(&mut session, "right"), SubmitOutcome::AlreadyAnswered);
        assert_eq!(session.score(), 0);
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn advance_requires_an_answer() {
        let mut session = quiz(2);
        assert_eq!(session.advance(fixed_now()), Err(SessionError::NotAnswered));
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn advancing_past_last_item_terminates() {
        let n = 4;
        let mut session = quiz(n);
        for step in 0..n {
            assert!(session.cursor() < n);
            answer(&mut session, "right");
            let advance = session.advance(fixed_now()).unwrap();
            if step + 1 < n {
                assert_eq!(advance, Advance::Next { cursor: step + 1 });
            } else {
                assert_eq!(advance, Advance::Finished);
            }
        }
        assert!(session.is_terminal());
        assert_eq!(session.terminal_reason(), Some(TerminalReason::Completed));
        assert_eq!(session.cursor(), n - 1);
        assert_eq!(session.current_item(), None);
        assert_eq!(session.advance(fixed_now()), Err(SessionError::Terminal));
    }

    #[test]
    fn terminate_is_idempotent() {
        let mut session = quiz(1);
        let first = fixed_now();
        assert!(session.terminate(TerminalReason::TimeExpired, first));
        assert!(!session.terminate(TerminalReason::Completed, first + Duration::seconds(9)));
        assert_eq!(session.terminal_reason(), Some(TerminalReason::TimeExpired));
        assert_eq!(session.ended_at(), Some(first));
    }

    #[test]
    fn terminal_session_rejects_submissions() {
        let mut session = quiz(2);
        session.terminate(TerminalReason::TimeExpired, fixed_now());
        let err = session
            .submit(Submission::choice("right"), fixed_now(), fixed_now())
            .unwrap_err();
        assert_eq!(err, SessionError::Terminal);
    }

    #[test]
    fn malformed_item_records_nothing() {
        let items = vec![Item::match_pairs(ItemId::random(), "Empty", Vec::<MatchPair>::new())];
        let mut session =
            Session::new(SessionId::random(), scope(), SessionMode::Practice, items, fixed_now())
                .unwrap();
        let err = session
            .submit(Submission::mapping([("A", "1")]), fixed_now(), fixed_now())
            .unwrap_err();
        assert!(matches!(err, SessionError::Evaluation(_)));
        assert_eq!(session.answered_count(), 0);
        assert_eq!(session.item_phase(), ItemPhase::Unanswered);
    }

    #[test]
    fn summary_marks_incorrect_and_unanswered_rows() {
        let mut session = quiz(3);
        answer(&mut session, "right");
        session.advance(fixed_now()).unwrap();
        answer(&mut session, "wrong");
        session.terminate(TerminalReason::TimeExpired, fixed_now());

        let summary = session.summary();
        assert_eq!(summary.score, 1);
        assert_eq!(summary.total, 3);
        let statuses: Vec<_> = summary.rows.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                AnswerStatus::Correct,
                AnswerStatus::Incorrect,
                AnswerStatus::Unanswered
            ]
        );
        assert_eq!(summary.rows[1].submitted.as_deref(), Some("wrong"));
        assert_eq!(summary.rows[1].canonical, "right");
        assert_eq!(summary.rows[2].submitted, None);
        assert_eq!(summary.unanswered(), 1);
    }
}
