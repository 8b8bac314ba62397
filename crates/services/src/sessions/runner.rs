use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use activity_core::model::{
    Advance, Item, ItemKind, ItemPhase, Session, SessionSummary, SubmitOutcome, Submission,
    TerminalReason,
};
use activity_core::{Clock, MatchBoard};
use backend::ActivityBackend;

use super::bootstrap::{SessionBootstrapper, SessionRequest};
use super::feedback::FeedbackForm;
use super::finalize::SessionFinalizer;
use super::progress::SessionProgress;
use super::telemetry::{BestEffort, TelemetryEmitter};
use super::timing::{CountdownTick, ExamCountdown, ItemStopwatch, RunnerEvent, Ticker};
use crate::error::{BootstrapError, FeedbackError, RunnerError};

pub const DEFAULT_DEVICE_TYPE: &str = "cli";

//
// ─── OPTIONS AND STATE ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Sent with every session open.
    pub device_type: String,
    pub countdown_period: StdDuration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            device_type: DEFAULT_DEVICE_TYPE.to_string(),
            countdown_period: StdDuration::from_secs(1),
        }
    }
}

/// Externally visible runner state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Initializing,
    InProgress(ItemPhase),
    Terminal(TerminalReason),
    /// Bootstrap failed; nothing is shown until the next `start`.
    Failed(BootstrapError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Initializing,
    Active,
    Failed(BootstrapError),
}

/// What the student sees right after answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerFeedback {
    Correct,
    Incorrect {
        canonical: String,
        explanation: Option<String>,
    },
    /// Exam mode: correctness stays hidden until the summary.
    Saved,
}

impl AnswerFeedback {
    fn for_item(item: &Item, is_correct: bool, exam: bool) -> Self {
        if exam {
            return AnswerFeedback::Saved;
        }
        if is_correct {
            return AnswerFeedback::Correct;
        }
        AnswerFeedback::Incorrect {
            canonical: item.canonical_answer(),
            explanation: item.explanation().map(str::to_string),
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            AnswerFeedback::Correct => "Correct!".to_string(),
            AnswerFeedback::Incorrect {
                canonical,
                explanation: Some(explanation),
            } => format!("Incorrect. Correct answer: {canonical}. {explanation}"),
            AnswerFeedback::Incorrect { canonical, .. } => {
                format!("Incorrect. Correct answer: {canonical}.")
            }
            AnswerFeedback::Saved => "Answer saved.".to_string(),
        }
    }
}

/// Result of a recorded answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub feedback: AnswerFeedback,
    /// Set when the runner moved on by itself (exam mode).
    pub advanced: Option<Advance>,
}

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Single owner of the active session, its timers and its side effects.
///
/// Lifecycle hooks own the timers: `on_session_start` starts them,
/// `on_item_advance` restarts the item stopwatch and `on_teardown` cancels
/// everything and bumps the generation so that queued events from a previous
/// session are dropped.
pub struct SessionRunner {
    backend: Arc<dyn ActivityBackend>,
    bootstrapper: SessionBootstrapper,
    clock: Clock,
    options: RunnerOptions,
    generation: u64,
    phase: Phase,
    session: Option<Session>,
    board: Option<MatchBoard>,
    stopwatch: Option<ItemStopwatch>,
    countdown: Option<ExamCountdown>,
    countdown_ticker: Option<Ticker>,
    events_tx: UnboundedSender<RunnerEvent>,
    events_rx: UnboundedReceiver<RunnerEvent>,
    telemetry: TelemetryEmitter,
    finalizer: SessionFinalizer,
    feedback: FeedbackForm,
    last_feedback: Option<AnswerFeedback>,
}

impl SessionRunner {
    #[must_use]
    pub fn new(backend: Arc<dyn ActivityBackend>) -> Self {
        Self::with_options(backend, RunnerOptions::default())
    }

    #[must_use]
    pub fn with_options(backend: Arc<dyn ActivityBackend>, options: RunnerOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            bootstrapper: SessionBootstrapper::new(
                Arc::clone(&backend),
                options.device_type.clone(),
            ),
            telemetry: TelemetryEmitter::new(Arc::clone(&backend)),
            backend,
            clock: Clock::default(),
            options,
            generation: 0,
            phase: Phase::Idle,
            session: None,
            board: None,
            stopwatch: None,
            countdown: None,
            countdown_ticker: None,
            events_tx,
            events_rx,
            finalizer: SessionFinalizer::new(),
            feedback: FeedbackForm::new(),
            last_feedback: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Moves a fixed clock forward; used to simulate elapsed time.
    pub fn advance_clock(&mut self, delta: chrono::Duration) {
        self.clock.advance(delta);
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────
    //

    /// Tear down whatever is running and bootstrap a new session.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError` if the session could not be opened. The runner
    /// is left in `RunnerState::Failed` with no session.
    pub async fn start(&mut self, request: SessionRequest) -> Result<(), BootstrapError> {
        self.on_teardown();
        self.phase = Phase::Initializing;

        match self.bootstrapper.open(&request, self.clock).await {
            Ok(session) => {
                self.on_session_start(session);
                Ok(())
            }
            Err(err) => {
                self.phase = Phase::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Leave the runner. Timers stop; in-flight backend calls finish on their own.
    pub fn exit(&mut self) {
        self.on_teardown();
    }

    // Item 0 and the exam deadline are timed from the moment the items arrived.
    fn on_session_start(&mut self, session: Session) {
        let started_at = session.started_at();
        self.stopwatch = Some(ItemStopwatch::start(started_at));
        if let Some(limit) = session.mode().countdown() {
            self.countdown = Some(ExamCountdown::start(started_at, limit));
            self.countdown_ticker = Ticker::spawn(
                self.options.countdown_period,
                self.events_tx.clone(),
                RunnerEvent::CountdownTick {
                    generation: self.generation,
                },
            );
        }
        self.board = board_for(session.current_item());
        self.session = Some(session);
        self.phase = Phase::Active;
    }

    fn on_item_advance(&mut self, now: DateTime<Utc>, cursor: usize) {
        if let Some(stopwatch) = self.stopwatch.as_mut() {
            stopwatch.restart(now);
        }
        self.last_feedback = None;
        self.board = board_for(self.session.as_ref().and_then(Session::current_item));
        debug!("advanced to item {}", cursor + 1);
    }

    fn on_teardown(&mut self) {
        self.cancel_timers();
        self.generation = self.generation.wrapping_add(1);
        while self.events_rx.try_recv().is_ok() {}

        self.session = None;
        self.board = None;
        self.stopwatch = None;
        self.countdown = None;
        self.finalizer = SessionFinalizer::new();
        self.feedback = FeedbackForm::new();
        self.last_feedback = None;
        self.phase = Phase::Idle;
    }

    // Terminal state: stop the clocks and request the backend end once.
    fn on_terminal(&mut self) {
        self.cancel_timers();
        self.board = None;
        if let Some(session) = self.session.as_ref() {
            self.finalizer.settle(session, &mut self.telemetry);
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(ticker) = self.countdown_ticker.take() {
            ticker.cancel();
        }
    }

    //
    // ─── SESSION LOOP ──────────────────────────────────────────────────────
    //

    /// Evaluate and record an answer for the current item.
    ///
    /// Returns `Ok(None)` when the item was already answered. The response is
    /// reported in the background; the local state never waits for it. In
    /// exam mode the runner moves to the next item immediately.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::MalformedItem` when the item cannot be answered
    /// and `RunnerError::Session` when the session is already finished.
    pub fn submit(&mut self, submission: Submission) -> Result<Option<AnswerOutcome>, RunnerError> {
        let now = self.clock.now();
        let session = self.session.as_mut().ok_or(RunnerError::NoActiveSession)?;
        let started_at = self.stopwatch.map_or(now, |s| s.started_at());

        let record = match session.submit(submission, started_at, now)? {
            SubmitOutcome::Recorded(record) => record,
            SubmitOutcome::AlreadyAnswered => return Ok(None),
        };
        self.telemetry
            .record_response(session.scope(), session.id(), &record);

        let exam = session.mode().is_exam();
        let feedback = session
            .current_item()
            .map_or(AnswerFeedback::Saved, |item| {
                AnswerFeedback::for_item(item, record.is_correct, exam)
            });
        self.last_feedback = Some(feedback.clone());

        let advanced = if exam {
            Some(self.advance_at(now)?)
        } else {
            None
        };

        Ok(Some(AnswerOutcome {
            is_correct: record.is_correct,
            feedback,
            advanced,
        }))
    }

    /// Move past the answered item, or finish after the last one.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::Session` if the current item is unanswered or the
    /// session is already finished.
    pub fn next(&mut self) -> Result<Advance, RunnerError> {
        let now = self.clock.now();
        self.advance_at(now)
    }

    fn advance_at(&mut self, now: DateTime<Utc>) -> Result<Advance, RunnerError> {
        let session = self.session.as_mut().ok_or(RunnerError::NoActiveSession)?;
        let step = session.advance(now)?;
        match step {
            Advance::Next { cursor } => self.on_item_advance(now, cursor),
            Advance::Finished => self.on_terminal(),
        }
        Ok(step)
    }

    /// Recompute the exam countdown and force termination when it runs out.
    ///
    /// Returns `None` when no countdown is running.
    pub fn tick(&mut self) -> Option<CountdownTick> {
        let now = self.clock.now();
        let tick = self.countdown.as_mut()?.tick(now);
        if tick.expired {
            if let Some(session) = self.session.as_mut()
                && self.finalizer.force(
                    session,
                    TerminalReason::TimeExpired,
                    now,
                    &mut self.telemetry,
                )
            {
                info!("session {} ran out of time", session.id());
            }
            self.on_terminal();
        }
        Some(tick)
    }

    /// Wait for the next timer event. Pending events may belong to an older
    /// generation; pass them to `handle_event`, which drops those.
    pub async fn next_event(&mut self) -> Option<RunnerEvent> {
        self.events_rx.recv().await
    }

    /// Apply a timer event. Returns `false` for events from a superseded session.
    pub fn handle_event(&mut self, event: RunnerEvent) -> bool {
        if event.generation() != self.generation {
            debug!("dropping stale {event:?}");
            return false;
        }
        let RunnerEvent::CountdownTick { .. } = event;
        self.tick();
        true
    }

    //
    // ─── FEEDBACK ──────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn feedback_form(&self) -> &FeedbackForm {
        &self.feedback
    }

    pub fn feedback_form_mut(&mut self) -> &mut FeedbackForm {
        &mut self.feedback
    }

    /// Send the feedback form once the backend has been told the session ended.
    /// A failed end call is only logged; the feedback is still attempted.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError` if the session is not finished or the backend
    /// rejects the submission; the form keeps its contents for a retry.
    pub async fn submit_feedback(&mut self) -> Result<(), FeedbackError> {
        self.telemetry.wait_for_end().await;
        let session = self
            .session
            .as_ref()
            .ok_or(FeedbackError::SessionNotFinished)?;
        self.feedback.submit(self.backend.as_ref(), session).await
    }

    /// Wait for background backend calls and collect their outcomes.
    pub async fn flush_telemetry(&mut self) -> Vec<BestEffort> {
        self.telemetry.flush().await
    }

    //
    // ─── VIEW ──────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn state(&self) -> RunnerState {
        match (&self.phase, &self.session) {
            (Phase::Initializing, _) => RunnerState::Initializing,
            (Phase::Failed(err), _) => RunnerState::Failed(err.clone()),
            (Phase::Active, Some(session)) => match session.terminal_reason() {
                Some(reason) => RunnerState::Terminal(reason),
                None => RunnerState::InProgress(session.item_phase()),
            },
            (Phase::Idle | Phase::Active, _) => RunnerState::Idle,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn current_item(&self) -> Option<&Item> {
        self.session.as_ref().and_then(Session::current_item)
    }

    /// Assignment aid for the current match item.
    pub fn match_board_mut(&mut self) -> Option<&mut MatchBoard> {
        self.board.as_mut()
    }

    #[must_use]
    pub fn match_board(&self) -> Option<&MatchBoard> {
        self.board.as_ref()
    }

    #[must_use]
    pub fn last_feedback(&self) -> Option<&AnswerFeedback> {
        self.last_feedback.as_ref()
    }

    /// Time left on the exam countdown, frozen once the session has ended.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<u64> {
        let now = self
            .session
            .as_ref()
            .and_then(Session::ended_at)
            .unwrap_or_else(|| self.clock.now());
        self.countdown.map(|c| c.remaining_secs(now))
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        self.session
            .as_ref()
            .map(|session| SessionProgress::of(session, self.remaining_secs()))
    }

    /// Available once the session is terminal.
    #[must_use]
    pub fn summary(&self) -> Option<SessionSummary> {
        self.session.as_ref().and_then(SessionFinalizer::summary)
    }

    #[must_use]
    pub fn timers_running(&self) -> bool {
        self.countdown_ticker.is_some()
    }
}

// A fresh shuffle for every render of a match item.
fn board_for(item: Option<&Item>) -> Option<MatchBoard> {
    let item = item?;
    if item.kind() != ItemKind::MatchPairs {
        return None;
    }
    MatchBoard::new(item).ok()
}
