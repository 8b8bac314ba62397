use chrono::{DateTime, Utc};
use log::info;

use activity_core::model::{Session, SessionSummary, TerminalReason};

use super::telemetry::TelemetryEmitter;

/// Makes sure a terminal session is reported to the backend exactly once,
/// whichever path (last answer or expired countdown) ended it.
#[derive(Debug, Default)]
pub struct SessionFinalizer {
    end_requested: bool,
}

impl SessionFinalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn end_requested(&self) -> bool {
        self.end_requested
    }

    /// Terminate `session` now and settle it. Returns `true` if this call
    /// did the terminating.
    pub fn force(
        &mut self,
        session: &mut Session,
        reason: TerminalReason,
        now: DateTime<Utc>,
        telemetry: &mut TelemetryEmitter,
    ) -> bool {
        let terminated = session.terminate(reason, now);
        self.settle(session, telemetry);
        terminated
    }

    /// Request the end-of-session call if `session` is terminal and it has not
    /// been requested yet.
    pub fn settle(&mut self, session: &Session, telemetry: &mut TelemetryEmitter) {
        if self.end_requested || !session.is_terminal() {
            return;
        }
        self.end_requested = true;
        info!(
            "session {} finished ({:?}): {}/{}",
            session.id(),
            session.terminal_reason(),
            session.score(),
            session.item_count()
        );
        telemetry.request_end(session.id());
    }

    /// Review table for a terminal session, `None` while it is still running.
    #[must_use]
    pub fn summary(session: &Session) -> Option<SessionSummary> {
        session.is_terminal().then(|| session.summary())
    }
}
