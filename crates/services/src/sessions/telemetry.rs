use std::sync::Arc;

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use activity_core::model::{AnswerRecord, SessionId, SessionScope, Submission};
use backend::{ActivityBackend, BackendError, ResponseRecord};

use crate::error::TelemetryError;

/// Outcome of one fire-and-forget backend call.
#[derive(Debug)]
pub struct BestEffort {
    pub operation: &'static str,
    pub session_id: SessionId,
    pub outcome: Result<(), TelemetryError>,
}

impl BestEffort {
    fn settle(
        operation: &'static str,
        session_id: SessionId,
        result: Result<(), BackendError>,
    ) -> Self {
        let outcome = result.map_err(|source| TelemetryError {
            operation,
            session_id,
            source,
        });
        match &outcome {
            Ok(()) => debug!("{operation} acknowledged for session {session_id}"),
            Err(err) => warn!("{err}"),
        }
        Self {
            operation,
            session_id,
            outcome,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Text form of a submission as recorded by the backend.
///
/// Choice and cloze answers are sent verbatim; match answers as the JSON
/// object of their left-to-right mapping.
#[must_use]
pub fn normalize_response(submission: &Submission) -> String {
    match submission {
        Submission::Text(text) => text.clone(),
        Submission::Mapping(mapping) => {
            serde_json::to_string(mapping).unwrap_or_else(|_| submission.to_string())
        }
    }
}

/// Build the response record for a committed answer.
#[must_use]
pub fn response_record(scope: &SessionScope, answer: &AnswerRecord) -> ResponseRecord {
    ResponseRecord {
        student_id: scope.student_id,
        item_id: answer.item_id,
        subject_id: scope.subject_id,
        term_id: scope.term_id,
        topic_id: None,
        microconcept_id: None,
        activity_kind_id: scope.activity_kind_id,
        is_correct: answer.is_correct,
        duration_ms: answer.duration_ms(),
        attempt_number: 1,
        response_normalized: normalize_response(&answer.submission),
        hint_used: None,
        difficulty_at_time: None,
        timestamp_start: answer.started_at,
        timestamp_end: answer.answered_at,
    }
}

/// Dispatches response records and the end-of-session call without blocking
/// the session loop. Failures are logged and otherwise ignored.
pub struct TelemetryEmitter {
    backend: Arc<dyn ActivityBackend>,
    pending: Vec<JoinHandle<BestEffort>>,
    end: Option<JoinHandle<BestEffort>>,
}

impl TelemetryEmitter {
    #[must_use]
    pub fn new(backend: Arc<dyn ActivityBackend>) -> Self {
        Self {
            backend,
            pending: Vec::new(),
            end: None,
        }
    }

    pub fn record_response(
        &mut self,
        scope: &SessionScope,
        session_id: SessionId,
        answer: &AnswerRecord,
    ) {
        let record = response_record(scope, answer);
        let backend = Arc::clone(&self.backend);
        self.dispatch("submit_response", session_id, async move {
            backend.submit_response(session_id, &record).await
        });
    }

    /// Tracked apart from responses; `wait_for_end` awaits it. Always the last
    /// call of a session.
    pub fn request_end(&mut self, session_id: SessionId) {
        let backend = Arc::clone(&self.backend);
        self.end = spawn("end_session", session_id, async move {
            backend.end_session(session_id).await
        });
    }

    fn dispatch<F>(&mut self, operation: &'static str, session_id: SessionId, call: F)
    where
        F: Future<Output = Result<(), BackendError>> + Send + 'static,
    {
        if let Some(handle) = spawn(operation, session_id, call) {
            self.pending.push(handle);
        }
    }

    /// Wait for the end-of-session call, if one is outstanding.
    pub async fn wait_for_end(&mut self) -> Option<BestEffort> {
        let handle = self.end.take()?;
        join(handle).await
    }

    /// Wait for every dispatched call and return their outcomes in dispatch order.
    pub async fn flush(&mut self) -> Vec<BestEffort> {
        let mut settled = Vec::with_capacity(self.pending.len() + 1);
        for handle in self.pending.drain(..) {
            settled.extend(join(handle).await);
        }
        settled.extend(self.wait_for_end().await);
        settled
    }
}

fn spawn<F>(
    operation: &'static str,
    session_id: SessionId,
    call: F,
) -> Option<JoinHandle<BestEffort>>
where
    F: Future<Output = Result<(), BackendError>> + Send + 'static,
{
    let Ok(runtime) = Handle::try_current() else {
        warn!("{operation} dropped for session {session_id}: no async runtime");
        return None;
    };
    Some(runtime.spawn(async move {
        BestEffort::settle(operation, session_id, call.await)
    }))
}

async fn join(handle: JoinHandle<BestEffort>) -> Option<BestEffort> {
    match handle.await {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            warn!("telemetry task did not complete: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::model::{ActivityKind, ActivityKindId, ItemId, StudentId, SubjectId, TermId};
    use activity_core::time::fixed_now;
    use chrono::Duration;

    fn scope() -> SessionScope {
        SessionScope {
            student_id: StudentId::random(),
            subject_id: SubjectId::random(),
            term_id: TermId::random(),
            content_scope_id: None,
            activity_kind: ActivityKind::Match,
            activity_kind_id: ActivityKindId::random(),
        }
    }

    #[test]
    fn mapping_is_sent_as_json_object() {
        let submission = Submission::mapping([("B", "2"), ("A", "1")]);
        assert_eq!(normalize_response(&submission), r#"{"A":"1","B":"2"}"#);
        assert_eq!(normalize_response(&Submission::choice("Paris")), "Paris");
    }

    #[test]
    fn record_carries_scope_and_timing() {
        let scope = scope();
        let start = fixed_now();
        let answer = AnswerRecord {
            item_id: ItemId::random(),
            submission: Submission::choice("4"),
            is_correct: true,
            started_at: start,
            answered_at: start + Duration::milliseconds(1_250),
        };

        let record = response_record(&scope, &answer);

        assert_eq!(record.student_id, scope.student_id);
        assert_eq!(record.activity_kind_id, scope.activity_kind_id);
        assert_eq!(record.item_id, answer.item_id);
        assert_eq!(record.duration_ms, 1_250);
        assert_eq!(record.attempt_number, 1);
        assert_eq!(record.timestamp_start, start);
        assert!(record.hint_used.is_none());
    }
}
