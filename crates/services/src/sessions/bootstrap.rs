use std::sync::Arc;

use log::{debug, info, warn};

use activity_core::model::{
    ActivityKind, ContentScopeId, Session, SessionError, SessionMode, SessionScope, StudentId,
    SubjectId, TermId,
};
use activity_core::Clock;
use backend::{ActivityBackend, BackendError, OpenSessionRequest};

use crate::error::BootstrapError;

/// What the caller asks for when starting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub term_id: TermId,
    pub kind: ActivityKind,
    pub content_scope_id: Option<ContentScopeId>,
    /// Falls back to the kind's default when `None`.
    pub item_count: Option<u32>,
    pub mode: SessionMode,
}

impl SessionRequest {
    #[must_use]
    pub fn new(
        student_id: StudentId,
        subject_id: SubjectId,
        term_id: TermId,
        kind: ActivityKind,
    ) -> Self {
        Self {
            student_id,
            subject_id,
            term_id,
            kind,
            content_scope_id: None,
            item_count: None,
            mode: SessionMode::Practice,
        }
    }

    #[must_use]
    pub fn with_content_scope(mut self, content_scope_id: ContentScopeId) -> Self {
        self.content_scope_id = Some(content_scope_id);
        self
    }

    #[must_use]
    pub fn with_item_count(mut self, item_count: u32) -> Self {
        self.item_count = Some(item_count);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn effective_item_count(&self) -> u32 {
        self.item_count
            .filter(|count| *count > 0)
            .unwrap_or_else(|| self.kind.default_item_count())
    }
}

/// Opens a session against the backend and loads its items.
#[derive(Clone)]
pub struct SessionBootstrapper {
    backend: Arc<dyn ActivityBackend>,
    device_type: String,
}

impl SessionBootstrapper {
    #[must_use]
    pub fn new(backend: Arc<dyn ActivityBackend>, device_type: impl Into<String>) -> Self {
        Self {
            backend,
            device_type: device_type.into(),
        }
    }

    /// Resolve the activity kind, open the session and fetch its items.
    ///
    /// The session starts when its items have arrived: `clock` is read after
    /// the last backend call, so the exam deadline excludes bootstrap latency.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError` when the kind is not in the catalog, the
    /// backend rejects the request, or the session comes back without items.
    pub async fn open(
        &self,
        request: &SessionRequest,
        clock: Clock,
    ) -> Result<Session, BootstrapError> {
        let kind = request.kind;
        let kinds = self
            .backend
            .activity_kinds()
            .await
            .map_err(|err| classify(&err, kind))?;
        let Some(record) = kinds.iter().find(|k| k.code == kind.code()) else {
            warn!("activity kind {} missing from catalog", kind.code());
            return Err(BootstrapError::ActivityKindNotFound {
                code: kind.code().to_string(),
            });
        };
        let activity_kind_id = record.id;

        let open = OpenSessionRequest {
            student_id: request.student_id,
            activity_kind_id,
            subject_id: request.subject_id,
            term_id: request.term_id,
            topic_id: None,
            item_count: request.effective_item_count(),
            content_scope_id: request.content_scope_id,
            device_type: self.device_type.clone(),
        };
        let opened = self
            .backend
            .open_session(&open)
            .await
            .map_err(|err| classify(&err, kind))?;

        let items = self
            .backend
            .session_items(opened.id)
            .await
            .map_err(|err| classify(&err, kind))?;
        debug!("session {} served {} items", opened.id, items.len());

        let scope = SessionScope {
            student_id: request.student_id,
            subject_id: request.subject_id,
            term_id: request.term_id,
            content_scope_id: request.content_scope_id,
            activity_kind: kind,
            activity_kind_id,
        };
        let items = items.into_iter().map(|record| record.into_item()).collect();

        let started_at = clock.now();
        let session = Session::new(opened.id, scope, request.mode, items, started_at).map_err(
            |err| match err {
                SessionError::Empty => BootstrapError::NoItemsAvailable,
                other => BootstrapError::InitializationFailed(other.to_string()),
            },
        )?;
        info!(
            "opened {} session {} with {} items",
            kind.code(),
            session.id(),
            session.item_count()
        );
        Ok(session)
    }
}

fn classify(err: &BackendError, kind: ActivityKind) -> BootstrapError {
    warn!("session bootstrap failed: {err}");
    BootstrapError::from_backend(err, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::time::{fixed_clock, fixed_now};
    use backend::{InMemoryBackend, ItemRecord};

    fn request(kind: ActivityKind) -> SessionRequest {
        SessionRequest::new(
            StudentId::random(),
            SubjectId::random(),
            TermId::random(),
            kind,
        )
    }

    #[test]
    fn item_count_defaults_per_kind() {
        assert_eq!(request(ActivityKind::Quiz).effective_item_count(), 10);
        assert_eq!(request(ActivityKind::Match).effective_item_count(), 5);
        assert_eq!(
            request(ActivityKind::Quiz)
                .with_item_count(0)
                .effective_item_count(),
            10
        );
        assert_eq!(
            request(ActivityKind::Quiz)
                .with_item_count(3)
                .effective_item_count(),
            3
        );
    }

    #[tokio::test]
    async fn open_sends_catalog_id_and_device_type() {
        let backend = InMemoryBackend::with_standard_catalog();
        backend.add_items(
            ActivityKind::Quiz,
            [ItemRecord::choice("2 + 2?", ["3", "4"], "4")],
        );
        let bootstrapper = SessionBootstrapper::new(Arc::new(backend.clone()), "cli");

        let session = bootstrapper
            .open(&request(ActivityKind::Quiz), fixed_clock())
            .await
            .unwrap();

        let sent = backend.open_request(session.id()).unwrap();
        assert_eq!(sent.activity_kind_id, session.scope().activity_kind_id);
        assert_eq!(sent.device_type, "cli");
        assert_eq!(sent.item_count, 10);
        assert_eq!(sent.topic_id, None);
        assert_eq!(session.item_count(), 1);
        assert_eq!(session.started_at(), fixed_now());
    }

    #[tokio::test]
    async fn missing_kind_fails_before_opening() {
        let backend = InMemoryBackend::new();
        let bootstrapper = SessionBootstrapper::new(Arc::new(backend.clone()), "cli");

        let err = bootstrapper
            .open(&request(ActivityKind::Cloze), fixed_clock())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BootstrapError::ActivityKindNotFound {
                code: "CLOZE".into()
            }
        );
        assert!(backend.opened_sessions().is_empty());
    }
}
