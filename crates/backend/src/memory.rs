use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use activity_core::model::{ActivityKind, ActivityKindId, SessionId};

use crate::api::{ActivityBackend, NO_ITEMS_DETAIL, PERMISSION_DENIED_DETAIL, UNKNOWN_KIND_DETAIL};
use crate::error::BackendError;
use crate::records::{
    ActivityKindRecord, FeedbackRecord, ItemRecord, OpenSessionRequest, ResponseRecord,
    SessionRecord,
};

#[derive(Debug, Clone)]
struct MemorySession {
    request: OpenSessionRequest,
    items: Vec<ItemRecord>,
    ended: bool,
    feedback: Option<FeedbackRecord>,
}

#[derive(Debug, Default)]
struct Failures {
    deny_permission: bool,
    responses: bool,
    session_end: bool,
    feedback_remaining: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    kinds: Vec<ActivityKindRecord>,
    pools: HashMap<ActivityKindId, Vec<ItemRecord>>,
    sessions: HashMap<SessionId, MemorySession>,
    opened: Vec<SessionId>,
    responses: Vec<(SessionId, ResponseRecord)>,
    failures: Failures,
}

/// In-memory backend for tests and offline demos.
///
/// Mirrors the server's rejections (permission, unknown kind, empty pool,
/// ended session) and can be told to fail specific calls.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose catalog lists every known activity kind.
    #[must_use]
    pub fn with_standard_catalog() -> Self {
        let backend = Self::new();
        for kind in ActivityKind::ALL {
            backend.register_kind(kind);
        }
        backend
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        self.state
            .lock()
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }

    // Setup helpers are only used by tests and demos; a poisoned lock there is a bug.
    fn setup(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Adds `kind` to the catalog (if missing) and returns its id.
    pub fn register_kind(&self, kind: ActivityKind) -> ActivityKindId {
        let mut state = self.setup();
        if let Some(existing) = state.kinds.iter().find(|k| k.code == kind.code()) {
            return existing.id;
        }
        let id = ActivityKindId::random();
        state.kinds.push(ActivityKindRecord {
            id,
            code: kind.code().to_string(),
            name: None,
        });
        id
    }

    /// Adds items to the pool served for `kind`, registering the kind if needed.
    pub fn add_items(&self, kind: ActivityKind, items: impl IntoIterator<Item = ItemRecord>) {
        let kind_id = self.register_kind(kind);
        self.setup()
            .pools
            .entry(kind_id)
            .or_default()
            .extend(items);
    }

    /// Reject every session open with the permission-denied detail.
    pub fn deny_permission(&self, deny: bool) {
        self.setup().failures.deny_permission = deny;
    }

    pub fn fail_responses(&self, fail: bool) {
        self.setup().failures.responses = fail;
    }

    pub fn fail_session_end(&self, fail: bool) {
        self.setup().failures.session_end = fail;
    }

    /// Fail the next `count` feedback submissions.
    pub fn fail_next_feedback(&self, count: u32) {
        self.setup().failures.feedback_remaining = count;
    }

    /// Ids of opened sessions, in opening order.
    #[must_use]
    pub fn opened_sessions(&self) -> Vec<SessionId> {
        self.setup().opened.clone()
    }

    #[must_use]
    pub fn open_request(&self, session_id: SessionId) -> Option<OpenSessionRequest> {
        self.setup()
            .sessions
            .get(&session_id)
            .map(|s| s.request.clone())
    }

    /// Responses accepted so far, in arrival order.
    #[must_use]
    pub fn responses(&self) -> Vec<(SessionId, ResponseRecord)> {
        self.setup().responses.clone()
    }

    #[must_use]
    pub fn is_ended(&self, session_id: SessionId) -> bool {
        self.setup()
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.ended)
    }

    #[must_use]
    pub fn feedback_for(&self, session_id: SessionId) -> Option<FeedbackRecord> {
        self.setup()
            .sessions
            .get(&session_id)
            .and_then(|s| s.feedback.clone())
    }
}

fn session_not_found() -> BackendError {
    BackendError::api(404, "Session not found")
}

#[async_trait]
impl ActivityBackend for InMemoryBackend {
    async fn activity_kinds(&self) -> Result<Vec<ActivityKindRecord>, BackendError> {
        Ok(self.lock()?.kinds.clone())
    }

    async fn open_session(
        &self,
        request: &OpenSessionRequest,
    ) -> Result<SessionRecord, BackendError> {
        let mut state = self.lock()?;
        if state.failures.deny_permission {
            return Err(BackendError::api(403, PERMISSION_DENIED_DETAIL));
        }
        if !state.kinds.iter().any(|k| k.id == request.activity_kind_id) {
            return Err(BackendError::api(404, UNKNOWN_KIND_DETAIL));
        }

        let limit = usize::try_from(request.item_count).unwrap_or(usize::MAX);
        let items: Vec<ItemRecord> = state
            .pools
            .get(&request.activity_kind_id)
            .map(|pool| pool.iter().take(limit).cloned().collect())
            .unwrap_or_default();
        if items.is_empty() {
            return Err(BackendError::api(404, NO_ITEMS_DETAIL));
        }

        let id = SessionId::random();
        state.sessions.insert(
            id,
            MemorySession {
                request: request.clone(),
                items,
                ended: false,
                feedback: None,
            },
        );
        state.opened.push(id);
        Ok(SessionRecord { id })
    }

    async fn session_items(&self, session_id: SessionId) -> Result<Vec<ItemRecord>, BackendError> {
        let state = self.lock()?;
        state
            .sessions
            .get(&session_id)
            .map(|s| s.items.clone())
            .ok_or_else(session_not_found)
    }

    async fn submit_response(
        &self,
        session_id: SessionId,
        response: &ResponseRecord,
    ) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        if state.failures.responses {
            return Err(BackendError::Unavailable("connection reset".into()));
        }
        let session = state.sessions.get(&session_id).ok_or_else(session_not_found)?;
        if session.ended {
            return Err(BackendError::api(400, "Session is not in progress"));
        }
        if !session.items.iter().any(|item| item.id == response.item_id) {
            return Err(BackendError::api(404, "Item not found"));
        }
        state.responses.push((session_id, response.clone()));
        Ok(())
    }

    async fn end_session(&self, session_id: SessionId) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        if state.failures.session_end {
            return Err(BackendError::Unavailable("connection reset".into()));
        }
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(session_not_found)?;
        if session.ended {
            return Err(BackendError::api(400, "Session already ended"));
        }
        session.ended = true;
        Ok(())
    }

    async fn submit_feedback(
        &self,
        session_id: SessionId,
        feedback: &FeedbackRecord,
    ) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        if state.failures.feedback_remaining > 0 {
            state.failures.feedback_remaining -= 1;
            return Err(BackendError::Unavailable("connection reset".into()));
        }
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(session_not_found)?;
        if !session.ended {
            return Err(BackendError::api(
                400,
                "Session must be completed before feedback",
            ));
        }
        session.feedback = Some(feedback.clone());
        Ok(())
    }
}

/// Sample content for offline runs of every activity kind.
#[must_use]
pub fn demo_backend() -> InMemoryBackend {
    let backend = InMemoryBackend::with_standard_catalog();
    let quiz = || {
        vec![
            ItemRecord::choice("What is 7 × 8?", ["54", "56", "64"], "56")
                .with_explanation("7 × 8 = 56."),
            ItemRecord::choice(
                "Which planet is closest to the Sun?",
                ["Venus", "Mercury", "Mars"],
                "Mercury",
            ),
            ItemRecord::choice(
                "Which gas do plants absorb?",
                ["Oxygen", "Nitrogen", "Carbon dioxide"],
                "Carbon dioxide",
            )
            .with_explanation("Photosynthesis consumes CO2 and releases O2."),
        ]
    };
    backend.add_items(ActivityKind::Quiz, quiz());
    backend.add_items(ActivityKind::ExamStyle, quiz());
    backend.add_items(ActivityKind::Review, quiz());
    backend.add_items(
        ActivityKind::Match,
        [
            ItemRecord::pairs(
                "Match each country with its capital",
                [("France", "Paris"), ("Italy", "Rome"), ("Spain", "Madrid")],
            ),
            ItemRecord::pairs(
                "Match each element with its symbol",
                [("Iron", "Fe"), ("Gold", "Au"), ("Sodium", "Na")],
            ),
        ],
    );
    backend.add_items(
        ActivityKind::Cloze,
        [ItemRecord {
            type_tag: "cloze".into(),
            ..ItemRecord::choice("Water boils at ___ °C at sea level.", Vec::<String>::new(), "100")
        }],
    );
    backend
}
