use async_trait::async_trait;

use activity_core::model::SessionId;

use crate::error::BackendError;
use crate::records::{
    ActivityKindRecord, FeedbackRecord, ItemRecord, OpenSessionRequest, ResponseRecord,
    SessionRecord,
};

// `detail` strings the runner treats specially.
pub const PERMISSION_DENIED_DETAIL: &str = "Not enough permissions";
pub const NO_ITEMS_DETAIL: &str = "No items found for this subject/term";
pub const UNKNOWN_KIND_DETAIL: &str = "Activity type not found";

/// Contract of the remote activity API consumed by the session runner.
///
/// Item selection, scoring storage and mastery computation all live behind
/// this trait; the runner treats it as a black box.
#[async_trait]
pub trait ActivityBackend: Send + Sync {
    /// List the activity kind catalog.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the catalog cannot be fetched.
    async fn activity_kinds(&self) -> Result<Vec<ActivityKindRecord>, BackendError>;

    /// Open a session and return its backend-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Api` with the server's detail on rejection.
    async fn open_session(&self, request: &OpenSessionRequest)
    -> Result<SessionRecord, BackendError>;

    /// Fetch the ordered items of a session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the items cannot be fetched.
    async fn session_items(&self, session_id: SessionId) -> Result<Vec<ItemRecord>, BackendError>;

    /// Record one response. The acknowledgement body is ignored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the response was not accepted.
    async fn submit_response(
        &self,
        session_id: SessionId,
        response: &ResponseRecord,
    ) -> Result<(), BackendError>;

    /// Mark a session as ended.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the session could not be ended.
    async fn end_session(&self, session_id: SessionId) -> Result<(), BackendError>;

    /// Submit post-session feedback.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the feedback was not accepted.
    async fn submit_feedback(
        &self,
        session_id: SessionId,
        feedback: &FeedbackRecord,
    ) -> Result<(), BackendError>;
}
