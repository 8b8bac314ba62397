//! Shared error types for the services crate.

use thiserror::Error;

use activity_core::model::{ActivityKind, MalformedItem, SessionError, SessionId};
use backend::BackendError;
use backend::api::{NO_ITEMS_DETAIL, PERMISSION_DENIED_DETAIL, UNKNOWN_KIND_DETAIL};

/// Fatal errors raised while opening a session. No item is shown after any of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error("activity kind {code} is not in the catalog")]
    ActivityKindNotFound { code: String },
    #[error("caller is not authenticated as a student")]
    PermissionDenied,
    #[error("no items available for this activity")]
    NoItemsAvailable,
    #[error("session initialization failed: {0}")]
    InitializationFailed(String),
}

impl BootstrapError {
    /// Classify a backend failure by the server's `detail` string.
    #[must_use]
    pub fn from_backend(err: &BackendError, kind: ActivityKind) -> Self {
        match err.detail() {
            Some(PERMISSION_DENIED_DETAIL) => BootstrapError::PermissionDenied,
            Some(NO_ITEMS_DETAIL) => BootstrapError::NoItemsAvailable,
            Some(UNKNOWN_KIND_DETAIL) => BootstrapError::ActivityKindNotFound {
                code: kind.code().to_string(),
            },
            Some(detail) if !detail.is_empty() => {
                BootstrapError::InitializationFailed(detail.to_string())
            }
            _ if err.status() == Some(401) => BootstrapError::PermissionDenied,
            _ => BootstrapError::InitializationFailed(err.to_string()),
        }
    }

    /// Copy shown on the blocking error screen.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            BootstrapError::ActivityKindNotFound { code } => {
                format!("Activity type {code} was not found.")
            }
            BootstrapError::PermissionDenied => "You need to log in as a student.".to_string(),
            BootstrapError::NoItemsAvailable => {
                "This content has no questions for this activity yet. Ask your tutor to process it."
                    .to_string()
            }
            BootstrapError::InitializationFailed(detail) if detail.is_empty() => {
                "Could not start the session.".to_string()
            }
            BootstrapError::InitializationFailed(detail) => detail.clone(),
        }
    }
}

/// Errors from driving the session loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RunnerError {
    #[error("no active session")]
    NoActiveSession,
    /// The current item cannot be answered; shown inline, submission stays blocked.
    #[error(transparent)]
    MalformedItem(#[from] MalformedItem),
    #[error(transparent)]
    Session(SessionError),
}

impl From<SessionError> for RunnerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Evaluation(activity_core::EvaluationError::Malformed(item)) => {
                RunnerError::MalformedItem(item)
            }
            other => RunnerError::Session(other),
        }
    }
}

/// A best-effort call that failed. Logged, never propagated.
#[derive(Debug, Error)]
#[error("{operation} failed for session {session_id}: {source}")]
pub struct TelemetryError {
    pub operation: &'static str,
    pub session_id: SessionId,
    #[source]
    pub source: BackendError,
}

/// Errors from the optional post-session feedback form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("feedback can only be sent after the session ends")]
    SessionNotFinished,
    /// Recoverable: the entered text is kept and the student may retry.
    #[error("feedback submission failed: {0}")]
    SubmissionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_detail_maps_to_permission_denied() {
        let err = BackendError::api(403, PERMISSION_DENIED_DETAIL);
        assert_eq!(
            BootstrapError::from_backend(&err, ActivityKind::Quiz),
            BootstrapError::PermissionDenied
        );
    }

    #[test]
    fn unauthorized_without_detail_is_permission_denied() {
        let err = BackendError::Api {
            status: 401,
            detail: None,
        };
        assert_eq!(
            BootstrapError::from_backend(&err, ActivityKind::Quiz),
            BootstrapError::PermissionDenied
        );
    }

    #[test]
    fn empty_pool_detail_maps_to_no_items() {
        let err = BackendError::api(404, NO_ITEMS_DETAIL);
        let mapped = BootstrapError::from_backend(&err, ActivityKind::Match);
        assert_eq!(mapped, BootstrapError::NoItemsAvailable);
        assert!(mapped.user_message().contains("Ask your tutor"));
    }

    #[test]
    fn other_details_surface_verbatim() {
        let err = BackendError::api(403, "Student not in subject");
        let mapped = BootstrapError::from_backend(&err, ActivityKind::Quiz);
        assert_eq!(
            mapped,
            BootstrapError::InitializationFailed("Student not in subject".into())
        );
        assert_eq!(mapped.user_message(), "Student not in subject");
    }

    #[test]
    fn transport_failures_use_the_error_text() {
        let err = BackendError::Unavailable("connection refused".into());
        let mapped = BootstrapError::from_backend(&err, ActivityKind::Quiz);
        assert_eq!(
            mapped.user_message(),
            "backend unavailable: connection refused"
        );
    }
}
