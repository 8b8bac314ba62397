use thiserror::Error;

/// Errors surfaced by backend adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The API answered with a non-success status. `detail` carries the
    /// server's `detail` field when one was present.
    #[error("request failed with status {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
}

impl BackendError {
    #[must_use]
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        BackendError::Api {
            status,
            detail: Some(detail.into()),
        }
    }

    /// The server-provided `detail`, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_exposes_detail_and_status() {
        let err = BackendError::api(403, "Not enough permissions");
        assert_eq!(err.detail(), Some("Not enough permissions"));
        assert_eq!(err.status(), Some(403));
        assert_eq!(
            err.to_string(),
            "request failed with status 403: Not enough permissions"
        );
    }

    #[test]
    fn missing_detail_renders_placeholder() {
        let err = BackendError::Api {
            status: 500,
            detail: None,
        };
        assert_eq!(err.detail(), None);
        assert_eq!(err.to_string(), "request failed with status 500: no detail");
    }
}
