use std::env;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use activity_core::model::SessionId;

use crate::api::ActivityBackend;
use crate::error::BackendError;
use crate::records::{
    ActivityKindRecord, ErrorBody, FeedbackRecord, ItemRecord, OpenSessionRequest, ResponseRecord,
    SessionRecord,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: Url,
    pub token: Option<String>,
}

impl HttpBackendConfig {
    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` unless `base_url` is an http(s) URL.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| BackendError::InvalidConfig(format!("{base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(BackendError::InvalidConfig(format!(
                "unsupported scheme {}",
                base_url.scheme()
            )));
        }
        let token = token.filter(|t| !t.trim().is_empty());
        Ok(Self { base_url, token })
    }

    /// Reads `ACTIVITY_API_URL` and `ACTIVITY_API_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidConfig` if the URL is invalid.
    pub fn from_env() -> Result<Self, BackendError> {
        let base_url = env::var("ACTIVITY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        Self::new(&base_url, env::var("ACTIVITY_API_TOKEN").ok())
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// `ActivityBackend` over the JSON HTTP API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        debug!("GET {path}");
        let request = self.authorized(self.client.get(self.config.endpoint(path)));
        let response = check(request.send().await?).await?;
        decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {path}");
        let request = self.authorized(self.client.post(self.config.endpoint(path)).json(body));
        let response = check(request.send().await?).await?;
        decode(response).await
    }

    // POSTs whose acknowledgement body is ignored.
    async fn post_ack<B>(&self, path: &str, body: Option<&B>) -> Result<(), BackendError>
    where
        B: serde::Serialize + Sync + ?Sized,
    {
        debug!("POST {path}");
        let mut request = self.client.post(self.config.endpoint(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        check(self.authorized(request).send().await?).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_detail);
    debug!("request failed with {status}: {detail:?}");
    Err(BackendError::Api {
        status: status.as_u16(),
        detail,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl ActivityBackend for HttpBackend {
    async fn activity_kinds(&self) -> Result<Vec<ActivityKindRecord>, BackendError> {
        self.get_json("activities/activity-types").await
    }

    async fn open_session(
        &self,
        request: &OpenSessionRequest,
    ) -> Result<SessionRecord, BackendError> {
        self.post_json("activities/sessions", request).await
    }

    async fn session_items(&self, session_id: SessionId) -> Result<Vec<ItemRecord>, BackendError> {
        self.get_json(&format!("activities/sessions/{session_id}/items"))
            .await
    }

    async fn submit_response(
        &self,
        session_id: SessionId,
        response: &ResponseRecord,
    ) -> Result<(), BackendError> {
        self.post_ack(
            &format!("activities/sessions/{session_id}/responses"),
            Some(response),
        )
        .await
    }

    async fn end_session(&self, session_id: SessionId) -> Result<(), BackendError> {
        self.post_ack::<()>(&format!("activities/sessions/{session_id}/end"), None)
            .await
    }

    async fn submit_feedback(
        &self,
        session_id: SessionId,
        feedback: &FeedbackRecord,
    ) -> Result<(), BackendError> {
        self.post_ack(
            &format!("activities/sessions/{session_id}/feedback"),
            Some(feedback),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path() {
        let config = HttpBackendConfig::new("http://localhost:8000/api/v1/", None).unwrap();
        assert_eq!(
            config.endpoint("/activities/activity-types"),
            "http://localhost:8000/api/v1/activities/activity-types"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            HttpBackendConfig::new("ftp://example.com", None),
            Err(BackendError::InvalidConfig(_))
        ));
        assert!(matches!(
            HttpBackendConfig::new("not a url", None),
            Err(BackendError::InvalidConfig(_))
        ));
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = HttpBackendConfig::new(DEFAULT_API_URL, Some("  ".into())).unwrap();
        assert!(config.token.is_none());
    }
}
