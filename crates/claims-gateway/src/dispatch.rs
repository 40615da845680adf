//! Authenticated request dispatch
//!
//! Sends a caller's logical request with the current access token, and on an
//! expiry response refreshes through the coordinator and sends exactly once
//! more. The second response is final whatever it says.
//!
//! Response bodies are carried through untouched; the only inspection is the
//! expiry classification.

use std::sync::Arc;

use bytes::Bytes;
use claims_auth::CredentialStore;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::classify::{Classification, classify};
use crate::error::{DispatchError, Result};
use crate::metrics;
use crate::refresh::{RefreshCoordinator, RefreshOutcome};

/// Body of a logical request.
///
/// Multipart and other encodings are built by the caller and passed as
/// `Raw` together with their content type header.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Raw(Bytes),
}

/// What the caller wants sent, before any credential is attached.
///
/// Never mutated by the dispatcher; each send builds its own outbound
/// request from it.
#[derive(Debug, Clone)]
pub struct LogicalRequest {
    pub method: Method,
    /// Path relative to the API base URL, starting with `/`
    pub path: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl LogicalRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn raw(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Raw(body.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A response as received from the API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, lossy on invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Final result of one dispatch.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 2xx, either on the first send or on the retry
    Success(ApiResponse),
    /// Non-2xx that is not a recoverable expiry, returned as received
    Failure(ApiResponse),
    /// The token expired and could not be refreshed. Holds the original
    /// response; the session is now Anonymous and the caller should prompt
    /// for login.
    ReauthRequired(ApiResponse),
}

impl Outcome {
    pub fn response(&self) -> &ApiResponse {
        match self {
            Outcome::Success(r) | Outcome::Failure(r) | Outcome::ReauthRequired(r) => r,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(_) => "failure",
            Outcome::ReauthRequired(_) => "reauth_required",
        }
    }
}

/// Which send of a dispatch this is.
///
/// A dispatch moves from `First` to `Retry` at most once and never back;
/// a `Retry` response is always final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

impl Attempt {
    fn label(self) -> &'static str {
        match self {
            Attempt::First => "first",
            Attempt::Retry => "retry",
        }
    }
}

/// Entry point for callers: attach, send, classify, refresh, retry.
#[derive(Clone)]
pub struct RequestDispatcher {
    client: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    coordinator: RefreshCoordinator,
}

impl RequestDispatcher {
    /// `client` carries the per-request timeout; a timeout surfaces as
    /// `DispatchError::Transport`.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<CredentialStore>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            store,
            coordinator,
        }
    }

    /// Send `request` and return its final outcome.
    ///
    /// Anonymous sessions send without Authorization and let the server
    /// decide; some endpoints are public. Transport failures return
    /// immediately without classification, retry, or session change.
    #[instrument(
        skip_all,
        fields(
            request_id = %format!("req_{}", uuid::Uuid::new_v4().as_simple()),
            method = %request.method,
            path = %request.path,
        )
    )]
    pub async fn dispatch(&self, request: &LogicalRequest) -> Result<Outcome> {
        let result = self.run(request).await;
        match &result {
            Ok(outcome) => {
                debug!(outcome = outcome.label(), status = outcome.response().status.as_u16(), "dispatch finished");
                metrics::record_dispatch(outcome.label());
            }
            Err(e) => {
                warn!(error = %e, "dispatch failed without a response");
                metrics::record_dispatch("transport_failure");
            }
        }
        result
    }

    async fn run(&self, request: &LogicalRequest) -> Result<Outcome> {
        let session = self.store.get().await;
        let sent_with = session.access_token();

        let first = self.send(request, sent_with, Attempt::First).await?;
        let classification = classify(first.status.as_u16(), &first.body);
        debug!(classification = classification.label(), "classified response");

        match classification {
            Classification::Valid => Ok(Outcome::Success(first)),
            Classification::OtherFailure => Ok(Outcome::Failure(first)),
            Classification::Expired => {
                match self.coordinator.ensure_fresh_credential(sent_with).await {
                    RefreshOutcome::Refreshed(pair) => {
                        metrics::record_retry();
                        let retried = self.send(request, Some(&pair.access), Attempt::Retry).await?;
                        Ok(finish_retry(retried))
                    }
                    RefreshOutcome::Failed(reason) => {
                        warn!(%reason, "credential could not be refreshed, re-authentication required");
                        Ok(Outcome::ReauthRequired(first))
                    }
                }
            }
        }
    }

    /// Build and send one outbound request from the logical request.
    async fn send(
        &self,
        request: &LogicalRequest,
        access: Option<&str>,
        attempt: Attempt,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), request.path);

        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);
        if let Some(token) = access {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| DispatchError::InvalidRequest(format!("invalid token value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self.client.request(request.method.clone(), &url);
        match &request.body {
            RequestBody::Empty => {}
            RequestBody::Json(value) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| DispatchError::InvalidRequest(format!("serializing body: {e}")))?;
                builder = builder.body(bytes);
            }
            RequestBody::Raw(bytes) => {
                builder = builder.body(bytes.clone());
            }
        }

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| DispatchError::Transport(format!("reading response body: {e}")))?;

        debug!(
            attempt = attempt.label(),
            status = status.as_u16(),
            authenticated = access.is_some(),
            "response received"
        );
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// A retry's response is final: 2xx is success, anything else is a failure,
/// including another expiry signal.
fn finish_retry(response: ApiResponse) -> Outcome {
    if response.status.is_success() {
        Outcome::Success(response)
    } else {
        Outcome::Failure(response)
    }
}
