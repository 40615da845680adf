//! Gateway facade
//!
//! Wires one HTTP client, one credential store, one refresh coordinator and
//! one dispatcher together, and adds the session operations (login, logout,
//! status) that sit beside dispatch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use claims_auth::{
    CredentialStore, DEFAULT_BASE_URL, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, Session,
};
use common::Secret;
use tracing::{info, warn};

use crate::dispatch::{LogicalRequest, Outcome, RequestDispatcher};
use crate::error::SessionError;
use crate::refresh::RefreshCoordinator;

/// Where the API and its token routes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
}

impl Endpoints {
    pub fn login_url(&self) -> String {
        join(&self.base_url, &self.login_path)
    }

    pub fn refresh_url(&self) -> String {
        join(&self.base_url, &self.refresh_path)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Build the shared HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
    store: Arc<CredentialStore>,
    coordinator: RefreshCoordinator,
    dispatcher: RequestDispatcher,
}

impl Gateway {
    pub fn new(client: reqwest::Client, endpoints: Endpoints, store: Arc<CredentialStore>) -> Self {
        let coordinator =
            RefreshCoordinator::new(store.clone(), client.clone(), endpoints.refresh_url());
        let dispatcher = RequestDispatcher::new(
            client.clone(),
            endpoints.base_url.clone(),
            store.clone(),
            coordinator.clone(),
        );
        Self {
            client,
            endpoints: Arc::new(endpoints),
            store,
            coordinator,
            dispatcher,
        }
    }

    /// Exchange username and password for a token pair and store it.
    ///
    /// Returns the role claim if the backend sent one. On failure the
    /// existing session is left as it was.
    pub async fn login(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Option<String>, SessionError> {
        let response = claims_auth::obtain_pair(
            &self.client,
            &self.endpoints.login_url(),
            username,
            password,
        )
        .await
        .map_err(|e| {
            warn!(username, error = %e, "login failed");
            SessionError::Login(e)
        })?;

        self.coordinator
            .establish(response.credentials())
            .await
            .map_err(SessionError::Store)?;
        info!(username, role = response.role.as_deref(), "logged in");
        Ok(response.role)
    }

    /// Forget the stored credentials.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.coordinator
            .end_session()
            .await
            .map_err(SessionError::Store)
    }

    pub async fn session(&self) -> Session {
        self.store.get().await
    }

    pub async fn dispatch(&self, request: &LogicalRequest) -> crate::Result<Outcome> {
        self.dispatcher.dispatch(request).await
    }

    /// File the session is persisted to.
    pub fn session_path(&self) -> &Path {
        self.store.path()
    }
}
