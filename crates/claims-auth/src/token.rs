//! Token endpoint calls
//!
//! Two interactions with the backend's JWT routes:
//! 1. Login: username/password exchanged for an access/refresh pair
//! 2. Refresh: refresh token exchanged for a new access token
//!
//! Both POST JSON and expect JSON back. Neither function touches the
//! credential store; callers decide what to persist.

use std::fmt;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Response from the login endpoint.
///
/// `role` is a custom claim the backend adds next to the token pair.
#[derive(Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl LoginResponse {
    /// The issued token pair.
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.access.clone(), self.refresh.clone())
    }
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

/// Response from the refresh endpoint.
///
/// `refresh` is only present when the backend rotates refresh tokens.
#[derive(Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl RefreshResponse {
    /// Merge into the pair that was used for the refresh call.
    ///
    /// Keeps the previous refresh token unless a rotated one was returned.
    pub fn into_pair(self, previous_refresh: &str) -> CredentialPair {
        let refresh = self
            .refresh
            .unwrap_or_else(|| previous_refresh.to_string());
        CredentialPair::new(self.access, refresh)
    }
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("access", &"[REDACTED]")
            .field("rotated", &self.refresh.is_some())
            .finish()
    }
}

/// Exchange username and password for a token pair.
pub async fn obtain_pair(
    client: &reqwest::Client,
    url: &str,
    username: &str,
    password: &Secret<String>,
) -> Result<LoginResponse> {
    let response = client
        .post(url)
        .json(&LoginRequest {
            username,
            password: password.expose(),
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    debug!(username, "login accepted");
    response
        .json::<LoginResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid login response: {e}")))
}

/// Exchange a refresh token for a new access token.
///
/// Any non-2xx status is `Rejected`; a 2xx without an `access` field is
/// `TokenExchange`. The gateway treats both as a failed refresh.
pub async fn refresh_access(
    client: &reqwest::Client,
    url: &str,
    refresh: &str,
) -> Result<RefreshResponse> {
    let response = client
        .post(url)
        .json(&RefreshRequest { refresh })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}
