//! Defaults for the claims API endpoints
//!
//! These match the backend's JWT routes. Every value can be overridden in
//! the gateway configuration.

/// Base URL of a locally running backend
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Token pair endpoint (username/password in, access/refresh/role out)
pub const DEFAULT_LOGIN_PATH: &str = "/api/token/";

/// Refresh endpoint (refresh token in, access token out)
pub const DEFAULT_REFRESH_PATH: &str = "/api/token/refresh/";

/// Per-request timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// File name of the persisted session when none is configured
pub const DEFAULT_CREDENTIALS_FILE: &str = "session.json";
