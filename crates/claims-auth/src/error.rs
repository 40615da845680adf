//! Error types for credential operations

/// Errors from token endpoint calls and the credential store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response was obtained (connect failure, timeout, reset).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The token endpoint answered with a non-2xx status.
    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The token endpoint answered 2xx but the body was not usable.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
