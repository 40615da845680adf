//! Error types for gateway operations

/// Errors that end a dispatch without a response to return.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No response was obtained: connect failure, timeout, or reset.
    /// Never classified, never retried, never changes the session.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The logical request could not be turned into an HTTP request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Why a refresh did not produce a new credential.
///
/// `Clone` because one value is fanned out to every waiter on the ticket.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no refresh token available")]
    NoCredentials,

    #[error("refresh rejected with status {status}")]
    Rejected { status: u16 },

    #[error("refresh endpoint unreachable: {0}")]
    Transport(String),

    #[error("malformed refresh response: {0}")]
    Malformed(String),
}

impl From<claims_auth::Error> for RefreshFailure {
    fn from(err: claims_auth::Error) -> Self {
        match err {
            claims_auth::Error::Rejected { status, .. } => RefreshFailure::Rejected { status },
            claims_auth::Error::Http(msg) => RefreshFailure::Transport(msg),
            other => RefreshFailure::Malformed(other.to_string()),
        }
    }
}

/// Errors from session management (login/logout).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("login failed: {0}")]
    Login(#[source] claims_auth::Error),

    #[error("credential store error: {0}")]
    Store(#[source] claims_auth::Error),
}

/// Result alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_refresh_failures() {
        let rejected = claims_auth::Error::Rejected {
            status: 400,
            body: "{}".into(),
        };
        assert_eq!(
            RefreshFailure::from(rejected),
            RefreshFailure::Rejected { status: 400 }
        );

        let http = claims_auth::Error::Http("connection refused".into());
        assert!(matches!(
            RefreshFailure::from(http),
            RefreshFailure::Transport(msg) if msg.contains("refused")
        ));

        let malformed = claims_auth::Error::TokenExchange("missing field `access`".into());
        assert!(matches!(
            RefreshFailure::from(malformed),
            RefreshFailure::Malformed(_)
        ));
    }
}
