//! Authenticated request gateway for the claims API
//!
//! Every API call goes through the dispatcher, which attaches the current
//! access token, classifies the response, and recovers from token expiry by
//! refreshing once and retrying once. Concurrent expiries share a single
//! refresh call.
//!
//! Request lifecycle:
//! 1. Read the session and send with `Authorization: Bearer <access>`
//! 2. Classify the response: Valid, Expired, or OtherFailure
//! 3. Expired → wait on (or start) the single in-flight refresh
//! 4. Refreshed → resend once with the new token; that response is final
//! 5. Refresh failed → session becomes Anonymous, caller gets the original
//!    response as `ReauthRequired`

pub mod classify;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod refresh;

pub use classify::{Classification, ErrorBody, classify};
pub use dispatch::{ApiResponse, LogicalRequest, Outcome, RequestBody, RequestDispatcher};
pub use error::{DispatchError, RefreshFailure, Result, SessionError};
pub use gateway::{Endpoints, Gateway, http_client};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
