//! Credential handling for the expense claims API
//!
//! Provides the access/refresh credential pair, the durable session store,
//! and the two token endpoint calls (login and refresh). This crate knows
//! nothing about request dispatch or retry; the gateway crate builds the
//! single-flight refresh and the retrying dispatcher on top of it.
//!
//! Credential flow:
//! 1. Caller logs in via `token::obtain_pair()` with username/password
//! 2. Pair stored via `credentials::CredentialStore::set()`
//! 3. On expiry the gateway calls `token::refresh_access()` once
//! 4. New pair written via `CredentialStore::replace_if()`, or the
//!    session is cleared via `CredentialStore::clear()` on failure

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore, Session};
pub use error::{Error, Result};
pub use token::{LoginResponse, RefreshResponse, obtain_pair, refresh_access};
