//! Shared types for the claims gateway workspace
//!
//! Holds the configuration error type used by the binary and the `Secret`
//! wrapper used for passwords read from the environment or a file.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
