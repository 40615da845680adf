//! Expiry detection for API responses
//!
//! Decides whether a response means "the access token is no longer valid".
//! 401 always does. 400 only does when the body says so explicitly: the
//! backend also uses 400 for ordinary validation errors, and treating those
//! as expiry would send every bad form submission through refresh-and-retry.

use serde_json::Value;

/// Machine code the backend's JWT layer uses for invalid or expired tokens.
pub const TOKEN_NOT_VALID_CODE: &str = "token_not_valid";

/// Substring (case-insensitive) that marks a message entry as an expiry.
const EXPIRED_MARKER: &str = "expired";

/// Outcome of classifying one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx
    Valid,
    /// The access token was rejected; refresh and retry once
    Expired,
    /// Any other non-2xx, surfaced unchanged
    OtherFailure,
}

impl Classification {
    /// Label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Valid => "valid",
            Classification::Expired => "expired",
            Classification::OtherFailure => "other_failure",
        }
    }
}

/// Error body shapes the classifier understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    /// `{"code": "..."}`
    Code { code: String },
    /// `{"messages": [...]}` with entries reduced to their text
    MessageList { messages: Vec<String> },
    /// Not JSON, or JSON without either field
    Unrecognized,
}

impl ErrorBody {
    /// Parse a response body. Never fails; unknown shapes are `Unrecognized`.
    ///
    /// `code` and `messages` are read independently, so a field of an
    /// unexpected type is ignored without hiding its sibling. A body carrying
    /// the token-invalid code is reported as `Code` even if it also has
    /// messages, since the code alone settles the classification.
    pub fn parse(body: &[u8]) -> Self {
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            return ErrorBody::Unrecognized;
        };

        let code = fields.get("code").and_then(Value::as_str);
        let messages = fields.get("messages").and_then(message_texts);

        match (code, messages) {
            (Some(code), _) if code == TOKEN_NOT_VALID_CODE => ErrorBody::Code { code: code.into() },
            (_, Some(messages)) => ErrorBody::MessageList { messages },
            (Some(code), None) => ErrorBody::Code { code: code.into() },
            (None, None) => ErrorBody::Unrecognized,
        }
    }

    /// Whether this body explicitly reports an invalid or expired token.
    pub fn signals_expiry(&self) -> bool {
        match self {
            ErrorBody::Code { code } => code == TOKEN_NOT_VALID_CODE,
            ErrorBody::MessageList { messages } => messages
                .iter()
                .any(|m| m.to_lowercase().contains(EXPIRED_MARKER)),
            ErrorBody::Unrecognized => false,
        }
    }
}

/// Reduce a `messages` value to its texts.
///
/// Accepts a list of strings or `{"message": ...}` objects, or a single
/// entry of either shape. Anything else is not a message list.
fn message_texts(value: &Value) -> Option<Vec<String>> {
    let entry = |item: &Value| match item {
        Value::String(text) => Some(text.clone()),
        Value::Object(fields) => fields.get("message").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    };
    match value {
        Value::Array(items) => Some(items.iter().filter_map(entry).collect()),
        Value::String(_) | Value::Object(_) => Some(entry(value).into_iter().collect()),
        _ => None,
    }
}

/// Classify a response by status code and raw body.
pub fn classify(status: u16, body: &[u8]) -> Classification {
    match status {
        200..=299 => Classification::Valid,
        401 => Classification::Expired,
        400 if ErrorBody::parse(body).signals_expiry() => Classification::Expired,
        _ => Classification::OtherFailure,
    }
}
