//! Error types for the shop client
//!
//! Every failure of a network operation ends up as one human-readable
//! message in a `Failed` lifecycle. [`ApiError`] keeps the distinction
//! between failure sources for logs; [`ApiError::normalized`] collapses it.

use crate::resource::{OperationKind, ResourceKind};
use serde_json::Value;
use thiserror::Error;

/// Message shown when a failure carries nothing more useful
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

const NETWORK_ERROR_MESSAGE: &str = "Unable to reach the server. Check your connection and try again.";

const MALFORMED_RESPONSE_MESSAGE: &str = "The server sent a response that could not be read.";

/// Errors that can occur when talking to the shop backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Request never produced a response (connection refused, timeout, reset)
    #[error("Network failure: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("Server rejected request (status {status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Message extracted from the error envelope, empty when absent
        message: String,
    },

    /// Success status but the body could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The request could not be built (bad attachment content type, missing id)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Success envelope lacks the field holding the payload
    #[error("Response envelope has no `{0}` field")]
    MissingPayload(String),

    /// The resource kind has no endpoint for this operation
    #[error("{kind} does not support {operation}")]
    Unsupported {
        /// Resource kind the operation was issued against
        kind: ResourceKind,
        /// Operation that has no endpoint
        operation: OperationKind,
    },
}

impl ApiError {
    /// The single message surfaced through a `Failed` lifecycle
    ///
    /// Never empty.
    #[must_use]
    pub fn normalized(&self) -> String {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Rejected { .. } | Self::InvalidRequest(_) => FALLBACK_ERROR_MESSAGE.to_string(),
            Self::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Self::MalformedResponse(_) | Self::MissingPayload(_) => {
                MALFORMED_RESPONSE_MESSAGE.to_string()
            },
            Self::Unsupported { .. } => self.to_string(),
        }
    }

    /// Short label used for metrics and logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Rejected { .. } => "rejected",
            Self::MalformedResponse(_) | Self::MissingPayload(_) => "malformed",
            Self::InvalidRequest(_) | Self::Unsupported { .. } => "invalid",
        }
    }
}

/// Pull the human-readable message out of an error response body
///
/// Looks at `message`, then `error.message`, then a string `error`, then
/// `errMessage`. Blank strings do not count.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let envelope: Value = serde_json::from_str(body).ok()?;

    let candidates = [
        envelope.get("message"),
        envelope.get("error").and_then(|error| error.get("message")),
        envelope.get("error"),
        envelope.get("errMessage"),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(str::to_string)
}

/// Invalid configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A URL setting does not parse
    #[error("{variable} is not a valid URL: {value}")]
    InvalidUrl {
        /// Environment variable holding the value
        variable: &'static str,
        /// Offending value
        value: String,
    },

    /// Unknown settle policy name
    #[error("Unknown settle policy `{0}` (expected `last-to-settle` or `latest-issued`)")]
    UnknownSettlePolicy(String),
}
