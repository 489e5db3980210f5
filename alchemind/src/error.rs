//! Error types for the adapter.
//!
//! Every public operation returns [`Result`]. The variants mirror where a
//! failure happened: before dispatch (configuration, request construction),
//! inside the transport, in the upstream service, while decoding a successful
//! body, or during a streaming session.

use std::fmt;

use serde_json::Value;

use crate::transport::{ResponseBody, TransportError};

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Client configuration is unusable (e.g. missing credential).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required request field could not be resolved; nothing was sent.
    #[error("Invalid request: {0}")]
    RequestConstruction(String),

    /// The transport itself failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The upstream service answered with a non-success status.
    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    /// A success-status body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// No event for the streaming session arrived in time.
    #[error("Streaming timeout")]
    StreamTimeout,

    /// The chunk source reported an error for the streaming session.
    #[error("Streaming error: {0}")]
    StreamUpstream(String),

    /// The background delivery task did not run to completion (sink panic).
    #[error("Streaming task aborted: {0}")]
    StreamAborted(String),
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a request construction error.
    #[must_use]
    pub fn request(msg: impl Into<String>) -> Self {
        Self::RequestConstruction(msg.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a streaming upstream error.
    #[must_use]
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::StreamUpstream(msg.into())
    }

    /// Returns the upstream error if this is one.
    #[must_use]
    pub const fn as_upstream(&self) -> Option<&UpstreamError> {
        match self {
            Self::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

/// A non-success answer from the upstream service.
///
/// Each endpoint answers failures with its own body shape, so each operation
/// keeps its own variant instead of sharing one schema.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Chat completion failure; the body is kept exactly as received.
    Chat {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: ResponseBody,
    },

    /// Transcription failure with a structured error payload.
    Transcription {
        /// HTTP status code.
        status: u16,
        /// Decoded error body, or `{"error":{"message":..}}` wrapping raw text.
        error: Value,
    },

    /// Speech synthesis failure.
    Speech {
        /// HTTP status code, when the response carried one.
        status: Option<u16>,
        /// Extracted or generic message.
        message: String,
    },
}

impl UpstreamError {
    /// HTTP status of the failed response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Chat { status, .. } | Self::Transcription { status, .. } => Some(*status),
            Self::Speech { status, .. } => *status,
        }
    }

    /// Best-effort human readable message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Chat { body, .. } => body.to_string(),
            Self::Transcription { error, .. } => error
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), ToOwned::to_owned),
            Self::Speech { message, .. } => message.clone(),
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat { status, body } => {
                write!(f, "Chat completion failed (HTTP {status}): {body}")
            }
            Self::Transcription { status, .. } => {
                write!(f, "Transcription failed (HTTP {status}): {}", self.message())
            }
            Self::Speech { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for UpstreamError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_error_displays_bare_message() {
        let err = Error::from(UpstreamError::Speech {
            status: Some(400),
            message: "Invalid input text".to_owned(),
        });
        assert_eq!(err.to_string(), "Invalid input text");
    }

    #[test]
    fn test_transcription_message_prefers_nested_message() {
        let err = UpstreamError::Transcription {
            status: 400,
            error: serde_json::json!({"error": {"message": "bad audio"}}),
        };
        assert_eq!(err.message(), "bad audio");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_chat_error_keeps_raw_body() {
        let err = UpstreamError::Chat {
            status: 503,
            body: ResponseBody::Text("overloaded".to_owned()),
        };
        assert_eq!(err.message(), "overloaded");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_stream_timeout_message() {
        assert_eq!(Error::StreamTimeout.to_string(), "Streaming timeout");
    }
}
