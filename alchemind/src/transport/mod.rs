//! Transport port and wire-level request/response types.
//!
//! The adapter never talks to the network directly. It hands a fully built
//! [`WireRequest`] to a [`Transport`] and gets back a [`RawResponse`]
//! (status plus body). Two production transports are provided:
//!
//! - [`HttpTransport`] - direct HTTP via `reqwest`
//! - [`BridgeTransport`] - routes each operation through a [`NativeBridge`]
//!
//! Tests substitute their own implementation.

mod bridge;
mod http_client;

pub use self::bridge::{BridgeOptions, BridgeTransport, NativeBridge};
pub use self::http_client::HttpTransport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use serde_json::Value;

/// Which adapter operation a wire request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Chat completion (`/chat/completions`).
    Chat,
    /// Streaming chat completion (`/chat/completions` with `stream: true`).
    ChatStream,
    /// Audio transcription (`/audio/transcriptions`).
    Transcription,
    /// Text-to-speech (`/audio/speech`).
    Speech,
}

impl Operation {
    /// Operation name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::ChatStream => "chat_stream",
            Self::Transcription => "transcription",
            Self::Speech => "speech",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built request, ready for a transport.
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// Operation this request performs.
    pub operation: Operation,
    /// Absolute target URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: WireBody,
    /// Bound on establishing the exchange (connect + response head).
    pub connect_timeout: Option<Duration>,
    /// Bound on receiving the response body.
    pub receive_timeout: Option<Duration>,
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq)]
pub enum WireBody {
    /// JSON document.
    Json(Value),
    /// Ordered multipart form fields.
    Multipart(Vec<FormPart>),
}

impl WireBody {
    /// Returns the JSON document if this is a JSON body.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Multipart(_) => None,
        }
    }

    /// Returns the multipart fields if this is a multipart body.
    #[must_use]
    pub fn as_multipart(&self) -> Option<&[FormPart]> {
        match self {
            Self::Multipart(parts) => Some(parts),
            Self::Json(_) => None,
        }
    }
}

/// A single multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    /// Plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// Binary file field.
    File {
        /// Field name.
        name: String,
        /// Filename announced to the server.
        filename: String,
        /// MIME type of the content.
        content_type: String,
        /// File content.
        data: Bytes,
    },
}

impl FormPart {
    /// Creates a text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Status and body returned by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: ResponseBody,
}

impl RawResponse {
    /// Creates a response.
    #[must_use]
    pub const fn new(status: u16, body: ResponseBody) -> Self {
        Self { status, body }
    }

    /// Creates a JSON response.
    #[must_use]
    pub const fn json(status: u16, value: Value) -> Self {
        Self::new(status, ResponseBody::Json(value))
    }

    /// Creates a text response.
    #[must_use]
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self::new(status, ResponseBody::Text(text.into()))
    }

    /// Creates a binary response.
    #[must_use]
    pub fn bytes(status: u16, data: impl Into<Bytes>) -> Self {
        Self::new(status, ResponseBody::Bytes(data.into()))
    }

    /// Whether the status lies in the success band `[200, 299]`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        is_success(self.status)
    }
}

/// Whether `status` lies in the success band `[200, 299]`.
#[must_use]
pub const fn is_success(status: u16) -> bool {
    200 <= status && status <= 299
}

/// Response body as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Opaque bytes.
    Bytes(Bytes),
    /// Text.
    Text(String),
    /// Already decoded JSON.
    Json(Value),
}

impl ResponseBody {
    /// Text view of the body, if it is text or UTF-8 bytes.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            Self::Json(_) => None,
        }
    }

    /// Consumes the body into bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => Bytes::from(text),
            Self::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Self::Text(text) => f.write_str(text),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

/// Failure of the transport itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The exchange exceeded a configured timeout.
    #[error("Request timed out")]
    Timeout,
    /// Could not connect.
    #[error("Connection failed: {0}")]
    Connect(String),
    /// Any other network failure.
    #[error("{0}")]
    Network(String),
    /// The request could not be assembled (bad header, MIME type, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Reading the response body failed.
    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Performs one request/response exchange with the upstream service.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends `request` and returns the raw status and body.
    async fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError>;
}
