//! OpenAI API request and response types.
//!
//! These map directly to the upstream JSON and stay internal; the canonical
//! shapes callers see live in [`crate::chat`] and [`crate::message`].

use serde::{Deserialize, Serialize};

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct OpenAIChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// Request message.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct OpenAIMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Text-to-speech request body.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct OpenAISpeechRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
    pub voice: &'a str,
    pub response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OpenAIChatResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<OpenAIChoice>,
}

/// Response choice.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OpenAIChoice {
    pub index: u32,
    pub message: OpenAIResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response message; the role is validated after decoding.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OpenAIResponseMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Streaming chunk (`chat.completion.chunk`).
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct OpenAIStreamChunk {
    #[serde(default)]
    pub choices: Vec<OpenAIStreamChoice>,
    /// Some compatible servers report failures inside the stream.
    #[serde(default)]
    pub error: Option<OpenAIError>,
}

/// Stream choice.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OpenAIStreamChoice {
    #[serde(default)]
    pub delta: OpenAIStreamDelta,
}

/// Stream delta.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct OpenAIStreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OpenAIErrorResponse {
    pub error: OpenAIError,
}

/// Error details.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OpenAIError {
    pub message: String,
}
