//! Response normalization: raw status and body to canonical results.
//!
//! Each operation keeps its own failure shape; see [`UpstreamError`].

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::chat::{Choice, ChoiceMessage, CompletionResponse};
use crate::error::{Error, Result, UpstreamError};
use crate::message::Role;
use crate::transport::{RawResponse, ResponseBody};

use super::types::{OpenAIChatResponse, OpenAIErrorResponse};

/// Statuses for which a speech error body is expected to carry a message.
const SPEECH_DETAILED_STATUSES: [u16; 4] = [400, 401, 429, 500];

fn decode_body<T: DeserializeOwned>(body: ResponseBody) -> serde_json::Result<T> {
    match body {
        ResponseBody::Json(value) => serde_json::from_value(value),
        ResponseBody::Text(text) => serde_json::from_str(&text),
        ResponseBody::Bytes(bytes) => serde_json::from_slice(&bytes),
    }
}

/// Normalize a chat completion response.
pub fn normalize_chat(response: RawResponse) -> Result<CompletionResponse> {
    if !response.is_success() {
        return Err(UpstreamError::Chat {
            status: response.status,
            body: response.body,
        }
        .into());
    }

    let raw: OpenAIChatResponse =
        decode_body(response.body).map_err(|e| Error::decode(e.to_string()))?;

    let choices = raw
        .choices
        .into_iter()
        .map(|choice| -> Result<Choice> {
            let role: Role = choice
                .message
                .role
                .parse()
                .map_err(|e| Error::decode(format!("{e}")))?;
            Ok(Choice {
                index: choice.index,
                message: ChoiceMessage {
                    role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CompletionResponse {
        id: raw.id,
        object: raw.object,
        created: raw.created,
        model: raw.model,
        choices,
    })
}

/// Normalize a transcription response to its text.
pub fn normalize_transcription(response: RawResponse) -> Result<String> {
    let RawResponse { status, body } = response;

    if !crate::transport::is_success(status) {
        let error = match body {
            ResponseBody::Json(value) => value,
            other => {
                let text = other.to_string();
                serde_json::from_str::<Value>(&text)
                    .unwrap_or_else(|_| json!({"error": {"message": text}}))
            }
        };
        return Err(UpstreamError::Transcription { status, error }.into());
    }

    match body {
        ResponseBody::Json(value) => value
            .get("text")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::decode("invalid response format")),
        ResponseBody::Text(text) => Ok(text),
        ResponseBody::Bytes(bytes) => String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::decode("invalid response format")),
    }
}

/// Normalize a speech response to the audio bytes.
pub fn normalize_speech(response: RawResponse) -> Result<Bytes> {
    let RawResponse { status, body } = response;

    if crate::transport::is_success(status) {
        return Ok(body.into_bytes());
    }

    let message = if SPEECH_DETAILED_STATUSES.contains(&status) {
        decode_body::<OpenAIErrorResponse>(body).map_or_else(
            |_| format!("Failed to generate speech (Status: {status})"),
            |e| e.error.message,
        )
    } else {
        "Failed to generate speech".to_owned()
    };

    Err(UpstreamError::Speech {
        status: Some(status),
        message,
    }
    .into())
}
