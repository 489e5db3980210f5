//! Request building: canonical inputs to [`WireRequest`]s.
//!
//! Building is pure. The same inputs always produce the same payload, and
//! nothing here touches the network.

use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};

use crate::audio::{SpeechOptions, TranscriptionOptions};
use crate::chat::CompletionOptions;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::transport::{FormPart, Operation, WireBody, WireRequest};

use super::config::ClientConfig;
use super::types::{OpenAIChatRequest, OpenAIMessage, OpenAISpeechRequest};

/// Connect and receive bound for transcription uploads.
pub const TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(60);
/// Filename announced for uploaded audio.
pub const AUDIO_FILENAME: &str = "audio.webm";
/// Content type announced for uploaded audio.
pub const AUDIO_CONTENT_TYPE: &str = "audio/webm";

/// Resolve the chat model: call site first, then the client default.
pub fn resolve_model(config: &ClientConfig, options: &CompletionOptions) -> Result<String> {
    options
        .model
        .as_deref()
        .or(config.model.as_deref())
        .filter(|m| !m.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| Error::request("no model given and the client has no default model"))
}

fn auth_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let key = config
        .api_key
        .as_deref()
        .ok_or_else(|| Error::config("API key is required"))?;
    let value = HeaderValue::from_str(&format!("Bearer {key}"))
        .map_err(|_| Error::config("API key contains characters not allowed in a header"))?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn json_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = auth_headers(config)?;
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn chat_body(
    model: &str,
    messages: &[Message],
    options: &CompletionOptions,
    stream: bool,
) -> Result<WireBody> {
    let body = OpenAIChatRequest {
        model,
        messages: messages
            .iter()
            .map(|m| OpenAIMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        stream,
    };
    serde_json::to_value(&body)
        .map(WireBody::Json)
        .map_err(|e| Error::request(format!("failed to encode chat request: {e}")))
}

fn chat_request(
    config: &ClientConfig,
    messages: &[Message],
    options: &CompletionOptions,
    operation: Operation,
) -> Result<WireRequest> {
    let model = resolve_model(config, options)?;
    let stream = operation == Operation::ChatStream;

    Ok(WireRequest {
        operation,
        url: format!("{}/chat/completions", config.base_url()),
        headers: json_headers(config)?,
        body: chat_body(&model, messages, options, stream)?,
        connect_timeout: None,
        receive_timeout: None,
    })
}

/// Build a chat completion request.
pub fn build_chat(
    config: &ClientConfig,
    messages: &[Message],
    options: &CompletionOptions,
) -> Result<WireRequest> {
    chat_request(config, messages, options, Operation::Chat)
}

/// Build a streaming chat completion request (`"stream": true`).
pub fn build_chat_stream(
    config: &ClientConfig,
    messages: &[Message],
    options: &CompletionOptions,
) -> Result<WireRequest> {
    chat_request(config, messages, options, Operation::ChatStream)
}

/// Build a transcription upload.
pub fn build_transcription(
    config: &ClientConfig,
    audio: Bytes,
    options: &TranscriptionOptions,
) -> Result<WireRequest> {
    let mut parts = vec![
        FormPart::File {
            name: "file".to_owned(),
            filename: AUDIO_FILENAME.to_owned(),
            content_type: AUDIO_CONTENT_TYPE.to_owned(),
            data: audio,
        },
        FormPart::text("model", options.model.clone()),
        FormPart::text(
            "response_format",
            options
                .response_format
                .as_deref()
                .unwrap_or(TranscriptionOptions::DEFAULT_RESPONSE_FORMAT),
        ),
    ];
    if let Some(language) = &options.language {
        parts.push(FormPart::text("language", language.clone()));
    }
    if let Some(prompt) = &options.prompt {
        parts.push(FormPart::text("prompt", prompt.clone()));
    }
    if let Some(temperature) = options.temperature {
        parts.push(FormPart::text("temperature", temperature.to_string()));
    }

    Ok(WireRequest {
        operation: Operation::Transcription,
        url: format!("{}/audio/transcriptions", config.base_url()),
        headers: auth_headers(config)?,
        body: WireBody::Multipart(parts),
        connect_timeout: Some(TRANSCRIPTION_TIMEOUT),
        receive_timeout: Some(TRANSCRIPTION_TIMEOUT),
    })
}

/// Build a text-to-speech request.
pub fn build_speech(
    config: &ClientConfig,
    input: &str,
    options: &SpeechOptions,
) -> Result<WireRequest> {
    if input.is_empty() {
        return Err(Error::request("speech input must not be empty"));
    }

    let body = OpenAISpeechRequest {
        model: &options.model,
        input,
        voice: &options.voice,
        response_format: &options.response_format,
        speed: options.speed,
    };
    let body = serde_json::to_value(&body)
        .map_err(|e| Error::request(format!("failed to encode speech request: {e}")))?;

    Ok(WireRequest {
        operation: Operation::Speech,
        url: format!("{}/audio/speech", config.base_url()),
        headers: json_headers(config)?,
        body: WireBody::Json(body),
        connect_timeout: None,
        receive_timeout: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("sk-test").with_base_url("https://api.example.com/v1")
    }

    fn conversation() -> Vec<Message> {
        vec![
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::assistant("Hi!"),
            Message::user("How are you?"),
        ]
    }

    fn field<'a>(parts: &'a [FormPart], name: &str) -> Option<&'a FormPart> {
        parts.iter().find(|p| p.name() == name)
    }

    fn text_field<'a>(parts: &'a [FormPart], name: &str) -> Option<&'a str> {
        match field(parts, name)? {
            FormPart::Text { value, .. } => Some(value.as_str()),
            FormPart::File { .. } => None,
        }
    }

    mod chat {
        use super::*;

        #[test]
        fn test_maps_messages_in_order() {
            let req = build_chat(&config(), &conversation(), &CompletionOptions::new().model("gpt-4o"))
                .unwrap();
            let body = req.body.as_json().unwrap();

            assert_eq!(body["model"], "gpt-4o");
            assert_eq!(
                body["messages"],
                json!([
                    {"role": "system", "content": "You are helpful"},
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi!"},
                    {"role": "user", "content": "How are you?"}
                ])
            );
        }

        #[test]
        fn test_omits_absent_optional_fields() {
            let req = build_chat(&config(), &conversation(), &CompletionOptions::new().model("m"))
                .unwrap();
            let body = req.body.as_json().unwrap().as_object().unwrap();

            let mut keys: Vec<&str> = body.keys().map(String::as_str).collect();
            keys.sort_unstable();
            assert_eq!(keys, ["messages", "model"]);
        }

        #[test]
        fn test_includes_present_optional_fields() {
            let opts = CompletionOptions::new().model("m").temperature(0.5).max_tokens(100);
            let req = build_chat(&config(), &conversation(), &opts).unwrap();
            let body = req.body.as_json().unwrap();

            assert_eq!(body["temperature"], 0.5);
            assert_eq!(body["max_tokens"], 100);
            assert!(body.get("stream").is_none());
        }

        #[test]
        fn test_temperature_keeps_its_decimal_form() {
            let opts = CompletionOptions::new().model("m").temperature(0.7);
            let req = build_chat(&config(), &conversation(), &opts).unwrap();

            let json = serde_json::to_string(req.body.as_json().unwrap()).unwrap();
            assert!(json.contains(r#""temperature":0.7"#), "{json}");
        }

        #[test]
        fn test_call_site_model_wins() {
            let config = config().with_model("default-model");
            let req = build_chat(&config, &conversation(), &CompletionOptions::new().model("override"))
                .unwrap();
            assert_eq!(req.body.as_json().unwrap()["model"], "override");

            let req = build_chat(&config, &conversation(), &CompletionOptions::new()).unwrap();
            assert_eq!(req.body.as_json().unwrap()["model"], "default-model");
        }

        #[test]
        fn test_unresolved_model_is_a_request_error() {
            let err = build_chat(&config(), &conversation(), &CompletionOptions::new()).unwrap_err();
            assert!(matches!(err, Error::RequestConstruction(_)));
        }

        #[test]
        fn test_sets_headers_and_url() {
            let req = build_chat(&config(), &conversation(), &CompletionOptions::new().model("m"))
                .unwrap();

            assert_eq!(req.operation, Operation::Chat);
            assert_eq!(req.url, "https://api.example.com/v1/chat/completions");
            assert_eq!(req.headers[AUTHORIZATION], "Bearer sk-test");
            assert_eq!(req.headers[CONTENT_TYPE], "application/json");
            assert!(req.connect_timeout.is_none());
        }

        #[test]
        fn test_building_twice_is_byte_identical() {
            let opts = CompletionOptions::new().model("m").temperature(0.7);
            let a = build_chat(&config(), &conversation(), &opts).unwrap();
            let b = build_chat(&config(), &conversation(), &opts).unwrap();

            let a = serde_json::to_vec(a.body.as_json().unwrap()).unwrap();
            let b = serde_json::to_vec(b.body.as_json().unwrap()).unwrap();
            assert_eq!(a, b);
        }

        #[test]
        fn test_stream_variant_sets_flag() {
            let req = build_chat_stream(&config(), &conversation(), &CompletionOptions::new().model("m"))
                .unwrap();
            assert_eq!(req.operation, Operation::ChatStream);
            assert_eq!(req.body.as_json().unwrap()["stream"], true);
        }
    }

    mod transcription {
        use super::*;

        #[test]
        fn test_defaults_to_text_format() {
            let req = build_transcription(
                &config(),
                Bytes::from_static(b"audio-bytes"),
                &TranscriptionOptions::new(),
            )
            .unwrap();
            let parts = req.body.as_multipart().unwrap();

            assert_eq!(text_field(parts, "model"), Some("whisper-1"));
            assert_eq!(text_field(parts, "response_format"), Some("text"));
            assert!(field(parts, "language").is_none());
            assert!(field(parts, "prompt").is_none());
            assert!(field(parts, "temperature").is_none());
        }

        #[test]
        fn test_attaches_file_part() {
            let req = build_transcription(
                &config(),
                Bytes::from_static(b"audio-bytes"),
                &TranscriptionOptions::new(),
            )
            .unwrap();
            let parts = req.body.as_multipart().unwrap();

            assert_eq!(
                field(parts, "file"),
                Some(&FormPart::File {
                    name: "file".to_owned(),
                    filename: AUDIO_FILENAME.to_owned(),
                    content_type: AUDIO_CONTENT_TYPE.to_owned(),
                    data: Bytes::from_static(b"audio-bytes"),
                })
            );
        }

        #[test]
        fn test_includes_present_options() {
            let opts = TranscriptionOptions::new()
                .language("en")
                .prompt("names: Ada")
                .response_format("json")
                .temperature(0.25);
            let req = build_transcription(&config(), Bytes::from_static(b"x"), &opts).unwrap();
            let parts = req.body.as_multipart().unwrap();

            assert_eq!(text_field(parts, "language"), Some("en"));
            assert_eq!(text_field(parts, "prompt"), Some("names: Ada"));
            assert_eq!(text_field(parts, "response_format"), Some("json"));
            assert_eq!(text_field(parts, "temperature"), Some("0.25"));
        }

        #[test]
        fn test_only_authorization_header_and_extended_timeouts() {
            let req = build_transcription(&config(), Bytes::new(), &TranscriptionOptions::new())
                .unwrap();

            assert_eq!(req.url, "https://api.example.com/v1/audio/transcriptions");
            assert_eq!(req.headers.len(), 1);
            assert!(req.headers.contains_key(AUTHORIZATION));
            assert_eq!(req.connect_timeout, Some(TRANSCRIPTION_TIMEOUT));
            assert_eq!(req.receive_timeout, Some(TRANSCRIPTION_TIMEOUT));
        }
    }

    mod speech {
        use super::*;

        #[test]
        fn test_uses_defaults() {
            let req = build_speech(&config(), "hello", &SpeechOptions::new()).unwrap();

            assert_eq!(req.url, "https://api.example.com/v1/audio/speech");
            assert_eq!(
                req.body.as_json().unwrap(),
                &json!({
                    "model": "gpt-4o-mini-tts",
                    "input": "hello",
                    "voice": "alloy",
                    "response_format": "mp3"
                })
            );
            assert_eq!(req.headers[CONTENT_TYPE], "application/json");
        }

        #[test]
        fn test_includes_speed_when_set() {
            let req = build_speech(&config(), "hello", &SpeechOptions::new().speed(1.5)).unwrap();
            assert_eq!(req.body.as_json().unwrap()["speed"], 1.5);
        }

        #[test]
        fn test_speed_keeps_its_decimal_form() {
            let req = build_speech(&config(), "hello", &SpeechOptions::new().speed(1.1)).unwrap();

            let json = serde_json::to_string(req.body.as_json().unwrap()).unwrap();
            assert!(json.contains(r#""speed":1.1"#), "{json}");
        }

        #[test]
        fn test_empty_input_is_rejected() {
            let err = build_speech(&config(), "", &SpeechOptions::new()).unwrap_err();
            assert!(matches!(err, Error::RequestConstruction(_)));
        }
    }
}
