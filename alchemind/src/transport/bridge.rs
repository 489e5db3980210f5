//! Transport backed by an in-process native bridge.
//!
//! The bridge speaks in plain values (messages, strings, byte buffers)
//! rather than HTTP. [`BridgeTransport`] translates wire requests into
//! bridge calls and bridge results back into raw responses, so the rest of
//! the adapter cannot tell the two transports apart.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};

use crate::chat::unix_timestamp;
use crate::message::Message;
use crate::stream::{ChunkRequest, ChunkSource, EventSender, SessionToken};

use super::{FormPart, Operation, RawResponse, Transport, TransportError, WireBody, WireRequest};

/// Audio shorter than this is refused before reaching the bridge.
pub const MIN_AUDIO_LEN: usize = 10;

/// Loose string options handed to audio bridge calls.
pub type BridgeOptions = BTreeMap<String, String>;

/// Blocking native implementation of the provider operations.
///
/// Errors are plain messages; they surface to callers as upstream failures
/// with status 500.
pub trait NativeBridge: Send + Sync + 'static {
    /// Run a chat completion and return the assistant content.
    fn complete_chat(&self, messages: &[Message], model: &str) -> Result<String, String>;

    /// Ask for the next chunk of a streaming completion.
    ///
    /// Must deliver exactly one event tagged with `token` through `events`,
    /// possibly later and from another thread.
    fn request_next_chunk(
        &self,
        messages: &[Message],
        model: &str,
        events: EventSender,
        token: SessionToken,
    );

    /// Transcribe audio to text.
    fn transcribe(&self, audio: &[u8], options: &BridgeOptions) -> Result<String, String>;

    /// Synthesize speech audio.
    fn synthesize_speech(&self, input: &str, options: &BridgeOptions) -> Result<Vec<u8>, String>;
}

/// Adapts a [`NativeBridge`] to [`Transport`] and [`ChunkSource`].
pub struct BridgeTransport<B> {
    bridge: Arc<B>,
}

impl<B> BridgeTransport<B> {
    /// Wrap a bridge.
    pub fn new(bridge: B) -> Self {
        Self {
            bridge: Arc::new(bridge),
        }
    }

    /// Wrap a shared bridge.
    #[must_use]
    pub const fn from_arc(bridge: Arc<B>) -> Self {
        Self { bridge }
    }
}

impl<B> Clone for BridgeTransport<B> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
        }
    }
}

impl<B> fmt::Debug for BridgeTransport<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeTransport")
            .field("bridge", &std::any::type_name::<B>())
            .finish()
    }
}

/// Run a blocking bridge call; a panic becomes an error message.
async fn run_blocking<T, F>(call: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .unwrap_or_else(|e| Err(format!("native bridge task failed: {e}")))
}

fn failure(message: &str) -> RawResponse {
    tracing::warn!(error = %message, "Native bridge call failed");
    RawResponse::json(500, json!({"error": {"message": message}}))
}

fn json_body(request: &WireRequest) -> Result<&Value, TransportError> {
    request.body.as_json().ok_or_else(|| {
        TransportError::InvalidRequest(format!("{} expects a JSON body", request.operation))
    })
}

fn chat_input(body: &Value) -> Result<(String, Vec<Message>), TransportError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::InvalidRequest("chat body has no model".to_owned()))?
        .to_owned();
    let messages = body
        .get("messages")
        .cloned()
        .map(serde_json::from_value::<Vec<Message>>)
        .transpose()
        .map_err(|e| TransportError::InvalidRequest(format!("invalid chat messages: {e}")))?
        .unwrap_or_default();
    Ok((model, messages))
}

fn chat_completion_body(model: &str, content: String) -> Value {
    json!({
        "id": format!("chatcmpl-{}", SessionToken::new()),
        "object": "chat.completion",
        "created": unix_timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn transcription_input(parts: &[FormPart]) -> Result<(Bytes, BridgeOptions), TransportError> {
    let mut audio = None;
    let mut options = BridgeOptions::new();
    for part in parts {
        match part {
            FormPart::File { data, .. } => audio = Some(data.clone()),
            FormPart::Text { name, value } => {
                options.insert(name.clone(), value.clone());
            }
        }
    }
    let audio = audio.ok_or_else(|| {
        TransportError::InvalidRequest("transcription form has no file part".to_owned())
    })?;
    Ok((audio, options))
}

fn speech_input(body: &Value) -> Result<(String, BridgeOptions), TransportError> {
    let object = body
        .as_object()
        .ok_or_else(|| TransportError::InvalidRequest("speech body is not an object".to_owned()))?;
    let input = object
        .get("input")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::InvalidRequest("speech body has no input".to_owned()))?
        .to_owned();
    let options = object
        .iter()
        .filter(|(key, _)| key.as_str() != "input")
        .map(|(key, value)| {
            let value = value
                .as_str()
                .map_or_else(|| value.to_string(), ToOwned::to_owned);
            (key.clone(), value)
        })
        .collect();
    Ok((input, options))
}

#[async_trait]
impl<B: NativeBridge> Transport for BridgeTransport<B> {
    async fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError> {
        let bridge = Arc::clone(&self.bridge);
        tracing::debug!(operation = %request.operation, "Dispatching to native bridge");

        match request.operation {
            Operation::Chat | Operation::ChatStream => {
                let (model, messages) = chat_input(json_body(request)?)?;
                let call_model = model.clone();
                let result = run_blocking(move || bridge.complete_chat(&messages, &call_model)).await;
                Ok(match result {
                    Ok(content) => RawResponse::json(200, chat_completion_body(&model, content)),
                    Err(message) => failure(&message),
                })
            }
            Operation::Transcription => {
                let WireBody::Multipart(parts) = &request.body else {
                    return Err(TransportError::InvalidRequest(
                        "transcription expects a multipart body".to_owned(),
                    ));
                };
                let (audio, options) = transcription_input(parts)?;
                if audio.len() < MIN_AUDIO_LEN {
                    return Ok(failure("Audio binary too small"));
                }
                let result = run_blocking(move || bridge.transcribe(&audio, &options)).await;
                Ok(match result {
                    Ok(text) => RawResponse::text(200, text),
                    Err(message) => failure(&message),
                })
            }
            Operation::Speech => {
                let (input, options) = speech_input(json_body(request)?)?;
                let result = run_blocking(move || bridge.synthesize_speech(&input, &options)).await;
                Ok(match result {
                    Ok(audio) => RawResponse::bytes(200, audio),
                    Err(message) => failure(&message),
                })
            }
        }
    }
}

impl<B: NativeBridge> ChunkSource for BridgeTransport<B> {
    fn request_next_chunk(&self, request: &ChunkRequest, events: EventSender) {
        let bridge = Arc::clone(&self.bridge);
        let request = request.clone();
        let token = request.token;
        let fallback = events.clone();

        tokio::spawn(async move {
            let call = tokio::task::spawn_blocking(move || {
                bridge.request_next_chunk(&request.messages, &request.model, events, request.token);
            });
            if let Err(e) = call.await {
                fallback.error(token, format!("native bridge task failed: {e}"));
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use http::HeaderMap;

    use super::*;
    use crate::stream::{EventKind, StreamEvent};

    #[derive(Debug, Default)]
    struct FakeBridge {
        fail: bool,
        seen_options: Mutex<Option<BridgeOptions>>,
        seen_messages: Mutex<Vec<Message>>,
    }

    impl FakeBridge {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    impl NativeBridge for FakeBridge {
        fn complete_chat(&self, messages: &[Message], model: &str) -> Result<String, String> {
            *self.seen_messages.lock().unwrap() = messages.to_vec();
            if self.fail {
                return Err("model overloaded".to_owned());
            }
            Ok(format!("{model} says hi"))
        }

        fn request_next_chunk(
            &self,
            _messages: &[Message],
            _model: &str,
            events: EventSender,
            token: SessionToken,
        ) {
            if self.fail {
                panic!("bridge crashed");
            }
            events.chunk(token, "piece");
        }

        fn transcribe(&self, audio: &[u8], options: &BridgeOptions) -> Result<String, String> {
            *self.seen_options.lock().unwrap() = Some(options.clone());
            if self.fail {
                return Err("bad audio".to_owned());
            }
            Ok(format!("{} bytes", audio.len()))
        }

        fn synthesize_speech(
            &self,
            input: &str,
            options: &BridgeOptions,
        ) -> Result<Vec<u8>, String> {
            *self.seen_options.lock().unwrap() = Some(options.clone());
            if self.fail {
                return Err("Invalid voice".to_owned());
            }
            Ok(input.as_bytes().to_vec())
        }
    }

    fn wire(operation: Operation, body: WireBody) -> WireRequest {
        WireRequest {
            operation,
            url: "bridge://local".to_owned(),
            headers: HeaderMap::new(),
            body,
            connect_timeout: None,
            receive_timeout: None,
        }
    }

    fn chat_wire() -> WireRequest {
        wire(
            Operation::Chat,
            WireBody::Json(json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "Hello"}]
            })),
        )
    }

    mod chat {
        use super::*;

        #[tokio::test]
        async fn test_success_is_synthesized_completion() {
            let bridge = Arc::new(FakeBridge::default());
            let transport = BridgeTransport::from_arc(Arc::clone(&bridge));

            let resp = transport.send(&chat_wire()).await.unwrap();
            assert_eq!(resp.status, 200);

            let body = match resp.body {
                crate::transport::ResponseBody::Json(value) => value,
                other => panic!("expected JSON body, got {other:?}"),
            };
            assert_eq!(body["model"], "gpt-4o");
            assert_eq!(body["choices"][0]["message"]["role"], "assistant");
            assert_eq!(body["choices"][0]["message"]["content"], "gpt-4o says hi");
            assert_eq!(body["choices"][0]["finish_reason"], "stop");
            assert_eq!(*bridge.seen_messages.lock().unwrap(), vec![Message::user("Hello")]);
        }

        #[tokio::test]
        async fn test_failure_is_status_500() {
            let transport = BridgeTransport::new(FakeBridge::failing());
            let resp = transport.send(&chat_wire()).await.unwrap();
            assert_eq!(
                resp,
                RawResponse::json(500, json!({"error": {"message": "model overloaded"}}))
            );
        }

        #[tokio::test]
        async fn test_multipart_body_is_rejected() {
            let transport = BridgeTransport::new(FakeBridge::default());
            let err = transport
                .send(&wire(Operation::Chat, WireBody::Multipart(vec![])))
                .await
                .unwrap_err();
            assert!(matches!(err, TransportError::InvalidRequest(_)));
        }
    }

    mod audio {
        use super::*;

        fn transcription_wire() -> WireRequest {
            wire(
                Operation::Transcription,
                WireBody::Multipart(vec![
                    FormPart::File {
                        name: "file".to_owned(),
                        filename: "audio.webm".to_owned(),
                        content_type: "audio/webm".to_owned(),
                        data: Bytes::from_static(b"0123456789ab"),
                    },
                    FormPart::text("model", "whisper-1"),
                    FormPart::text("response_format", "text"),
                ]),
            )
        }

        #[tokio::test]
        async fn test_transcription_passes_form_fields_as_options() {
            let bridge = Arc::new(FakeBridge::default());
            let transport = BridgeTransport::from_arc(Arc::clone(&bridge));

            let resp = transport.send(&transcription_wire()).await.unwrap();
            assert_eq!(resp, RawResponse::text(200, "12 bytes"));

            let options = bridge.seen_options.lock().unwrap().clone().unwrap();
            assert_eq!(options.get("model").map(String::as_str), Some("whisper-1"));
            assert_eq!(options.get("response_format").map(String::as_str), Some("text"));
        }

        #[tokio::test]
        async fn test_tiny_audio_never_reaches_bridge() {
            let bridge = Arc::new(FakeBridge::default());
            let transport = BridgeTransport::from_arc(Arc::clone(&bridge));
            let request = wire(
                Operation::Transcription,
                WireBody::Multipart(vec![FormPart::File {
                    name: "file".to_owned(),
                    filename: "audio.webm".to_owned(),
                    content_type: "audio/webm".to_owned(),
                    data: Bytes::from_static(b"short"),
                }]),
            );

            let resp = transport.send(&request).await.unwrap();
            assert_eq!(
                resp,
                RawResponse::json(500, json!({"error": {"message": "Audio binary too small"}}))
            );
            assert!(bridge.seen_options.lock().unwrap().is_none());
        }

        #[tokio::test]
        async fn test_transcription_without_file_is_rejected() {
            let transport = BridgeTransport::new(FakeBridge::default());
            let err = transport
                .send(&wire(
                    Operation::Transcription,
                    WireBody::Multipart(vec![FormPart::text("model", "whisper-1")]),
                ))
                .await
                .unwrap_err();
            assert!(matches!(err, TransportError::InvalidRequest(_)));
        }

        #[tokio::test]
        async fn test_speech_returns_bytes_and_stringified_options() {
            let bridge = Arc::new(FakeBridge::default());
            let transport = BridgeTransport::from_arc(Arc::clone(&bridge));

            let resp = transport
                .send(&wire(
                    Operation::Speech,
                    WireBody::Json(json!({
                        "model": "tts-1",
                        "input": "hey",
                        "voice": "alloy",
                        "response_format": "mp3",
                        "speed": 1.5
                    })),
                ))
                .await
                .unwrap();
            assert_eq!(resp, RawResponse::bytes(200, b"hey".to_vec()));

            let options = bridge.seen_options.lock().unwrap().clone().unwrap();
            assert!(!options.contains_key("input"));
            assert_eq!(options.get("voice").map(String::as_str), Some("alloy"));
            assert_eq!(options.get("speed").map(String::as_str), Some("1.5"));
        }

        #[tokio::test]
        async fn test_speech_failure_is_status_500() {
            let transport = BridgeTransport::new(FakeBridge::failing());
            let resp = transport
                .send(&wire(Operation::Speech, WireBody::Json(json!({"input": "hey"}))))
                .await
                .unwrap();
            assert_eq!(resp.status, 500);
        }
    }

    mod chunks {
        use super::*;

        fn chunk_request(token: SessionToken) -> ChunkRequest {
            ChunkRequest {
                token,
                model: "gpt-4o".to_owned(),
                messages: vec![Message::user("Hi")].into(),
                wire: chat_wire(),
            }
        }

        #[tokio::test]
        async fn test_forwards_bridge_events() {
            let transport = BridgeTransport::new(FakeBridge::default());
            let (events, mut rx) = EventSender::channel();
            let token = SessionToken::new();

            transport.request_next_chunk(&chunk_request(token), events);

            assert_eq!(rx.recv().await, Some(StreamEvent::chunk(token, "piece")));
        }

        #[tokio::test]
        async fn test_bridge_panic_becomes_error_event() {
            let transport = BridgeTransport::new(FakeBridge::failing());
            let (events, mut rx) = EventSender::channel();
            let token = SessionToken::new();

            transport.request_next_chunk(&chunk_request(token), events);

            let event = rx.recv().await.unwrap();
            assert_eq!(event.token, token);
            assert!(matches!(event.kind, EventKind::Error(_)));
        }
    }
}
