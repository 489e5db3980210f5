//! OpenAI client facade.

use std::sync::Arc;

use bytes::Bytes;

use crate::audio::{SpeechOptions, TranscriptionOptions};
use crate::chat::{CompletionOptions, CompletionResponse};
use crate::error::Result;
use crate::message::Message;
use crate::stream::{ChunkRequest, ChunkSource, SessionToken, StreamHandle, StreamSink, StreamingSession};
use crate::transport::{BridgeTransport, HttpTransport, NativeBridge, Transport};

use super::config::ClientConfig;
use super::request;
use super::response;
use super::stream::SseChunkSource;

/// OpenAI API client.
///
/// Cheap to clone; clones share the configuration, transport and chunk
/// source.
#[derive(Debug, Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    chunk_source: Arc<dyn ChunkSource>,
}

impl Client {
    /// Create a client over HTTP with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::from_config(config).build()
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Start building a client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run a chat completion.
    pub async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse> {
        let wire = request::build_chat(&self.config, messages, options)?;
        tracing::debug!(messages = messages.len(), url = %wire.url, "Sending chat completion");

        let raw = self.transport.send(&wire).await?;
        response::normalize_chat(raw)
    }

    /// Start a streaming chat completion.
    ///
    /// Returns as soon as the background session is running. Each content
    /// delta is handed to `sink`; [`StreamHandle::finish`] yields the
    /// accumulated completion.
    pub async fn complete_stream<S: StreamSink>(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        sink: S,
    ) -> Result<StreamHandle> {
        let model = request::resolve_model(&self.config, options)?;
        let wire = request::build_chat_stream(&self.config, messages, options)?;

        let chunk_request = ChunkRequest {
            token: SessionToken::new(),
            model,
            messages: messages.into(),
            wire,
        };
        tracing::debug!(
            token = %chunk_request.token,
            model = %chunk_request.model,
            "Starting streaming completion"
        );

        Ok(StreamingSession::new(chunk_request, Arc::clone(&self.chunk_source), sink).spawn())
    }

    /// Transcribe audio to text.
    pub async fn transcribe(
        &self,
        audio: impl Into<Bytes>,
        options: &TranscriptionOptions,
    ) -> Result<String> {
        let audio = audio.into();
        let wire = request::build_transcription(&self.config, audio, options)?;
        tracing::debug!(model = %options.model, url = %wire.url, "Sending transcription");

        let raw = self.transport.send(&wire).await?;
        response::normalize_transcription(raw)
    }

    /// Synthesize speech from text.
    pub async fn speech(&self, input: &str, options: &SpeechOptions) -> Result<Bytes> {
        let wire = request::build_speech(&self.config, input, options)?;
        tracing::debug!(
            model = %options.model,
            voice = %options.voice,
            input_len = input.len(),
            "Sending speech request"
        );

        let raw = self.transport.send(&wire).await?;
        response::normalize_speech(raw)
    }
}

/// Builder for [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    chunk_source: Option<Arc<dyn ChunkSource>>,
}

impl ClientBuilder {
    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Sets the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Use a custom transport for non-streaming operations.
    ///
    /// Streaming completions keep using the chunk source; see
    /// [`ClientBuilder::chunk_source`] and [`ClientBuilder::bridge`].
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a custom chunk source for streaming completions.
    #[must_use]
    pub fn chunk_source(mut self, source: impl ChunkSource + 'static) -> Self {
        self.chunk_source = Some(Arc::new(source));
        self
    }

    /// Route every operation, streaming included, through a native bridge.
    #[must_use]
    pub fn bridge<B: NativeBridge>(mut self, bridge: BridgeTransport<B>) -> Self {
        self.chunk_source = Some(Arc::new(bridge.clone()));
        self.transport = Some(Arc::new(bridge));
        self
    }

    /// Build the client.
    ///
    /// Fails with [`Error::Config`](crate::Error::Config) when no usable API
    /// key was given.
    pub fn build(self) -> Result<Client> {
        self.config.validate()?;

        Ok(Client {
            config: Arc::new(self.config),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(HttpTransport::new())),
            chunk_source: self
                .chunk_source
                .unwrap_or_else(|| Arc::new(SseChunkSource::new())),
        })
    }
}
