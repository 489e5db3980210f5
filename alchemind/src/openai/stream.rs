//! Server-sent events chunk source for streaming chat completions.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt, future};
use reqwest::Client;

use crate::stream::{ChunkRequest, ChunkSource, EventSender, SessionToken};
use crate::transport::{TransportError, WireBody, WireRequest};

use super::types::OpenAIStreamChunk;

/// One meaningful step of an SSE completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseStep {
    Content(String),
    Error(String),
    Done,
}

type StepStream = Pin<Box<dyn Stream<Item = SseStep> + Send>>;

/// Interpret the `data` field of one SSE event.
///
/// Returns `None` for events carrying nothing to deliver (role-only deltas,
/// empty content, unparseable chunks).
pub(crate) fn parse_sse_data(data: &str) -> Option<SseStep> {
    let data = data.trim();
    if data == "[DONE]" {
        return Some(SseStep::Done);
    }

    let chunk = match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, data = %data, "Failed to parse SSE chunk");
            return None;
        }
    };

    if let Some(error) = chunk.error {
        return Some(SseStep::Error(error.message));
    }

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map(SseStep::Content)
}

/// Chunk source reading `stream: true` chat completions over HTTP.
///
/// The first request for a session opens the SSE stream; later requests
/// pull from the same stream. The stream is dropped after any terminal
/// event, and as soon as its session stops listening.
#[derive(Clone, Default)]
pub struct SseChunkSource {
    client: Client,
    streams: Arc<Mutex<HashMap<SessionToken, OpenStream>>>,
}

/// A parked stream and the channel of the session reading it.
struct OpenStream {
    steps: StepStream,
    events: EventSender,
}

impl fmt::Debug for SseChunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseChunkSource")
            .field("open_streams", &self.open_streams())
            .finish_non_exhaustive()
    }
}

impl SseChunkSource {
    /// Create a source with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source around an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            streams: Arc::default(),
        }
    }

    /// Number of streams parked between two chunk requests.
    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn take(&self, token: SessionToken) -> Option<StepStream> {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token)
            .map(|open| open.steps)
    }

    /// Park `steps` for the next request of `token`, dropping streams whose
    /// sessions have ended.
    fn park(&self, token: SessionToken, steps: StepStream, events: EventSender) {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.retain(|_, open| !open.events.is_closed());
        streams.insert(token, OpenStream { steps, events });
    }

    async fn open(client: &Client, wire: &WireRequest) -> Result<StepStream, String> {
        let WireBody::Json(body) = &wire.body else {
            return Err("streaming request must have a JSON body".to_owned());
        };

        let send = client
            .post(&wire.url)
            .headers(wire.headers.clone())
            .json(body)
            .send();
        let response = match wire.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| TransportError::Timeout.to_string())?,
            None => send.await,
        }
        .map_err(|e| TransportError::from(e).to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {body}", status.as_u16()));
        }

        let steps = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => parse_sse_data(&event.data),
                    Err(e) => Some(SseStep::Error(e.to_string())),
                })
            });
        Ok(Box::pin(steps))
    }

    async fn next_step(&self, request: &ChunkRequest) -> Result<(SseStep, StepStream), String> {
        let mut steps = match self.take(request.token) {
            Some(steps) => steps,
            None => {
                tracing::debug!(token = %request.token, url = %request.wire.url, "Opening SSE stream");
                Self::open(&self.client, &request.wire).await?
            }
        };
        let step = steps.next().await.unwrap_or(SseStep::Done);
        Ok((step, steps))
    }
}

impl ChunkSource for SseChunkSource {
    fn request_next_chunk(&self, request: &ChunkRequest, events: EventSender) {
        let source = self.clone();
        let request = request.clone();

        tokio::spawn(async move {
            let token = request.token;
            match source.next_step(&request).await {
                Ok((SseStep::Content(content), steps)) => {
                    // Parked before sending: the session may ask for the next
                    // chunk as soon as this one lands.
                    source.park(token, steps, events.clone());
                    if !events.chunk(token, content) {
                        tracing::debug!(%token, "Session gone, closing SSE stream");
                        drop(source.take(token));
                    }
                }
                Ok((SseStep::Done, _)) => {
                    events.done(token);
                }
                Ok((SseStep::Error(message), _)) | Err(message) => {
                    tracing::warn!(%token, error = %message, "SSE stream failed");
                    events.error(token, message);
                }
            }
        });
    }
}
