//! Streaming session state machine.
//!
//! ```text
//! Idle -> Requesting -> Delivering -> (Completed | Failed | TimedOut)
//!              ^             |
//!              +-------------+
//! ```
//!
//! The session owns a single accumulator string. A chunk is delivered to the
//! sink and appended before the next chunk is requested, so fetches are
//! strictly sequential and backpressure comes from the sink itself.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::chat::{Choice, ChoiceMessage, CompletionResponse, unix_timestamp};
use crate::error::{Error, Result};
use crate::message::Role;

use super::{
    ChunkRequest, ChunkSource, EventKind, EventSender, SessionToken, StreamDelta, StreamEvent,
    StreamHandle, StreamSink,
};

/// Longest silence tolerated between two events of a session.
pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle state of a [`StreamingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing requested yet.
    Idle,
    /// Waiting for the source to answer a chunk request.
    Requesting,
    /// Handing a chunk to the sink.
    Delivering,
    /// The source signalled the end of the stream.
    Completed,
    /// The source reported an error.
    Failed,
    /// No event arrived within the idle timeout.
    TimedOut,
}

impl SessionState {
    /// Whether no further transitions can happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

/// A single streaming completion.
pub struct StreamingSession<S> {
    request: ChunkRequest,
    source: Arc<dyn ChunkSource>,
    sink: S,
    events: EventSender,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    idle_timeout: Duration,
    state: SessionState,
    accumulated: String,
}

impl<S> fmt::Debug for StreamingSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSession")
            .field("token", &self.request.token)
            .field("model", &self.request.model)
            .field("state", &self.state)
            .field("accumulated_len", &self.accumulated.len())
            .finish_non_exhaustive()
    }
}

impl<S: StreamSink> StreamingSession<S> {
    /// Create a session in the `Idle` state.
    #[must_use]
    pub fn new(request: ChunkRequest, source: Arc<dyn ChunkSource>, sink: S) -> Self {
        let (events, rx) = EventSender::channel();
        Self {
            request,
            source,
            sink,
            events,
            rx,
            idle_timeout: STREAM_IDLE_TIMEOUT,
            state: SessionState::Idle,
            accumulated: String::new(),
        }
    }

    /// Override the idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Correlation token of this session.
    #[must_use]
    pub const fn token(&self) -> SessionToken {
        self.request.token
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session on a background tokio task.
    pub fn spawn(self) -> StreamHandle {
        let token = self.token();
        StreamHandle::new(token, tokio::spawn(self.run()))
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(
            token = %self.request.token,
            from = ?self.state,
            to = ?next,
            "Streaming session transition"
        );
        self.state = next;
    }

    fn request_next(&mut self) {
        self.transition(SessionState::Requesting);
        self.source
            .request_next_chunk(&self.request, self.events.clone());
    }

    fn deliver(&mut self, content: String) {
        self.transition(SessionState::Delivering);
        let delta = StreamDelta::content(content);
        self.sink.on_delta(&delta);
        if let Some(content) = delta.content {
            self.accumulated.push_str(&content);
        }
    }

    fn into_response(self) -> CompletionResponse {
        CompletionResponse {
            id: format!("chatcmpl-{}", self.request.token),
            object: "chat.completion".to_owned(),
            created: unix_timestamp(),
            model: self.request.model,
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Role::Assistant,
                    content: self.accumulated,
                },
                finish_reason: Some("stop".to_owned()),
            }],
        }
    }

    /// Drive the session to a terminal state.
    pub async fn run(mut self) -> Result<CompletionResponse> {
        let token = self.request.token;
        tracing::debug!(%token, model = %self.request.model, "Streaming session started");

        let mut deadline = Instant::now() + self.idle_timeout;
        self.request_next();

        loop {
            let event = match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => {
                    self.transition(SessionState::TimedOut);
                    tracing::warn!(%token, "Streaming session timed out");
                    return Err(Error::StreamTimeout);
                }
                Ok(None) => {
                    self.transition(SessionState::Failed);
                    return Err(Error::stream("event channel closed"));
                }
                Ok(Some(event)) => event,
            };

            if event.token != token {
                tracing::debug!(%token, foreign = %event.token, "Ignoring event for another session");
                continue;
            }

            deadline = Instant::now() + self.idle_timeout;

            match event.kind {
                EventKind::Chunk(content) => {
                    self.deliver(content);
                    self.request_next();
                }
                EventKind::Error(message) => {
                    self.transition(SessionState::Failed);
                    tracing::warn!(%token, error = %message, "Streaming session failed");
                    return Err(Error::stream(message));
                }
                EventKind::Done => {
                    self.transition(SessionState::Completed);
                    tracing::debug!(
                        %token,
                        len = self.accumulated.len(),
                        "Streaming session completed"
                    );
                    return Ok(self.into_response());
                }
            }
        }
    }
}
