//! Streaming delivery.
//!
//! A streaming completion runs as a background session (see [`session`]).
//! The session repeatedly asks a [`ChunkSource`] for the next chunk; the
//! source answers asynchronously by sending [`StreamEvent`]s tagged with the
//! session's [`SessionToken`]. Each chunk is handed to the caller's
//! [`StreamSink`] before the next one is requested.
//!
//! The sink runs on the session's tokio task, not on the caller's stack.
//! Errors and panics raised there surface through [`StreamHandle::finish`].

pub mod session;

pub use self::session::{STREAM_IDLE_TIMEOUT, SessionState, StreamingSession};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::chat::CompletionResponse;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::transport::WireRequest;

/// Correlation token of a streaming session.
///
/// Minted fresh for every session and only ever compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Mint a new random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// One incremental unit delivered to the sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Content fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StreamDelta {
    /// Creates a content delta.
    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }
}

/// Payload of a [`StreamEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Next piece of content.
    Chunk(String),
    /// The source failed; terminal.
    Error(String),
    /// The stream finished; terminal.
    Done,
}

/// A tagged event produced by a chunk source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Session the event belongs to.
    pub token: SessionToken,
    /// Event payload.
    pub kind: EventKind,
}

impl StreamEvent {
    /// Creates a chunk event.
    #[must_use]
    pub fn chunk(token: SessionToken, content: impl Into<String>) -> Self {
        Self {
            token,
            kind: EventKind::Chunk(content.into()),
        }
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(token: SessionToken, message: impl Into<String>) -> Self {
        Self {
            token,
            kind: EventKind::Error(message.into()),
        }
    }

    /// Creates a done event.
    #[must_use]
    pub const fn done(token: SessionToken) -> Self {
        Self {
            token,
            kind: EventKind::Done,
        }
    }
}

/// Sending half of a session's event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl EventSender {
    /// Creates a connected sender/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. Returns `false` when the session is gone.
    pub fn send(&self, event: StreamEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Deliver a chunk event.
    pub fn chunk(&self, token: SessionToken, content: impl Into<String>) -> bool {
        self.send(StreamEvent::chunk(token, content))
    }

    /// Deliver an error event.
    pub fn error(&self, token: SessionToken, message: impl Into<String>) -> bool {
        self.send(StreamEvent::error(token, message))
    }

    /// Deliver a done event.
    pub fn done(&self, token: SessionToken) -> bool {
        self.send(StreamEvent::done(token))
    }

    /// Whether the receiving session has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Caller-supplied consumer of stream deltas.
///
/// Invoked once per delta, in arrival order, from the session task. The
/// next chunk is not requested until `on_delta` returns.
pub trait StreamSink: Send + 'static {
    /// Receive one delta.
    fn on_delta(&mut self, delta: &StreamDelta);
}

impl<F> StreamSink for F
where
    F: FnMut(&StreamDelta) + Send + 'static,
{
    fn on_delta(&mut self, delta: &StreamDelta) {
        self(delta);
    }
}

/// What a chunk source needs to produce the next chunk of a session.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    /// Session token to tag events with.
    pub token: SessionToken,
    /// Resolved model.
    pub model: String,
    /// Conversation so far.
    pub messages: Arc<[Message]>,
    /// Equivalent wire request (`stream: true`), for HTTP-backed sources.
    pub wire: WireRequest,
}

/// Produces tagged stream events on request.
///
/// `request_next_chunk` is fire-and-forget: it must return promptly and
/// deliver exactly one event (chunk, error or done) for `request.token`
/// through `events` later.
pub trait ChunkSource: Send + Sync + fmt::Debug {
    /// Ask for the next chunk of the session identified by `request.token`.
    fn request_next_chunk(&self, request: &ChunkRequest, events: EventSender);
}

/// Acknowledgement returned when a streaming session starts.
#[derive(Debug)]
pub struct StreamHandle {
    token: SessionToken,
    task: JoinHandle<Result<CompletionResponse>>,
}

impl StreamHandle {
    pub(crate) const fn new(
        token: SessionToken,
        task: JoinHandle<Result<CompletionResponse>>,
    ) -> Self {
        Self { token, task }
    }

    /// Token of the running session.
    #[must_use]
    pub const fn token(&self) -> SessionToken {
        self.token
    }

    /// Whether the session has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end and return its final result.
    pub async fn finish(self) -> Result<CompletionResponse> {
        self.task
            .await
            .map_err(|e| Error::StreamAborted(e.to_string()))?
    }
}
