//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use alchemind::prelude::*;
//! ```

pub use crate::audio::{SpeechOptions, TranscriptionOptions};
pub use crate::chat::{Choice, ChoiceMessage, CompletionOptions, CompletionResponse};
pub use crate::error::{Error, Result, UpstreamError};
pub use crate::message::{Message, Role};
pub use crate::openai::{Client, ClientBuilder, ClientConfig, SseChunkSource};
pub use crate::stream::{
    ChunkRequest, ChunkSource, EventSender, SessionToken, StreamDelta, StreamHandle, StreamSink,
};
pub use crate::transport::{
    BridgeOptions, BridgeTransport, HttpTransport, NativeBridge, RawResponse, Transport,
    TransportError, WireRequest,
};
