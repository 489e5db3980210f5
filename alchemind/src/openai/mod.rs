//! OpenAI provider adapter.
//!
//! Supports:
//! - Chat completions (single-shot and streaming)
//! - Speech-to-text (transcription)
//! - Text-to-speech
//!
//! Building ([`request`]) and normalizing ([`response`]) are pure and never
//! touch the network; the [`Client`] ties them to a transport.

mod client;
mod config;
pub mod request;
pub mod response;
mod stream;
mod types;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use stream::SseChunkSource;
