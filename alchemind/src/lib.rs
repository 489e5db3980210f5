//! Alchemind - an OpenAI provider adapter
//!
//! This crate turns canonical inputs (role-tagged messages, audio bytes,
//! text) into OpenAI API requests and turns the answers back into canonical
//! results. It covers chat completions, streaming completions with
//! incremental delivery, audio transcription and text-to-speech.
//!
//! Requests go through a pluggable [`Transport`](transport::Transport):
//! direct HTTP by default, or an in-process
//! [`NativeBridge`](transport::NativeBridge).

pub mod audio;
pub mod chat;
pub mod error;
pub mod message;
pub mod openai;
pub mod prelude;
pub mod stream;
pub mod transport;

pub use error::{Error, Result, UpstreamError};
