//! Canonical chat completion types.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::message::Role;

/// Call-site options for a chat completion.
///
/// `None` fields are omitted from the wire payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    /// Model override; falls back to the client default.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the token limit.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Canonical chat completion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Completion identifier.
    pub id: String,
    /// Object kind tag (e.g. `chat.completion`).
    pub object: String,
    /// Creation time, seconds since the Unix epoch.
    pub created: u64,
    /// Model that produced the completion.
    pub model: String,
    /// Generated choices.
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    /// Content of the first choice, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// One generated alternative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of this choice.
    pub index: u32,
    /// Generated message.
    pub message: ChoiceMessage,
    /// Why generation stopped, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Message carried by a [`Choice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Author role.
    pub role: Role,
    /// Text content.
    pub content: String,
}

/// Current time in seconds since the Unix epoch.
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let opts = CompletionOptions::new()
            .model("gpt-4o")
            .temperature(0.2)
            .max_tokens(64);
        assert_eq!(opts.model.as_deref(), Some("gpt-4o"));
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(64));
    }

    #[test]
    fn test_content_of_first_choice() {
        let response = CompletionResponse {
            id: "1".to_owned(),
            object: "chat.completion".to_owned(),
            created: 0,
            model: "m".to_owned(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Role::Assistant,
                    content: "hi".to_owned(),
                },
                finish_reason: None,
            }],
        };
        assert_eq!(response.content(), Some("hi"));
    }

    #[test]
    fn test_timestamp_is_after_2020() {
        assert!(unix_timestamp() > 1_577_836_800);
    }
}
