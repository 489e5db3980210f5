//! Audio operation options: speech-to-text and text-to-speech.

/// Options for audio transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOptions {
    /// Model identifier.
    pub model: String,
    /// ISO-639-1 language of the audio.
    pub language: Option<String>,
    /// Text to guide the model's style.
    pub prompt: Option<String>,
    /// Output format; the server default used here is `text`.
    pub response_format: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl TranscriptionOptions {
    /// Default transcription model.
    pub const DEFAULT_MODEL: &'static str = "whisper-1";
    /// Response format sent when none is given.
    pub const DEFAULT_RESPONSE_FORMAT: &'static str = "text";

    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the prompt.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the response format (`json`, `text`, `srt`, `verbose_json`, `vtt`).
    #[must_use]
    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_owned(),
            language: None,
            prompt: None,
            response_format: None,
            temperature: None,
        }
    }
}

/// Options for speech synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    /// Model identifier.
    pub model: String,
    /// Voice name.
    pub voice: String,
    /// Audio container (`mp3`, `opus`, `aac`, `flac`, `wav`, `pcm`).
    pub response_format: String,
    /// Playback speed, 0.25 to 4.0.
    pub speed: Option<f64>,
}

impl SpeechOptions {
    /// Default speech model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini-tts";
    /// Default voice.
    pub const DEFAULT_VOICE: &'static str = "alloy";
    /// Default audio format.
    pub const DEFAULT_RESPONSE_FORMAT: &'static str = "mp3";

    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the voice.
    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Sets the audio format.
    #[must_use]
    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = format.into();
        self
    }

    /// Sets the speed.
    #[must_use]
    pub const fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_owned(),
            voice: Self::DEFAULT_VOICE.to_owned(),
            response_format: Self::DEFAULT_RESPONSE_FORMAT.to_owned(),
            speed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_defaults() {
        let opts = TranscriptionOptions::new();
        assert_eq!(opts.model, "whisper-1");
        assert!(opts.language.is_none());
        assert!(opts.response_format.is_none());
    }

    #[test]
    fn test_speech_defaults() {
        let opts = SpeechOptions::default();
        assert_eq!(opts.model, "gpt-4o-mini-tts");
        assert_eq!(opts.voice, "alloy");
        assert_eq!(opts.response_format, "mp3");
        assert!(opts.speed.is_none());
    }

    #[test]
    fn test_speech_builder_overrides() {
        let opts = SpeechOptions::new().voice("nova").response_format("opus").speed(1.25);
        assert_eq!(opts.voice, "nova");
        assert_eq!(opts.response_format, "opus");
        assert_eq!(opts.speed, Some(1.25));
    }
}
