//! Unified error for the synthesis pipeline.
use thiserror::Error;

/// Top-level error covering voice loading, phonemization, inference and output.
#[derive(Debug, Error)]
pub enum PiperError {
    /// Voice or engine configuration could not be used.
    #[error("configuration: {0}")]
    Config(String),
    /// The rule-based engine does not know the requested voice.
    #[error("invalid voice: {0}")]
    InvalidVoice(String),
    /// A phonemization backend could not be started or invoked.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// Nothing to encode.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
    /// Phonemes absent from the voice table.
    #[error("{0} phoneme(s) missing from the voice table")]
    EncodingGap(usize),
    /// The waveform model failed or produced an unusable output.
    #[error("inference: {0}")]
    Inference(String),
    /// More samples than a RIFF size field can describe.
    #[error("audio too long for a WAV file: {0} samples")]
    AudioTooLong(usize),
    /// Reading or writing audio, config or temp files failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a voice config.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the piper crates.
pub type Result<T> = std::result::Result<T, PiperError>;
