//! # Piper Voice Domain
//!
//! Shared domain objects for the piper synthesis pipeline: phoneme and id
//! types, synthesis controls and telemetry, the PCM layout, and the error
//! taxonomy used by every crate in the workspace.

pub mod audio_format;
pub mod missing_phonemes;
pub mod phoneme;
pub mod phoneme_type;
pub mod synthesis_config;
pub mod synthesis_result;
pub mod voice_error;

pub use audio_format::AudioFormat;
pub use missing_phonemes::MissingPhonemes;
pub use phoneme::{Phoneme, PhonemeId, SentencePhonemes, SpeakerId};
pub use phoneme_type::PhonemeType;
pub use synthesis_config::SynthesisConfig;
pub use synthesis_result::SynthesisResult;
pub use voice_error::{PiperError, Result};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::{
        AudioFormat, MissingPhonemes, Phoneme, PhonemeId, PhonemeType, PiperError, Result,
        SentencePhonemes, SpeakerId, SynthesisConfig, SynthesisResult,
    };
}
