//! # Piper Voice
//!
//! Speech synthesis for piper ONNX voices. Text is phonemized per sentence,
//! encoded against the voice's phoneme table, run through the waveform model
//! and assembled into 16-bit PCM with inter-sentence silence. Output is either
//! buffered into a single WAV or streamed sentence by sentence to a sink on a
//! consumer thread.
//!
//! ```no_run
//! use piper_voice::prelude::*;
//!
//! # fn main() -> piper_voice::Result<()> {
//! let mut voice = Voice::load("en_US-lessac-medium.onnx", None, &PiperConfig::default())?;
//! let mut out = std::fs::File::create("hello.wav")?;
//! let result = deliver_buffered(&mut voice, "Hello there.", &mut out)?;
//! println!("real-time factor: {:.3}", result.real_time_factor);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod delivery;
pub mod encoding;
pub mod inference;
pub mod phonemize;
pub mod synthesize;
pub mod voice;

pub use piper_voice_domain::{
    AudioFormat, MissingPhonemes, Phoneme, PhonemeId, PhonemeType, PiperError, Result,
    SentencePhonemes, SpeakerId, SynthesisConfig, SynthesisResult,
};

pub use audio::{AudioAssembler, float_to_pcm16, write_wav};
pub use config::{EspeakSettings, OpenJTalkSettings, PiperConfig};
pub use delivery::{
    AudioSink, LiveStats, LiveStream, RawSink, deliver_buffered, deliver_live, deliver_live_with,
};
pub use encoding::{PhonemeIdMap, SpecialTokenPolicy, SymbolEncoder};
#[cfg(feature = "onnx")]
pub use inference::OrtModel;
pub use inference::{InferenceInvoker, Inferred, ModelOutput, WaveformModel};
pub use phonemize::Phonemizer;
pub use voice::{Voice, VoiceConfig, default_config_path};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::{
        AudioSink, PiperConfig, PiperError, RawSink, Result, SynthesisConfig, SynthesisResult,
        Voice, VoiceConfig, deliver_buffered, deliver_live,
    };
}
