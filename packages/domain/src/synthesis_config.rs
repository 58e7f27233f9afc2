//! Per-voice synthesis controls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::audio_format::AudioFormat;
use crate::phoneme::{Phoneme, SpeakerId};

pub const DEFAULT_NOISE_SCALE: f32 = 0.667;
pub const DEFAULT_LENGTH_SCALE: f32 = 1.0;
pub const DEFAULT_NOISE_W: f32 = 0.8;
pub const DEFAULT_SENTENCE_SILENCE_SECONDS: f32 = 0.2;

/// Owned by a voice and changed only between synthesis calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
    pub format: AudioFormat,
    /// `None` means the model is run without a speaker input.
    pub speaker_id: Option<SpeakerId>,
    pub sentence_silence_seconds: f32,
    /// Extra silence after specific phonemes; splits sentences into phrases.
    pub phoneme_silence_seconds: Option<HashMap<Phoneme, f32>>,
}

impl SynthesisConfig {
    /// Model `scales` input: noise, length, noise width.
    pub fn scales(&self) -> [f32; 3] {
        [self.noise_scale, self.length_scale, self.noise_w]
    }

    /// Add silence overrides, keeping any the voice already defines.
    pub fn merge_phoneme_silence(&mut self, overrides: HashMap<Phoneme, f32>) {
        match &mut self.phoneme_silence_seconds {
            None => self.phoneme_silence_seconds = Some(overrides),
            Some(existing) => {
                for (phoneme, seconds) in overrides {
                    existing.entry(phoneme).or_insert(seconds);
                }
            }
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            noise_scale: DEFAULT_NOISE_SCALE,
            length_scale: DEFAULT_LENGTH_SCALE,
            noise_w: DEFAULT_NOISE_W,
            format: AudioFormat::default(),
            speaker_id: None,
            sentence_silence_seconds: DEFAULT_SENTENCE_SILENCE_SECONDS,
            phoneme_silence_seconds: None,
        }
    }
}
