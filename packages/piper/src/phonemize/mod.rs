//! Text → sentences of phonemes.
//!
//! The backend is chosen once per voice from its declared phoneme type.

pub mod codepoints;
pub mod espeak;
pub mod openjtalk;

use tracing::warn;

use piper_voice_domain::{PhonemeType, PiperError, Result, SentencePhonemes};

pub use codepoints::CodepointPhonemizer;
pub use espeak::{
    AcousticPhonemizer, Clause, ClauseEngine, ClauseTerminator, EspeakEngine, PunctuationPolicy,
};
pub use openjtalk::{
    DevoicedVowels, LabelExtractor, LabelPolicy, MorphologicalPhonemizer, MultiCharPolicy,
    OpenJTalk,
};

use crate::config::PiperConfig;

#[derive(Debug)]
pub enum Phonemizer {
    Acoustic(AcousticPhonemizer),
    Morphological(MorphologicalPhonemizer),
    Codepoints(CodepointPhonemizer),
}

impl Phonemizer {
    /// Build the backend for a voice. When espeak-ng cannot be started the
    /// voice falls back to code points if `codepoint_fallback` is set.
    pub fn for_voice(
        phoneme_type: PhonemeType,
        espeak_voice: &str,
        config: &PiperConfig,
    ) -> Result<Self> {
        match phoneme_type {
            PhonemeType::Text => Ok(Phonemizer::Codepoints(CodepointPhonemizer)),
            PhonemeType::OpenJTalk => Ok(Phonemizer::Morphological(MorphologicalPhonemizer::new(
                config.openjtalk.clone(),
                config.label_policy(),
            ))),
            PhonemeType::Espeak => match EspeakEngine::initialize(&config.espeak) {
                Ok(engine) => Ok(Phonemizer::Acoustic(AcousticPhonemizer::new(
                    Box::new(engine),
                    espeak_voice,
                    config.punctuation,
                )?)),
                Err(PiperError::BackendUnavailable(reason)) if config.codepoint_fallback => {
                    warn!("espeak-ng unavailable ({reason}), using code points");
                    Ok(Phonemizer::Codepoints(CodepointPhonemizer))
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Ordered sentences of ordered phonemes. Empty input gives no sentences.
    pub fn phonemize(&mut self, text: &str) -> Result<Vec<SentencePhonemes>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Phonemizer::Acoustic(phonemizer) => phonemizer.phonemize(text),
            Phonemizer::Morphological(phonemizer) => Ok(phonemizer.phonemize(text)),
            Phonemizer::Codepoints(phonemizer) => Ok(phonemizer.phonemize(text)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Phonemizer::Acoustic(_) => "espeak",
            Phonemizer::Morphological(_) => "openjtalk",
            Phonemizer::Codepoints(_) => "codepoints",
        }
    }
}
