//! Raw code points as phonemes, for voices trained on text.

use piper_voice_domain::SentencePhonemes;

#[derive(Debug, Clone, Copy, Default)]
pub struct CodepointPhonemizer;

impl CodepointPhonemizer {
    /// Every code point in order, as a single sentence.
    pub fn phonemize(&self, text: &str) -> Vec<SentencePhonemes> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![text.chars().collect()]
    }
}
