//! Which phonemization backend a voice was trained against.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PhonemeType {
    /// Rule-based IPA phonemes (espeak-ng).
    #[default]
    Espeak,
    /// Raw Unicode code points of the input.
    Text,
    /// Morphological analysis through OpenJTalk full-context labels.
    OpenJTalk,
}

impl PhonemeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhonemeType::Espeak => "espeak",
            PhonemeType::Text => "text",
            PhonemeType::OpenJTalk => "openjtalk",
        }
    }

    /// Voices trained on OpenJTalk labels were trained without PAD between ids.
    pub fn intersperse_pad(&self) -> bool {
        !matches!(self, PhonemeType::OpenJTalk)
    }
}

impl From<&str> for PhonemeType {
    /// Accepts `espeak`, `text`, `openjtalk` or `pyopenjtalk`, optionally
    /// prefixed with `PhonemeType.`, in any case. Anything else is espeak.
    fn from(value: &str) -> Self {
        let value = value.trim();
        let value = value.strip_prefix("PhonemeType.").unwrap_or(value);
        match value.to_ascii_lowercase().as_str() {
            "text" => PhonemeType::Text,
            "openjtalk" | "pyopenjtalk" => PhonemeType::OpenJTalk,
            _ => PhonemeType::Espeak,
        }
    }
}

impl From<String> for PhonemeType {
    fn from(value: String) -> Self {
        PhonemeType::from(value.as_str())
    }
}

impl From<PhonemeType> for String {
    fn from(value: PhonemeType) -> Self {
        value.as_str().to_string()
    }
}
