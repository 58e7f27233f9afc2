use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use piper_voice_domain::Result;

use crate::phonemize::{DevoicedVowels, LabelPolicy, MultiCharPolicy, PunctuationPolicy};

// ------------ espeak-ng -------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EspeakSettings {
    /// espeak-ng executable; `espeak-ng` on `PATH` when unset.
    pub program: Option<PathBuf>,
    /// espeak-ng data directory; `ESPEAK_DATA_PATH` when unset.
    pub data_path: Option<PathBuf>,
}

// ------------ OpenJTalk -------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenJTalkSettings {
    /// `open_jtalk` executable; `OPENJTALK_BIN`, install locations, then `PATH`.
    pub binary: Option<PathBuf>,
    /// Dictionary directory; `OPENJTALK_DICTIONARY_DIR` when unset.
    pub dictionary: Option<PathBuf>,
    /// HTS voice passed with `-m`; `OPENJTALK_VOICE` when unset.
    pub voice: Option<PathBuf>,
    /// Where per-request input, trace and audio files are created; the
    /// system temp directory when unset.
    pub temp_dir: Option<PathBuf>,
}

// ------------ Engine ----------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiperConfig {
    pub espeak: EspeakSettings,
    pub openjtalk: OpenJTalkSettings,
    pub punctuation: PunctuationPolicy,
    pub devoiced_vowels: DevoicedVowels,
    pub multi_char: MultiCharPolicy,
    /// Phonemize espeak voices as raw code points when espeak-ng is missing.
    pub codepoint_fallback: bool,
    /// Register the CUDA execution provider (needs the `cuda` feature).
    pub use_cuda: bool,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            espeak: EspeakSettings::default(),
            openjtalk: OpenJTalkSettings::default(),
            punctuation: PunctuationPolicy::default(),
            devoiced_vowels: DevoicedVowels::default(),
            multi_char: MultiCharPolicy::default(),
            codepoint_fallback: true,
            use_cuda: false,
        }
    }
}

impl PiperConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let txt = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&txt)?)
    }

    pub fn label_policy(&self) -> LabelPolicy {
        LabelPolicy {
            multi_char: self.multi_char,
            devoiced_vowels: self.devoiced_vowels,
        }
    }
}
