//! Voice loading: the `.onnx.json` config, the phoneme table and the model.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use piper_voice_domain::synthesis_config::{
    DEFAULT_LENGTH_SCALE, DEFAULT_NOISE_SCALE, DEFAULT_NOISE_W,
};
use piper_voice_domain::{
    AudioFormat, Phoneme, PhonemeType, PiperError, Result, SpeakerId, SynthesisConfig,
};

use crate::config::PiperConfig;
use crate::encoding::{PhonemeIdMap, SpecialTokenPolicy, SymbolEncoder};
use crate::inference::{InferenceInvoker, WaveformModel};
use crate::phonemize::Phonemizer;

// ------------ Sections --------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    pub sample_rate: u32,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EspeakSection {
    pub voice: String,
}

impl Default for EspeakSection {
    fn default() -> Self {
        Self {
            voice: "en-us".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSection {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            noise_scale: DEFAULT_NOISE_SCALE,
            length_scale: DEFAULT_LENGTH_SCALE,
            noise_w: DEFAULT_NOISE_W,
        }
    }
}

/// Phoneme substitutions applied after phonemization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<String, Vec<String>>",
    into = "HashMap<String, Vec<String>>"
)]
pub struct PhonemeMap(HashMap<Phoneme, Vec<Phoneme>>);

impl PhonemeMap {
    pub fn new(entries: HashMap<Phoneme, Vec<Phoneme>>) -> Self {
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every mapped phoneme with its substitutes.
    pub fn apply(&self, phonemes: &[Phoneme]) -> Vec<Phoneme> {
        if self.0.is_empty() {
            return phonemes.to_vec();
        }
        let mut mapped = Vec::with_capacity(phonemes.len());
        for phoneme in phonemes {
            match self.0.get(phoneme) {
                Some(substitutes) => mapped.extend_from_slice(substitutes),
                None => mapped.push(*phoneme),
            }
        }
        mapped
    }
}

impl TryFrom<HashMap<String, Vec<String>>> for PhonemeMap {
    type Error = PiperError;

    fn try_from(raw: HashMap<String, Vec<String>>) -> Result<Self> {
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, substitutes) in raw {
            let mut chars = key.chars();
            let (Some(phoneme), None) = (chars.next(), chars.next()) else {
                return Err(PiperError::Config(format!(
                    "phoneme_map key {key:?} is not a single code point"
                )));
            };
            entries.insert(phoneme, substitutes.iter().flat_map(|s| s.chars()).collect());
        }
        Ok(Self(entries))
    }
}

impl From<PhonemeMap> for HashMap<String, Vec<String>> {
    fn from(map: PhonemeMap) -> Self {
        map.0
            .into_iter()
            .map(|(phoneme, substitutes)| {
                (
                    phoneme.to_string(),
                    substitutes.into_iter().map(String::from).collect(),
                )
            })
            .collect()
    }
}

fn one() -> u32 {
    1
}

/// Contents of `<model>.onnx.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub audio: AudioSection,
    #[serde(default)]
    pub espeak: EspeakSection,
    #[serde(default)]
    pub phoneme_type: PhonemeType,
    #[serde(default)]
    pub phoneme_map: PhonemeMap,
    pub phoneme_id_map: PhonemeIdMap,
    #[serde(default = "one")]
    pub num_speakers: u32,
    #[serde(default)]
    pub speaker_id_map: HashMap<String, SpeakerId>,
    #[serde(default)]
    pub inference: InferenceSection,
    /// Size of the model's symbol embedding; every table id must be below it.
    #[serde(default)]
    pub num_symbols: Option<usize>,
}

impl VoiceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path).map_err(|e| {
            PiperError::Config(format!("cannot read voice config {}: {e}", path.display()))
        })?;
        Self::from_json(&txt)
    }

    pub fn from_json(txt: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(txt)
            .map_err(|e| PiperError::Config(format!("voice config: {e}")))?;
        config.check_symbols()?;
        Ok(config)
    }

    /// Reject table ids the model cannot embed.
    fn check_symbols(&self) -> Result<()> {
        let Some(num_symbols) = self.num_symbols else {
            return Ok(());
        };
        for (phoneme, ids) in self.phoneme_id_map.iter() {
            if let Some(id) = ids
                .iter()
                .find(|&&id| !usize::try_from(id).is_ok_and(|id| id < num_symbols))
            {
                return Err(PiperError::Config(format!(
                    "phoneme {phoneme:?} has id {id}, outside num_symbols {num_symbols}"
                )));
            }
        }
        Ok(())
    }

    /// Synthesis defaults for this voice. Multi-speaker voices start on speaker 0.
    pub fn synthesis_config(&self) -> SynthesisConfig {
        SynthesisConfig {
            noise_scale: self.inference.noise_scale,
            length_scale: self.inference.length_scale,
            noise_w: self.inference.noise_w,
            format: AudioFormat::pcm16(self.audio.sample_rate, 1),
            speaker_id: (self.num_speakers > 1).then_some(0),
            ..SynthesisConfig::default()
        }
    }
}

/// Default config location for a model: `<model>.json`.
pub fn default_config_path(model_path: &Path) -> PathBuf {
    let mut path = model_path.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

/// A loaded voice. Owns its model exclusively; synthesis takes `&mut self`.
#[derive(Debug)]
pub struct Voice {
    pub(crate) config: VoiceConfig,
    pub(crate) synthesis: SynthesisConfig,
    pub(crate) phonemizer: Phonemizer,
    pub(crate) encoder: SymbolEncoder,
    pub(crate) invoker: InferenceInvoker,
}

impl Voice {
    /// Assemble a voice from a parsed config, a phonemizer and a model.
    pub fn new(
        config: VoiceConfig,
        phonemizer: Phonemizer,
        model: Box<dyn WaveformModel>,
    ) -> Self {
        let policy = SpecialTokenPolicy::from_table(
            &config.phoneme_id_map,
            config.phoneme_type.intersperse_pad(),
        );
        let encoder = SymbolEncoder::new(config.phoneme_id_map.clone(), policy);
        let synthesis = config.synthesis_config();

        debug!(
            phonemes = config.phoneme_id_map.len(),
            phoneme_type = config.phoneme_type.as_str(),
            speakers = config.num_speakers,
            intersperse_pad = policy.intersperse_pad,
            "Voice assembled"
        );

        Self {
            config,
            synthesis,
            phonemizer,
            encoder,
            invoker: InferenceInvoker::new(model),
        }
    }

    /// Parse the config and pick the phonemizer its phoneme type declares.
    pub fn with_model(
        config: VoiceConfig,
        model: Box<dyn WaveformModel>,
        engine: &PiperConfig,
    ) -> Result<Self> {
        let phonemizer =
            Phonemizer::for_voice(config.phoneme_type, &config.espeak.voice, engine)?;
        Ok(Self::new(config, phonemizer, model))
    }

    /// Load `model_path` and its config (`<model>.json` unless given).
    #[cfg(feature = "onnx")]
    pub fn load(
        model_path: impl AsRef<Path>,
        config_path: Option<&Path>,
        engine: &PiperConfig,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_config_path(model_path));

        let config = VoiceConfig::load(&config_path)?;
        let model = crate::inference::OrtModel::load(model_path, engine.use_cuda)?;
        let voice = Self::with_model(config, Box::new(model), engine)?;

        tracing::info!(
            model = %model_path.display(),
            config = %config_path.display(),
            phonemizer = voice.phonemizer.kind(),
            sample_rate = voice.synthesis.format.sample_rate,
            "Loaded voice"
        );
        Ok(voice)
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn synthesis_config(&self) -> &SynthesisConfig {
        &self.synthesis
    }

    /// Mutable between synthesis calls only; `&mut self` enforces it.
    pub fn synthesis_config_mut(&mut self) -> &mut SynthesisConfig {
        &mut self.synthesis
    }

    pub fn encoder(&self) -> &SymbolEncoder {
        &self.encoder
    }

    pub fn format(&self) -> AudioFormat {
        self.synthesis.format
    }

    /// Speaker id for a name in `speaker_id_map`.
    pub fn speaker_id(&self, name: &str) -> Option<SpeakerId> {
        self.config.speaker_id_map.get(name).copied()
    }

    /// Select a speaker. Ignored for single-speaker voices.
    pub fn set_speaker(&mut self, speaker: Option<SpeakerId>) {
        if self.config.num_speakers > 1 {
            self.synthesis.speaker_id = speaker.or(Some(0));
        }
    }
}
