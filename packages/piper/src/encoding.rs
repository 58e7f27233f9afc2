//! Phoneme → model id encoding.
//!
//! Every sequence is framed by BOS and EOS exactly once. When padding is interspersed a
//! PAD id follows BOS and every emitted id, so `n` ids encode to `2n + 3`
//! values; without padding they encode to `n + 2`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use piper_voice_domain::phoneme::{
    BOS, DEFAULT_BOS_ID, DEFAULT_EOS_ID, DEFAULT_PAD_ID, EOS, PAD,
};
use piper_voice_domain::{MissingPhonemes, Phoneme, PhonemeId, PiperError, Result};

/// Voice table from single-code-point phonemes to their ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<String, Vec<PhonemeId>>",
    into = "HashMap<String, Vec<PhonemeId>>"
)]
pub struct PhonemeIdMap(HashMap<Phoneme, Vec<PhonemeId>>);

impl PhonemeIdMap {
    pub fn new(entries: HashMap<Phoneme, Vec<PhonemeId>>) -> Self {
        Self(entries)
    }

    pub fn get(&self, phoneme: Phoneme) -> Option<&[PhonemeId]> {
        self.0.get(&phoneme).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phoneme, &[PhonemeId])> {
        self.0.iter().map(|(phoneme, ids)| (*phoneme, ids.as_slice()))
    }

    fn first_id(&self, phoneme: Phoneme) -> Option<PhonemeId> {
        self.0.get(&phoneme).and_then(|ids| ids.first().copied())
    }
}

impl TryFrom<HashMap<String, Vec<PhonemeId>>> for PhonemeIdMap {
    type Error = PiperError;

    fn try_from(raw: HashMap<String, Vec<PhonemeId>>) -> Result<Self> {
        let mut entries = HashMap::with_capacity(raw.len());
        for (key, ids) in raw {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(phoneme), None) => {
                    entries.insert(phoneme, ids);
                }
                _ => {
                    return Err(PiperError::Config(format!(
                        "phoneme_id_map key {key:?} is not a single code point"
                    )));
                }
            }
        }
        Ok(Self(entries))
    }
}

impl From<PhonemeIdMap> for HashMap<String, Vec<PhonemeId>> {
    fn from(map: PhonemeIdMap) -> Self {
        map.0
            .into_iter()
            .map(|(phoneme, ids)| (phoneme.to_string(), ids))
            .collect()
    }
}

/// Boundary markers, their ids, and whether PAD is interspersed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokenPolicy {
    pub pad: Phoneme,
    pub bos: Phoneme,
    pub eos: Phoneme,
    pub pad_id: PhonemeId,
    pub bos_id: PhonemeId,
    pub eos_id: PhonemeId,
    pub intersperse_pad: bool,
}

impl SpecialTokenPolicy {
    /// Resolve marker ids from the voice table, falling back to 0/1/2.
    pub fn from_table(table: &PhonemeIdMap, intersperse_pad: bool) -> Self {
        Self {
            pad: PAD,
            bos: BOS,
            eos: EOS,
            pad_id: table.first_id(PAD).unwrap_or(DEFAULT_PAD_ID),
            bos_id: table.first_id(BOS).unwrap_or(DEFAULT_BOS_ID),
            eos_id: table.first_id(EOS).unwrap_or(DEFAULT_EOS_ID),
            intersperse_pad,
        }
    }

    /// Encoded length for `emitted` ids.
    pub fn framed_len(&self, emitted: usize) -> usize {
        if self.intersperse_pad {
            2 * emitted + 3
        } else {
            emitted + 2
        }
    }
}

impl Default for SpecialTokenPolicy {
    fn default() -> Self {
        Self {
            pad: PAD,
            bos: BOS,
            eos: EOS,
            pad_id: DEFAULT_PAD_ID,
            bos_id: DEFAULT_BOS_ID,
            eos_id: DEFAULT_EOS_ID,
            intersperse_pad: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolEncoder {
    table: PhonemeIdMap,
    policy: SpecialTokenPolicy,
}

impl SymbolEncoder {
    pub fn new(table: PhonemeIdMap, policy: SpecialTokenPolicy) -> Self {
        Self { table, policy }
    }

    pub fn table(&self) -> &PhonemeIdMap {
        &self.table
    }

    pub fn policy(&self) -> &SpecialTokenPolicy {
        &self.policy
    }

    /// Encode one sentence. Phonemes absent from the table are counted in
    /// `missing` and contribute no ids. A BOS marker already leading the
    /// sentence, or an EOS marker already ending it, is taken as the frame
    /// rather than encoded a second time.
    pub fn encode(
        &self,
        phonemes: &[Phoneme],
        missing: &mut MissingPhonemes,
    ) -> Result<Vec<PhonemeId>> {
        if phonemes.is_empty() {
            return Err(PiperError::EmptyInput("no phonemes to encode"));
        }

        let policy = &self.policy;
        let inner = phonemes.strip_prefix(&[policy.bos]).unwrap_or(phonemes);
        let inner = inner.strip_suffix(&[policy.eos]).unwrap_or(inner);
        let mut ids = Vec::with_capacity(policy.framed_len(inner.len()));

        ids.push(policy.bos_id);
        if policy.intersperse_pad {
            ids.push(policy.pad_id);
        }

        for &phoneme in inner {
            let Some(group) = self.table.get(phoneme) else {
                missing.record(phoneme);
                continue;
            };
            for &id in group {
                ids.push(id);
                if policy.intersperse_pad {
                    ids.push(policy.pad_id);
                }
            }
        }

        ids.push(policy.eos_id);
        Ok(ids)
    }
}
