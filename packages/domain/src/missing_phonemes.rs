//! Tally of phonemes the voice table could not encode.

use std::collections::BTreeMap;

use crate::phoneme::Phoneme;
use crate::voice_error::PiperError;

/// Counts per unmapped phoneme across one synthesis call. Never an error by itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingPhonemes {
    counts: BTreeMap<Phoneme, usize>,
}

impl MissingPhonemes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phoneme: Phoneme) {
        *self.counts.entry(phoneme).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct phonemes missing.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Total occurrences dropped.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, phoneme: Phoneme) -> usize {
        self.counts.get(&phoneme).copied().unwrap_or(0)
    }

    pub fn contains(&self, phoneme: Phoneme) -> bool {
        self.counts.contains_key(&phoneme)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phoneme, usize)> + '_ {
        self.counts.iter().map(|(phoneme, count)| (*phoneme, *count))
    }

    /// The gap as a reportable error, `None` when nothing is missing.
    pub fn as_error(&self) -> Option<PiperError> {
        (!self.is_empty()).then(|| PiperError::EncodingGap(self.distinct()))
    }
}
