//! Phoneme symbols and the numeric ids a voice assigns to them.

/// One phoneme: an IPA symbol, a boundary marker, or a private-use code point
/// standing in for a multi-character unit.
pub type Phoneme = char;

/// Model input id. A single phoneme may map to several.
pub type PhonemeId = i64;

/// Speaker index for multi-speaker voices.
pub type SpeakerId = i64;

/// Ordered phonemes of one sentence.
pub type SentencePhonemes = Vec<Phoneme>;

/// Sentence start marker.
pub const BOS: Phoneme = '^';
/// Sentence end marker.
pub const EOS: Phoneme = '$';
/// Padding / pause marker.
pub const PAD: Phoneme = '_';

/// Id fallbacks when the voice table has no entry for a marker.
pub const DEFAULT_PAD_ID: PhonemeId = 0;
pub const DEFAULT_BOS_ID: PhonemeId = 1;
pub const DEFAULT_EOS_ID: PhonemeId = 2;
