//! Text → PCM, one sentence at a time.

use tracing::{debug, warn};

use piper_voice_domain::{MissingPhonemes, Phoneme, Result, SynthesisResult};

use crate::audio::AudioAssembler;
use crate::voice::Voice;

/// Log the unmapped phonemes of one call, once.
pub fn report_missing(missing: &MissingPhonemes) {
    let Some(gap) = missing.as_error() else {
        return;
    };
    warn!("{gap}");
    for (phoneme, count) in missing.iter() {
        warn!(
            "Missing \"{}\" (\\u{{{:04X}}}): {} time(s)",
            phoneme, phoneme as u32, count
        );
    }
}

/// Split a sentence after every phoneme that carries extra silence.
/// Each phrase is paired with the silence that follows it.
pub fn split_phrases(
    phonemes: &[Phoneme],
    silence: &std::collections::HashMap<Phoneme, f32>,
) -> Vec<(Vec<Phoneme>, f32)> {
    let mut phrases = Vec::new();
    let mut current = Vec::new();
    for &phoneme in phonemes {
        current.push(phoneme);
        if let Some(&seconds) = silence.get(&phoneme) {
            phrases.push((std::mem::take(&mut current), seconds));
        }
    }
    if !current.is_empty() {
        phrases.push((current, 0.0));
    }
    phrases
}

impl Voice {
    /// Synthesize `text`, handing each sentence's PCM (trailing silence
    /// included) to `on_sentence` in input order. Unmapped phonemes are
    /// tallied and reported once at the end; an inference failure aborts
    /// the call.
    pub fn synthesize_sentences<F>(&mut self, text: &str, mut on_sentence: F) -> Result<SynthesisResult>
    where
        F: FnMut(Vec<i16>) -> Result<()>,
    {
        let sentences = self.phonemizer.phonemize(text)?;
        let synthesis = self.synthesis.clone();
        let mut assembler = AudioAssembler::new(synthesis.format);
        let mut missing = MissingPhonemes::new();

        for (index, sentence) in sentences.iter().enumerate() {
            let phonemes = self.config.phoneme_map.apply(sentence);
            if phonemes.is_empty() {
                continue;
            }
            debug!(
                sentence = index,
                phonemes = %phonemes.iter().collect::<String>(),
                "Converting phonemes to ids"
            );

            let phrases = match &synthesis.phoneme_silence_seconds {
                Some(silence) => split_phrases(&phonemes, silence),
                None => vec![(phonemes, 0.0)],
            };

            let mut pcm = Vec::new();
            for (phrase, phrase_silence) in phrases {
                let ids = self.encoder.encode(&phrase, &mut missing)?;
                debug!(sentence = index, ids = ?ids, "Encoded phrase");

                let inferred = self
                    .invoker
                    .infer(&ids, synthesis.scales(), synthesis.speaker_id)?;
                assembler.append_waveform(&mut pcm, &inferred.samples, inferred.seconds);
                assembler.append_silence(&mut pcm, phrase_silence);
            }
            assembler.append_silence(&mut pcm, synthesis.sentence_silence_seconds);

            on_sentence(pcm)?;
        }

        report_missing(&missing);

        let result = assembler.finish();
        debug!(
            infer_seconds = result.infer_seconds,
            audio_seconds = result.audio_seconds,
            real_time_factor = result.real_time_factor,
            "Synthesized text"
        );
        Ok(result)
    }

    /// Synthesize `text`, appending all PCM to `audio`.
    pub fn text_to_audio(&mut self, text: &str, audio: &mut Vec<i16>) -> Result<SynthesisResult> {
        self.synthesize_sentences(text, |pcm| {
            audio.extend_from_slice(&pcm);
            Ok(())
        })
    }
}
