//! End-to-end synthesis with a scripted clause engine and a stub model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use piper_voice::phonemize::espeak::split_clause;
use piper_voice::phonemize::{
    AcousticPhonemizer, Clause, ClauseEngine, ClauseTerminator, CodepointPhonemizer,
    PunctuationPolicy,
};
use piper_voice::{
    AudioSink, ModelOutput, PhonemeId, PhonemeType, Phonemizer, PiperConfig, PiperError, Result,
    SpeakerId, Voice, VoiceConfig, WaveformModel, deliver_buffered, deliver_live,
};

/// Lowercase letters of each clause as its phonemes.
struct LetterEngine;

impl ClauseEngine for LetterEngine {
    fn select_voice(&mut self, voice: &str) -> Result<()> {
        if voice == "en-us" {
            Ok(())
        } else {
            Err(PiperError::InvalidVoice(voice.to_string()))
        }
    }

    fn next_clause(&mut self, text: &mut &str) -> Result<Option<Clause>> {
        let Some(split) = split_clause(*text) else {
            return Ok(None);
        };
        *text = split.rest;
        let phonemes = split.spoken().chars().flat_map(char::to_lowercase).collect();
        Ok(Some(Clause {
            phonemes,
            terminator: split.terminator(),
            ends_sentence: split.ends_sentence,
        }))
    }
}

/// Replays fixed clauses regardless of input.
struct ScriptedEngine {
    clauses: Vec<Clause>,
}

impl ClauseEngine for ScriptedEngine {
    fn select_voice(&mut self, _voice: &str) -> Result<()> {
        Ok(())
    }

    fn next_clause(&mut self, text: &mut &str) -> Result<Option<Clause>> {
        *text = "";
        if self.clauses.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.clauses.remove(0)))
    }
}

#[derive(Default)]
struct Calls {
    ids: Vec<Vec<PhonemeId>>,
    speakers: Vec<Option<SpeakerId>>,
}

/// Emits one sample per id, with a peak of 0.5.
struct StubModel {
    calls: Arc<Mutex<Calls>>,
    fail: bool,
}

impl WaveformModel for StubModel {
    fn run(
        &mut self,
        ids: &[PhonemeId],
        _scales: [f32; 3],
        speaker: Option<SpeakerId>,
    ) -> Result<Vec<ModelOutput>> {
        if self.fail {
            return Err(PiperError::Inference("stub failure".to_string()));
        }
        let mut calls = self.calls.lock().expect("lock calls");
        calls.ids.push(ids.to_vec());
        calls.speakers.push(speaker);
        let samples = ids.iter().map(|id| if *id == 0 { 0.0 } else { 0.5 }).collect();
        Ok(vec![ModelOutput::Tensor(samples)])
    }
}

const HELLO_CONFIG: &str = r#"{
    "audio": {"sample_rate": 1000},
    "phoneme_id_map": {"_": [0], "^": [1], "$": [2], "h": [20], "e": [18], "l": [24], "o": [27], ".": [10], "?": [11], "!": [12], " ": [3], "b": [15], "y": [16]}
}"#;

fn voice_with(
    config: &str,
    engine: Box<dyn ClauseEngine>,
    policy: PunctuationPolicy,
) -> (Voice, Arc<Mutex<Calls>>) {
    let config = VoiceConfig::from_json(config).expect("parse voice config");
    let phonemizer = Phonemizer::Acoustic(
        AcousticPhonemizer::new(engine, "en-us", policy).expect("select voice"),
    );
    let calls = Arc::new(Mutex::new(Calls::default()));
    let model = StubModel {
        calls: calls.clone(),
        fail: false,
    };
    (Voice::new(config, phonemizer, Box::new(model)), calls)
}

fn hello_voice() -> (Voice, Arc<Mutex<Calls>>) {
    voice_with(HELLO_CONFIG, Box::new(LetterEngine), PunctuationPolicy::BreakerCounter)
}

#[test]
fn hello_encodes_to_reference_ids() {
    let (mut voice, calls) = hello_voice();
    let mut audio = Vec::new();
    let result = voice.text_to_audio("Hello.", &mut audio).expect("synthesize");

    let calls = calls.lock().expect("lock calls");
    assert_eq!(
        calls.ids,
        vec![vec![1, 0, 20, 0, 18, 0, 24, 0, 24, 0, 27, 0, 10, 0, 2]]
    );
    assert_eq!(calls.speakers, vec![None], "single-speaker voices send no sid");

    // 15 model samples + 0.2 s of silence at 1 kHz
    assert_eq!(audio.len(), 15 + 200);
    assert!(audio[15..].iter().all(|s| *s == 0));
    assert_eq!(audio[0], 32767);
    assert!((result.audio_seconds - 0.015).abs() < 1e-9);
    println!("✅ Hello. -> {:?}", calls.ids[0]);
}

#[test]
fn sentences_arrive_in_order_with_silence() {
    let (mut voice, calls) = hello_voice();
    let mut sentences = Vec::new();
    voice
        .synthesize_sentences("Hello. Bye! Hey?", |pcm| {
            sentences.push(pcm.len());
            Ok(())
        })
        .expect("synthesize");

    let calls = calls.lock().expect("lock calls");
    assert_eq!(calls.ids.len(), 3);
    let expected: Vec<usize> = calls.ids.iter().map(|ids| ids.len() + 200).collect();
    assert_eq!(sentences, expected);
    assert_eq!(calls.ids[1], vec![1, 0, 15, 0, 16, 0, 18, 0, 12, 0, 2]);
}

#[test]
fn punctuation_only_text_is_one_sentence() {
    for policy in [PunctuationPolicy::BreakerCounter, PunctuationPolicy::Terminator] {
        let mut phonemizer = Phonemizer::Acoustic(
            AcousticPhonemizer::new(Box::new(LetterEngine), "en-us", policy).expect("select voice"),
        );
        assert_eq!(phonemizer.phonemize("?!.").expect("phonemize"), vec![vec!['?', '!', '.']]);
        assert_eq!(phonemizer.phonemize(". , ?").expect("phonemize"), vec![vec!['.', ',', '?']]);
    }
}

#[test]
fn ellipsis_keeps_later_punctuation_aligned() {
    let mut phonemizer = AcousticPhonemizer::new(
        Box::new(LetterEngine),
        "en-us",
        PunctuationPolicy::BreakerCounter,
    )
    .expect("select voice");
    let sentences = phonemizer.phonemize("Wait... Really? Yes, ok.").expect("phonemize");
    assert_eq!(
        sentences,
        vec![
            vec!['w', 'a', 'i', 't', '.', '.', '.'],
            vec!['r', 'e', 'a', 'l', 'l', 'y', '?'],
            vec!['y', 'e', 's', ',', 'o', 'k', '.'],
        ]
    );
}

#[test]
fn clauses_beyond_observed_breakers_get_no_punctuation() {
    let clause = |text: &str, terminator| Clause {
        phonemes: text.to_string(),
        terminator,
        ends_sentence: false,
    };
    let script = || ScriptedEngine {
        clauses: vec![
            clause("a", ClauseTerminator::Comma),
            clause("b", ClauseTerminator::Comma),
            clause("c", ClauseTerminator::FullStop),
        ],
    };

    let mut counter = AcousticPhonemizer::new(
        Box::new(script()),
        "en-us",
        PunctuationPolicy::BreakerCounter,
    )
    .expect("select voice");
    assert_eq!(counter.phonemize("a, b c").expect("phonemize"), vec![vec!['a', ',', 'b', 'c']]);

    let mut terminators =
        AcousticPhonemizer::new(Box::new(script()), "en-us", PunctuationPolicy::Terminator)
            .expect("select voice");
    assert_eq!(
        terminators.phonemize("a, b c").expect("phonemize"),
        vec![vec!['a', ',', 'b', ',', 'c', '.']]
    );
}

#[test]
fn unknown_engine_voice_is_rejected() {
    let err = AcousticPhonemizer::new(Box::new(LetterEngine), "xx-nope", PunctuationPolicy::default())
        .unwrap_err();
    assert!(matches!(err, PiperError::InvalidVoice(_)));
}

#[test]
fn missing_phonemes_are_tallied_not_fatal() {
    let (mut voice, calls) = hello_voice();
    let mut audio = Vec::new();
    voice.text_to_audio("Hex.", &mut audio).expect("synthesize despite gap");

    let calls = calls.lock().expect("lock calls");
    // x is dropped entirely
    assert_eq!(calls.ids[0], vec![1, 0, 20, 0, 18, 0, 10, 0, 2]);

    let mut missing = piper_voice::MissingPhonemes::new();
    voice
        .encoder()
        .encode(&['h', 'x', 'x'], &mut missing)
        .expect("encode");
    assert_eq!(missing.count('x'), 2);
}

#[test]
fn ids_round_trip_to_mapped_phonemes() {
    let (voice, _) = hello_voice();
    let encoder = voice.encoder();
    let mut missing = piper_voice::MissingPhonemes::new();
    let phonemes = ['h', 'e', 'q', 'l', 'o'];
    let ids = encoder.encode(&phonemes, &mut missing).expect("encode");

    let reverse: HashMap<PhonemeId, char> = encoder
        .table()
        .iter()
        .flat_map(|(phoneme, ids)| ids.iter().map(move |id| (*id, phoneme)))
        .collect();
    let policy = encoder.policy();
    let recovered: Vec<char> = ids
        .iter()
        .filter(|id| ![policy.pad_id, policy.bos_id, policy.eos_id].contains(*id))
        .map(|id| reverse[id])
        .collect();

    assert_eq!(recovered, vec!['h', 'e', 'l', 'o']);
    assert!(missing.contains('q'));
}

#[test]
fn multi_speaker_voice_sends_sid() {
    let config = r#"{
        "num_speakers": 4,
        "speaker_id_map": {"amy": 3},
        "phoneme_id_map": {"h": [20], "e": [18]}
    }"#;
    let (mut voice, calls) = voice_with(config, Box::new(LetterEngine), PunctuationPolicy::default());
    let mut audio = Vec::new();
    voice.text_to_audio("he", &mut audio).expect("synthesize");

    let amy = voice.speaker_id("amy");
    voice.set_speaker(amy);
    voice.text_to_audio("he", &mut audio).expect("synthesize");

    let calls = calls.lock().expect("lock calls");
    assert_eq!(calls.speakers, vec![Some(0), Some(3)]);
}

#[test]
fn inference_failure_aborts_call() {
    let config = VoiceConfig::from_json(HELLO_CONFIG).expect("parse voice config");
    let model = StubModel {
        calls: Arc::default(),
        fail: true,
    };
    let mut voice = Voice::new(
        config,
        Phonemizer::Codepoints(CodepointPhonemizer),
        Box::new(model),
    );
    let mut audio = Vec::new();
    let err = voice.text_to_audio("hello", &mut audio).unwrap_err();
    assert!(matches!(err, PiperError::Inference(_)));
    assert!(audio.is_empty());
}

#[test]
fn phoneme_silence_splits_phrases() {
    let (mut voice, calls) = hello_voice();
    voice
        .synthesis_config_mut()
        .merge_phoneme_silence(HashMap::from([(' ', 0.1)]));

    let mut audio = Vec::new();
    voice.text_to_audio("he lo.", &mut audio).expect("synthesize");

    let calls = calls.lock().expect("lock calls");
    assert_eq!(calls.ids, vec![vec![1, 0, 20, 0, 18, 0, 3, 0, 2], vec![1, 0, 24, 0, 27, 0, 10, 0, 2]]);
    // two phrases + 0.1 s after the space + 0.2 s sentence silence
    assert_eq!(audio.len(), 9 + 100 + 9 + 200);
}

#[test]
fn text_voices_use_code_points() {
    let config = r#"{"phoneme_type": "text", "phoneme_id_map": {"h": [20], "i": [21]}}"#;
    let config = VoiceConfig::from_json(config).expect("parse voice config");
    let calls = Arc::new(Mutex::new(Calls::default()));
    let model = StubModel {
        calls: calls.clone(),
        fail: false,
    };
    let mut voice =
        Voice::with_model(config, Box::new(model), &PiperConfig::default()).expect("build voice");
    let mut audio = Vec::new();
    voice.text_to_audio("hi", &mut audio).expect("synthesize");

    assert_eq!(calls.lock().expect("lock calls").ids, vec![vec![1, 0, 20, 0, 21, 0, 2]]);
    assert_eq!(voice.config().phoneme_type, PhonemeType::Text);
}

#[derive(Clone, Default)]
struct Recording(Arc<Mutex<Vec<Vec<i16>>>>);

impl AudioSink for Recording {
    fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        self.0.lock().expect("lock recording").push(samples.to_vec());
        Ok(())
    }
}

#[test]
fn live_delivery_matches_buffered_audio() {
    let text = "Hello. Bye! Hey?";

    let (mut buffered_voice, _) = hello_voice();
    let mut expected = Vec::new();
    buffered_voice
        .synthesize_sentences(text, |pcm| {
            expected.push(pcm);
            Ok(())
        })
        .expect("synthesize");

    let (mut live_voice, _) = hello_voice();
    let recording = Recording::default();
    let (result, stats) = deliver_live(&mut live_voice, text, recording.clone()).expect("deliver live");

    let received = recording.0.lock().expect("lock recording").clone();
    assert_eq!(received, expected, "consumer must see sentences in order");
    assert_eq!(stats.buffers, 3);
    assert_eq!(stats.samples, expected.iter().map(Vec::len).sum::<usize>());
    assert!(result.audio_seconds > 0.0);
}

#[test]
fn buffered_wav_reads_back() {
    let (mut voice, _) = hello_voice();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("hello.wav");
    let mut file = std::fs::File::create(&path).expect("create wav");
    deliver_buffered(&mut voice, "Hello. Bye!", &mut file).expect("deliver buffered");
    drop(file);

    let mut reader = hound::WavReader::open(&path).expect("open wav");
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 1000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .expect("read samples");
    // (15 + 200) + (11 + 200)
    assert_eq!(samples.len(), 426);
}

#[test]
fn empty_text_produces_nothing() {
    let (mut voice, calls) = hello_voice();
    let mut audio = Vec::new();
    let result = voice.text_to_audio("", &mut audio).expect("synthesize");
    assert!(audio.is_empty());
    assert_eq!(result.real_time_factor, 0.0);
    assert!(calls.lock().expect("lock calls").ids.is_empty());
}
