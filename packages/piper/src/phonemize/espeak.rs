//! Rule-based IPA phonemization through espeak-ng.
//!
//! Text is processed one clause at a time. Each clause yields its phoneme
//! run, a terminator classification and whether the sentence ends there;
//! punctuation phonemes are re-inserted after each run and sentences are
//! split on the engine's sentence flag.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use piper_voice_domain::{Phoneme, PiperError, Result, SentencePhonemes};

use crate::config::EspeakSettings;

/// Characters that may end a clause.
pub const CLAUSE_BREAKERS: [char; 6] = ['.', '?', '!', ',', ';', ':'];

const ESPEAK_PROGRAM: &str = "espeak-ng";
const ESPEAK_DATA_ENV: &str = "ESPEAK_DATA_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseTerminator {
    FullStop,
    Comma,
    Question,
    Exclamation,
    None,
}

impl ClauseTerminator {
    /// Classify a clause-breaking character.
    pub fn from_breaker(breaker: char) -> Self {
        match breaker {
            '.' => ClauseTerminator::FullStop,
            '?' => ClauseTerminator::Question,
            '!' => ClauseTerminator::Exclamation,
            ',' | ';' | ':' => ClauseTerminator::Comma,
            _ => ClauseTerminator::None,
        }
    }

    /// Punctuation phoneme appended after a clause with this terminator.
    pub fn punctuation(&self) -> Option<Phoneme> {
        match self {
            ClauseTerminator::FullStop => Some('.'),
            ClauseTerminator::Comma => Some(','),
            ClauseTerminator::Question => Some('?'),
            ClauseTerminator::Exclamation => Some('!'),
            ClauseTerminator::None => None,
        }
    }
}

/// One clause as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub phonemes: String,
    pub terminator: ClauseTerminator,
    pub ends_sentence: bool,
}

/// Per-clause entry point of a rule-based phonemization engine.
pub trait ClauseEngine: Send {
    /// `InvalidVoice` when the engine has no voice by that name.
    fn select_voice(&mut self, voice: &str) -> Result<()>;

    /// Phonemize the next clause of `text` and advance it past the consumed
    /// input. `None` once the input is exhausted.
    fn next_clause(&mut self, text: &mut &str) -> Result<Option<Clause>>;
}

/// How punctuation phonemes are chosen after each clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunctuationPolicy {
    /// Re-insert the breakers observed in the input, in order. Clauses beyond
    /// the observed breaker count get no punctuation.
    #[default]
    BreakerCounter,
    /// Use the terminator the engine reports for each clause.
    Terminator,
}

pub struct AcousticPhonemizer {
    engine: Box<dyn ClauseEngine>,
    voice: String,
    policy: PunctuationPolicy,
}

impl std::fmt::Debug for AcousticPhonemizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcousticPhonemizer")
            .field("voice", &self.voice)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AcousticPhonemizer {
    /// Fails with `InvalidVoice` if the engine does not know `voice`.
    pub fn new(
        mut engine: Box<dyn ClauseEngine>,
        voice: impl Into<String>,
        policy: PunctuationPolicy,
    ) -> Result<Self> {
        let voice = voice.into();
        engine.select_voice(&voice)?;
        Ok(Self {
            engine,
            voice,
            policy,
        })
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn phonemize(&mut self, text: &str) -> Result<Vec<SentencePhonemes>> {
        self.engine.select_voice(&self.voice)?;

        let breakers = clause_breakers(text);

        let mut sentences = Vec::new();
        let mut current: Option<SentencePhonemes> = None;
        let mut spoken = false;
        let mut remaining = text;
        let mut clause_index = 0;

        while let Some(clause) = self.engine.next_clause(&mut remaining)? {
            let sentence = current.get_or_insert_with(Vec::new);
            sentence.extend(clause.phonemes.chars());
            spoken |= !clause.phonemes.is_empty();

            let punctuation = match self.policy {
                PunctuationPolicy::BreakerCounter => breakers.get(clause_index).copied(),
                PunctuationPolicy::Terminator => clause.terminator.punctuation(),
            };
            if let Some(punctuation) = punctuation {
                sentence.push(punctuation);
            }
            clause_index += 1;

            // Punctuation alone never closes a sentence.
            if clause.ends_sentence
                && spoken
                && let Some(done) = current.take()
            {
                sentences.push(done);
                spoken = false;
            }
        }

        if let Some(rest) = current.take()
            && !rest.is_empty()
        {
            sentences.push(rest);
        }

        if clause_index > breakers.len() {
            debug!(
                clauses = clause_index,
                breakers = breakers.len(),
                "More clauses than observed breakers"
            );
        }
        Ok(sentences)
    }
}

/// One clause cut off the front of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClauseSplit<'a> {
    /// Clause text, trailing breaker included.
    pub clause: &'a str,
    pub breaker: Option<char>,
    pub ends_sentence: bool,
    pub rest: &'a str,
}

impl ClauseSplit<'_> {
    pub fn terminator(&self) -> ClauseTerminator {
        self.breaker
            .map_or(ClauseTerminator::None, ClauseTerminator::from_breaker)
    }

    /// Clause text without its breaker.
    pub fn spoken(&self) -> &str {
        self.clause.trim_end_matches(CLAUSE_BREAKERS).trim()
    }
}

fn is_breaker(c: char) -> bool {
    CLAUSE_BREAKERS.contains(&c)
}

/// Cut the next clause off `text`. A breaker ends a clause when whitespace or
/// the end of input follows it, or when it belongs to a run of breakers; each
/// breaker of a run (`?!`, `...`) is its own clause. Breakers inside a word
/// (`3.14`) do not split. Only the last breaker of a run may end a sentence.
pub fn split_clause(text: &str) -> Option<ClauseSplit<'_>> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }

    let mut previous: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        let next = chars.peek().map(|&(_, next)| next);
        if is_breaker(c) {
            let in_run =
                index == 0 || previous.is_some_and(is_breaker) || next.is_some_and(is_breaker);
            let at_gap = next.is_none_or(char::is_whitespace);
            if in_run || at_gap {
                let end = index + c.len_utf8();
                return Some(ClauseSplit {
                    clause: &text[..end],
                    breaker: Some(c),
                    ends_sentence: at_gap && matches!(c, '.' | '?' | '!'),
                    rest: text[end..].trim_start(),
                });
            }
        }
        previous = Some(c);
    }

    Some(ClauseSplit {
        clause: text,
        breaker: None,
        ends_sentence: true,
        rest: "",
    })
}

/// The breakers that [`split_clause`] cuts on, in input order.
pub fn clause_breakers(mut text: &str) -> Vec<Phoneme> {
    let mut breakers = Vec::new();
    while let Some(split) = split_clause(text) {
        breakers.extend(split.breaker);
        text = split.rest;
    }
    breakers
}

/// espeak-ng invoked as a subprocess, one clause per call.
#[derive(Debug)]
pub struct EspeakEngine {
    program: PathBuf,
    data_path: Option<PathBuf>,
    voices: HashSet<String>,
    voice: Option<String>,
}

impl EspeakEngine {
    /// Probe the espeak-ng binary and read its voice list.
    pub fn initialize(settings: &EspeakSettings) -> Result<Self> {
        let program = settings
            .program
            .clone()
            .unwrap_or_else(|| PathBuf::from(ESPEAK_PROGRAM));
        let data_path = settings
            .data_path
            .clone()
            .or_else(|| env::var_os(ESPEAK_DATA_ENV).map(PathBuf::from));

        let mut engine = Self {
            program,
            data_path,
            voices: HashSet::new(),
            voice: None,
        };

        let output = engine.command().arg("--voices").output().map_err(|e| {
            PiperError::BackendUnavailable(format!(
                "failed to run {}: {e}",
                engine.program.display()
            ))
        })?;
        if !output.status.success() {
            return Err(PiperError::BackendUnavailable(format!(
                "{} --voices failed: {}",
                engine.program.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        engine.voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        info!(
            program = %engine.program.display(),
            voices = engine.voices.len(),
            "Initialized espeak-ng"
        );
        Ok(engine)
    }

    /// Release the engine.
    pub fn terminate(self) {
        debug!(program = %self.program.display(), "Terminated espeak-ng");
    }

    pub fn knows_voice(&self, voice: &str) -> bool {
        self.voices.contains(&voice.to_ascii_lowercase())
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(path) = &self.data_path {
            command.arg(format!("--path={}", path.display()));
        }
        command
    }

    fn phonemize_clause(&self, voice: &str, clause: &str) -> Result<String> {
        let output = self
            .command()
            .args(["-q", "--ipa", "-v", voice, "--"])
            .arg(clause)
            .output()
            .map_err(|e| PiperError::BackendUnavailable(format!("espeak-ng: {e}")))?;
        if !output.status.success() {
            return Err(PiperError::BackendUnavailable(format!(
                "espeak-ng failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let phonemes = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(phonemes)
    }
}

impl ClauseEngine for EspeakEngine {
    fn select_voice(&mut self, voice: &str) -> Result<()> {
        if self.voice.as_deref() == Some(voice) {
            return Ok(());
        }
        if !self.knows_voice(voice) {
            return Err(PiperError::InvalidVoice(voice.to_string()));
        }
        self.voice = Some(voice.to_string());
        Ok(())
    }

    fn next_clause(&mut self, text: &mut &str) -> Result<Option<Clause>> {
        let Some(split) = split_clause(*text) else {
            *text = "";
            return Ok(None);
        };
        *text = split.rest;

        let voice = self
            .voice
            .as_deref()
            .ok_or_else(|| PiperError::InvalidVoice("no voice selected".to_string()))?;
        let spoken = split.spoken();
        let phonemes = if spoken.is_empty() {
            String::new()
        } else {
            self.phonemize_clause(voice, spoken)?
        };

        Ok(Some(Clause {
            phonemes,
            terminator: split.terminator(),
            ends_sentence: split.ends_sentence,
        }))
    }
}

/// Voice identifiers from `espeak-ng --voices`: language codes, voice names
/// and voice file paths, lowercased.
fn parse_voice_list(listing: &str) -> HashSet<String> {
    let mut voices = HashSet::new();
    for line in listing.lines().skip(1) {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 5 {
            continue;
        }
        voices.insert(columns[1].to_ascii_lowercase());
        voices.insert(columns[3].to_ascii_lowercase());
        let file = columns[4].to_ascii_lowercase();
        if let Some((_, base)) = file.rsplit_once('/') {
            voices.insert(base.to_string());
        }
        voices.insert(file);
    }
    voices
}
