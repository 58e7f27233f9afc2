//! Japanese phonemization from OpenJTalk full-context labels.
//!
//! The analyzer runs as a subprocess writing a trace file; the phoneme of
//! each label sits between its first `-` and the following `+`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use piper_voice_domain::phoneme::{BOS, EOS, PAD};
use piper_voice_domain::{Phoneme, PiperError, Result, SentencePhonemes};

use crate::config::OpenJTalkSettings;

const OPENJTALK_BIN_ENV: &str = "OPENJTALK_BIN";
const OPENJTALK_DICTIONARY_ENV: &str = "OPENJTALK_DICTIONARY_DIR";
const OPENJTALK_VOICE_ENV: &str = "OPENJTALK_VOICE";
const OPENJTALK_PROGRAM: &str = "open_jtalk";

const CANDIDATE_BINARIES: [&str; 8] = [
    "../bin/open_jtalk",
    "./open_jtalk",
    "./oj/bin/open_jtalk",
    "../oj/bin/open_jtalk",
    "/usr/local/bin/open_jtalk",
    "/usr/bin/open_jtalk",
    "/opt/homebrew/bin/open_jtalk",
    "/opt/local/bin/open_jtalk",
];

/// Multi-character OpenJTalk phonemes and the private-use code points that
/// stand in for them in voice tables.
pub const MULTI_CHAR_PHONEMES: [(&str, char); 22] = [
    ("a:", '\u{E000}'),
    ("i:", '\u{E001}'),
    ("u:", '\u{E002}'),
    ("e:", '\u{E003}'),
    ("o:", '\u{E004}'),
    ("cl", '\u{E005}'),
    ("ky", '\u{E006}'),
    ("kw", '\u{E007}'),
    ("gy", '\u{E008}'),
    ("gw", '\u{E009}'),
    ("ty", '\u{E00A}'),
    ("dy", '\u{E00B}'),
    ("py", '\u{E00C}'),
    ("by", '\u{E00D}'),
    ("ch", '\u{E00E}'),
    ("ts", '\u{E00F}'),
    ("sh", '\u{E010}'),
    ("zy", '\u{E011}'),
    ("hy", '\u{E012}'),
    ("ny", '\u{E013}'),
    ("my", '\u{E014}'),
    ("ry", '\u{E015}'),
];

pub fn multi_char_phoneme(token: &str) -> Option<Phoneme> {
    MULTI_CHAR_PHONEMES
        .iter()
        .find(|(unit, _)| *unit == token)
        .map(|(_, code_point)| *code_point)
}

/// Handling of multi-character tokens missing from [`MULTI_CHAR_PHONEMES`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiCharPolicy {
    /// Keep only the first code point.
    #[default]
    FirstCodepoint,
    /// Emit one phoneme per character.
    SplitCharacters,
}

/// Which single uppercase tokens are lowercased as devoiced vowels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevoicedVowels {
    /// Every uppercase letter except the moraic nasal `N`.
    #[default]
    AllUppercaseExceptN,
    /// Only `A I U E O`.
    VowelsOnly,
}

impl DevoicedVowels {
    fn lowercases(&self, c: char) -> bool {
        match self {
            DevoicedVowels::AllUppercaseExceptN => c.is_ascii_uppercase() && c != 'N',
            DevoicedVowels::VowelsOnly => matches!(c, 'A' | 'I' | 'U' | 'E' | 'O'),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelPolicy {
    pub multi_char: MultiCharPolicy,
    pub devoiced_vowels: DevoicedVowels,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label has no '-' before the phoneme: {0}")]
    MissingStart(String),
    #[error("label has no '+' after the phoneme: {0}")]
    MissingEnd(String),
    #[error("label is a trace annotation: {0}")]
    Annotation(String),
}

/// Phoneme field of a full-context label: the text between the first `-`
/// and the next `+`.
pub fn label_phoneme(label: &str) -> std::result::Result<&str, LabelError> {
    if label.contains('>') {
        return Err(LabelError::Annotation(label.to_string()));
    }
    let start = label
        .find('-')
        .ok_or_else(|| LabelError::MissingStart(label.to_string()))?
        + 1;
    let len = label[start..]
        .find('+')
        .ok_or_else(|| LabelError::MissingEnd(label.to_string()))?;
    Ok(&label[start..start + len])
}

/// Convert labels into sentences. Returns the sentences and the number of
/// labels skipped because they could not be parsed.
pub fn labels_to_sentences(labels: &[String], policy: LabelPolicy) -> (Vec<SentencePhonemes>, usize) {
    let mut sentences = Vec::new();
    let mut current = SentencePhonemes::new();
    let mut skipped = 0;

    for (index, label) in labels.iter().enumerate() {
        let token = match label_phoneme(label) {
            Ok(token) => token,
            Err(e) => {
                debug!("Skipping label: {e}");
                skipped += 1;
                continue;
            }
        };

        match token {
            "sil" if index == 0 => current.push(BOS),
            "sil" => {
                current.push(EOS);
                sentences.push(std::mem::take(&mut current));
            }
            "pau" => current.push(PAD),
            _ => push_token(&mut current, token, policy),
        }
    }

    if !current.is_empty() {
        sentences.push(current);
    }
    (sentences, skipped)
}

fn push_token(sentence: &mut SentencePhonemes, token: &str, policy: LabelPolicy) {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return;
    };

    if chars.next().is_none() {
        if policy.devoiced_vowels.lowercases(first) {
            sentence.push(first.to_ascii_lowercase());
        } else {
            sentence.push(first);
        }
        return;
    }

    if let Some(code_point) = multi_char_phoneme(token) {
        sentence.push(code_point);
        return;
    }

    match policy.multi_char {
        MultiCharPolicy::FirstCodepoint => sentence.push(first),
        MultiCharPolicy::SplitCharacters => sentence.extend(token.chars()),
    }
}

/// Source of full-context labels for a piece of text.
pub trait LabelExtractor: Send {
    fn extract_labels(&mut self, text: &str) -> Result<Vec<String>>;
}

/// The `open_jtalk` binary plus its dictionary and optional HTS voice.
#[derive(Debug, Clone)]
pub struct OpenJTalk {
    binary: PathBuf,
    dictionary: PathBuf,
    voice: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
}

impl OpenJTalk {
    /// Locate the binary and dictionary from settings, environment, well-known
    /// install locations, then `PATH`.
    pub fn discover(settings: &OpenJTalkSettings) -> Result<Self> {
        let binary = settings
            .binary
            .clone()
            .or_else(|| env::var_os(OPENJTALK_BIN_ENV).map(PathBuf::from))
            .filter(|path| path.is_file())
            .or_else(find_candidate_binary)
            .or_else(|| find_on_path(OPENJTALK_PROGRAM))
            .ok_or_else(|| {
                PiperError::BackendUnavailable("open_jtalk binary not found".to_string())
            })?;

        let dictionary = settings
            .dictionary
            .clone()
            .or_else(|| env::var_os(OPENJTALK_DICTIONARY_ENV).map(PathBuf::from))
            .ok_or_else(|| {
                PiperError::BackendUnavailable(format!(
                    "no OpenJTalk dictionary configured (set {OPENJTALK_DICTIONARY_ENV})"
                ))
            })?;
        if !dictionary.is_dir() {
            return Err(PiperError::BackendUnavailable(format!(
                "OpenJTalk dictionary not found at {}",
                dictionary.display()
            )));
        }

        let voice = settings
            .voice
            .clone()
            .or_else(|| env::var_os(OPENJTALK_VOICE_ENV).map(PathBuf::from));

        info!(binary = %binary.display(), dictionary = %dictionary.display(), "Found OpenJTalk");
        Ok(Self {
            binary,
            dictionary,
            voice,
            temp_dir: settings.temp_dir.clone(),
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn temp_file(&self) -> Result<NamedTempFile> {
        let file = match &self.temp_dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        Ok(file)
    }
}

impl LabelExtractor for OpenJTalk {
    fn extract_labels(&mut self, text: &str) -> Result<Vec<String>> {
        // Temp files are removed on drop, including early returns.
        let input = self.temp_file()?;
        let trace = self.temp_file()?;
        let audio = self.temp_file()?;
        fs::write(input.path(), text)?;

        let mut command = Command::new(&self.binary);
        command.arg("-x").arg(&self.dictionary);
        if let Some(voice) = &self.voice {
            command.arg("-m").arg(voice);
        }
        command
            .arg("-ot")
            .arg(trace.path())
            .arg("-ow")
            .arg(audio.path())
            .arg(input.path())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = command.output().map_err(|e| {
            PiperError::BackendUnavailable(format!("failed to run {}: {e}", self.binary.display()))
        })?;
        if !output.status.success() {
            return Err(PiperError::BackendUnavailable(format!(
                "open_jtalk exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let trace_text = fs::read_to_string(trace.path())?;
        Ok(trace_labels(&trace_text))
    }
}

/// Label lines of a trace file: those containing `-`, `+` and `/` but no `>`.
pub fn trace_labels(trace: &str) -> Vec<String> {
    trace
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.contains('-') && line.contains('+') && line.contains('/') && !line.contains('>')
        })
        .map(str::to_string)
        .collect()
}

fn find_candidate_binary() -> Option<PathBuf> {
    CANDIDATE_BINARIES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

enum Analyzer {
    Unstarted(OpenJTalkSettings),
    Ready(Box<dyn LabelExtractor>),
    Unavailable,
}

/// OpenJTalk-backed phonemizer. The analyzer is started on first use; if it
/// cannot be started or a call fails, the result is empty.
pub struct MorphologicalPhonemizer {
    analyzer: Analyzer,
    policy: LabelPolicy,
}

impl std::fmt::Debug for MorphologicalPhonemizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.analyzer {
            Analyzer::Unstarted(_) => "unstarted",
            Analyzer::Ready(_) => "ready",
            Analyzer::Unavailable => "unavailable",
        };
        f.debug_struct("MorphologicalPhonemizer")
            .field("analyzer", &state)
            .field("policy", &self.policy)
            .finish()
    }
}

impl MorphologicalPhonemizer {
    pub fn new(settings: OpenJTalkSettings, policy: LabelPolicy) -> Self {
        Self {
            analyzer: Analyzer::Unstarted(settings),
            policy,
        }
    }

    /// Use an already constructed extractor.
    pub fn with_extractor(extractor: Box<dyn LabelExtractor>, policy: LabelPolicy) -> Self {
        Self {
            analyzer: Analyzer::Ready(extractor),
            policy,
        }
    }

    pub fn phonemize(&mut self, text: &str) -> Vec<SentencePhonemes> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let Some(extractor) = self.extractor() else {
            return Vec::new();
        };
        let labels = match extractor.extract_labels(text) {
            Ok(labels) => labels,
            Err(e) => {
                warn!("OpenJTalk label extraction failed: {e}");
                return Vec::new();
            }
        };

        let (sentences, skipped) = labels_to_sentences(&labels, self.policy);
        if skipped > 0 {
            debug!(skipped, labels = labels.len(), "Skipped unparseable labels");
        }
        sentences
    }

    fn extractor(&mut self) -> Option<&mut Box<dyn LabelExtractor>> {
        if let Analyzer::Unstarted(settings) = &self.analyzer {
            self.analyzer = match OpenJTalk::discover(settings) {
                Ok(open_jtalk) => Analyzer::Ready(Box::new(open_jtalk)),
                Err(e) => {
                    warn!("OpenJTalk unavailable: {e}");
                    Analyzer::Unavailable
                }
            };
        }
        match &mut self.analyzer {
            Analyzer::Ready(extractor) => Some(extractor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn phoneme_field_between_dash_and_plus() {
        assert_eq!(label_phoneme("xx^xx-sil+k=o/A:xx"), Ok("sil"));
        assert_eq!(label_phoneme("k^o-N+n=i/A:-3+1+5"), Ok("N"));
        assert!(matches!(label_phoneme("no-phoneme"), Err(LabelError::MissingEnd(_))));
        assert!(matches!(label_phoneme("a->b+c/"), Err(LabelError::Annotation(_))));
    }

    #[test]
    fn leading_silence_is_bos_and_pause_does_not_split() {
        let input = labels(&[
            "xx^xx-sil+k=o/A:xx",
            "xx^sil-k+o=N/A:-4",
            "sil^k-o+pau=N/A:-4",
            "k^o-pau+N=n/A:xx",
            "o^pau-N+n=i/A:-3",
            "N^n-i+sil=xx/A:-2",
            "n^i-sil+xx=xx/A:xx",
        ]);
        let (sentences, skipped) = labels_to_sentences(&input, LabelPolicy::default());
        assert_eq!(skipped, 0);
        assert_eq!(sentences, vec![vec!['^', 'k', 'o', '_', 'N', 'i', '$']]);
        assert_eq!(sentences[0].iter().filter(|p| **p == '_').count(), 1);
    }

    #[test]
    fn inner_silence_closes_sentence() {
        let input = labels(&["a-sil+b/", "a-a+b/", "a-sil+b/", "a-e+b/", "a-sil+b/"]);
        let (sentences, _) = labels_to_sentences(&input, LabelPolicy::default());
        assert_eq!(sentences, vec![vec!['^', 'a', '$'], vec!['e', '$']]);
    }

    #[test]
    fn devoiced_and_multi_char_tokens() {
        let input = labels(&["a-U+b/", "a-N+b/", "a-ky+b/", "a-xyz+b/", "a-I+b/"]);
        let (sentences, _) = labels_to_sentences(&input, LabelPolicy::default());
        assert_eq!(sentences, vec![vec!['u', 'N', '\u{E006}', 'x', 'i']]);

        let policy = LabelPolicy {
            multi_char: MultiCharPolicy::SplitCharacters,
            devoiced_vowels: DevoicedVowels::VowelsOnly,
        };
        let input = labels(&["a-K+b/", "a-xyz+b/"]);
        let (sentences, _) = labels_to_sentences(&input, policy);
        assert_eq!(sentences, vec![vec!['K', 'x', 'y', 'z']]);
    }

    #[test]
    fn bad_labels_are_counted() {
        let input = labels(&["garbage", "a-a+b/", "x->y"]);
        let (sentences, skipped) = labels_to_sentences(&input, LabelPolicy::default());
        assert_eq!(skipped, 2);
        assert_eq!(sentences, vec![vec!['a']]);
    }

    #[test]
    fn trace_filter_keeps_label_lines() {
        let trace = "[Text analysis result]\n\
                     こんにちは,感動詞,*\n\
                     [Output label]\n\
                     0 1675000 xx^xx-sil+k=o/A:xx+xx+xx\n\
                     a->b+c/d\n";
        assert_eq!(trace_labels(trace), vec!["0 1675000 xx^xx-sil+k=o/A:xx+xx+xx".to_string()]);
    }

    #[cfg(unix)]
    fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
        path
    }

    #[cfg(unix)]
    fn is_empty_dir(dir: &Path) -> bool {
        fs::read_dir(dir).expect("read temp dir").next().is_none()
    }

    // One test so no other spawn in this binary races the fresh scripts.
    #[cfg(unix)]
    #[test]
    fn analyzer_subprocess_contract() {
        let tools = tempfile::tempdir().expect("tools dir");
        let scratch = tempfile::tempdir().expect("scratch dir");
        let dictionary = tools.path().join("dic");
        fs::create_dir(&dictionary).expect("dictionary dir");
        let voice = tools.path().join("voice.htsvoice");
        let argv = tools.path().join("argv.txt");
        let seen_text = tools.path().join("input.txt");

        let analyzer = install_script(
            tools.path(),
            "open_jtalk",
            &format!(
                "printf '%s\\n' \"$@\" > '{argv}'\n\
                 for arg; do last=\"$arg\"; done\n\
                 cp \"$last\" '{seen}'\n\
                 while [ $# -gt 0 ]; do\n\
                   if [ \"$1\" = -ot ]; then\n\
                     printf '%s\\n' '[Output label]' 'xx^xx-sil+k=o/A:xx' 'sil^k-o+sil=xx/A:-1' 'k^o-sil+xx=xx/A:xx' > \"$2\"\n\
                   fi\n\
                   shift\n\
                 done\n",
                argv = argv.display(),
                seen = seen_text.display(),
            ),
        );
        let settings = OpenJTalkSettings {
            binary: Some(analyzer),
            dictionary: Some(dictionary.clone()),
            voice: Some(voice.clone()),
            temp_dir: Some(scratch.path().to_path_buf()),
        };
        let mut open_jtalk = OpenJTalk::discover(&settings).expect("discover");

        let labels = open_jtalk.extract_labels("こんにちは").expect("labels");
        assert_eq!(
            labels,
            vec!["xx^xx-sil+k=o/A:xx", "sil^k-o+sil=xx/A:-1", "k^o-sil+xx=xx/A:xx"]
        );
        assert_eq!(fs::read_to_string(&seen_text).expect("input copy"), "こんにちは");

        let args = fs::read_to_string(&argv).expect("argv");
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(args.len(), 9);
        let dictionary = dictionary.to_str().expect("utf-8 path");
        let voice = voice.to_str().expect("utf-8 path");
        assert_eq!(args[..4], ["-x", dictionary, "-m", voice]);
        assert_eq!((args[4], args[6]), ("-ot", "-ow"));
        for file in [args[5], args[7], args[8]] {
            assert_eq!(Path::new(file).parent(), Some(scratch.path()));
        }
        assert!(is_empty_dir(scratch.path()), "temp files removed after success");

        let failing = install_script(
            tools.path(),
            "failing_jtalk",
            "echo 'dictionary broken' >&2\nexit 3\n",
        );
        open_jtalk.binary = failing;
        let err = open_jtalk.extract_labels("こんにちは").unwrap_err();
        assert!(
            matches!(&err, PiperError::BackendUnavailable(msg) if msg.contains("dictionary broken")),
            "unexpected error: {err}"
        );
        assert!(is_empty_dir(scratch.path()), "temp files removed after failure");

        open_jtalk.binary = tools.path().join("missing_jtalk");
        let err = open_jtalk.extract_labels("こんにちは").unwrap_err();
        assert!(matches!(err, PiperError::BackendUnavailable(_)));
        assert!(is_empty_dir(scratch.path()), "temp files removed after spawn failure");
    }
}
