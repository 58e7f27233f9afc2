//! Command line interface for the piper binary.

use clap::Parser;
use std::path::PathBuf;

/// Fast, local neural text to speech. Reads text from stdin, one utterance per line.
#[derive(Parser, Debug)]
#[command(name = "piper", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the .onnx voice model
    #[arg(short, long)]
    pub model: PathBuf,

    /// Path to the voice config (default: model path + .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Engine settings: espeak-ng/OpenJTalk locations and phonemizer policies
    #[arg(long)]
    pub engine_config: Option<PathBuf>,

    /// WAV file to write, or '-' for stdout
    #[arg(short = 'f', long, conflicts_with_all = ["output_dir", "output_raw"])]
    pub output_file: Option<PathBuf>,

    /// Directory for one timestamp-named WAV per line (default: current directory)
    #[arg(short = 'd', long, conflicts_with = "output_raw")]
    pub output_dir: Option<PathBuf>,

    /// Stream raw 16-bit PCM to stdout sentence by sentence
    #[arg(long)]
    pub output_raw: bool,

    /// Play audio on the default output device as it is synthesized (playback builds only)
    #[arg(long, conflicts_with_all = ["output_file", "output_dir", "output_raw"])]
    pub play: bool,

    /// Speaker id for multi-speaker voices
    #[arg(short, long)]
    pub speaker: Option<i64>,

    /// Generator noise
    #[arg(long)]
    pub noise_scale: Option<f32>,

    /// Phoneme length (larger is slower)
    #[arg(long)]
    pub length_scale: Option<f32>,

    /// Phoneme width noise
    #[arg(long)]
    pub noise_w: Option<f32>,

    /// Seconds of silence after each sentence
    #[arg(long)]
    pub sentence_silence: Option<f32>,

    /// Extra silence after a phoneme, as PHONEME=SECONDS (repeatable)
    #[arg(long = "phoneme-silence", value_parser = parse_phoneme_silence)]
    pub phoneme_silence: Vec<(char, f32)>,

    /// Input lines are JSON objects with text and optional speaker/output_file
    #[arg(long)]
    pub json_input: bool,

    /// espeak-ng data directory
    #[arg(long)]
    pub espeak_data: Option<PathBuf>,

    /// Run inference with the CUDA execution provider
    #[arg(long)]
    pub use_cuda: bool,

    /// Print debug messages
    #[arg(long)]
    pub debug: bool,

    /// Disable logging
    #[arg(short, long, conflicts_with = "debug")]
    pub quiet: bool,
}

impl Cli {
    /// Filter directive for the log subscriber when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "off"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Parse `PHONEME=SECONDS`, where PHONEME is a single code point.
pub fn parse_phoneme_silence(value: &str) -> Result<(char, f32), String> {
    let (phoneme, seconds) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected PHONEME=SECONDS, got {value:?}"))?;
    let mut chars = phoneme.chars();
    let phoneme = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(format!("phoneme {phoneme:?} must be a single code point")),
    };
    let seconds: f32 = seconds
        .parse()
        .map_err(|e| format!("invalid seconds {seconds:?}: {e}"))?;
    Ok((phoneme, seconds))
}
