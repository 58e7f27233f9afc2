//! Argument parsing, input lines and output routing for the `piper` binary.

pub mod cli;
pub mod input;
pub mod output;

pub use cli::{Cli, parse_phoneme_silence};
pub use input::{Request, SpeakerChoice, parse_line};
pub use output::{OutputMode, timestamp_wav_path};
