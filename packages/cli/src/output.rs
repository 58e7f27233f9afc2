//! Where each line's audio goes.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// One WAV per line, named by timestamp.
    Directory(PathBuf),
    /// One WAV, rewritten for every line.
    File(PathBuf),
    /// WAV on stdout.
    Stdout,
    /// Live headerless PCM on stdout.
    Raw,
    /// Live playback on the default device.
    Play,
}

impl OutputMode {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.play {
            return OutputMode::Play;
        }
        if cli.output_raw {
            return OutputMode::Raw;
        }
        match (&cli.output_file, &cli.output_dir) {
            (Some(file), _) if file.as_os_str() == "-" => OutputMode::Stdout,
            (Some(file), _) => OutputMode::File(file.clone()),
            (None, Some(dir)) => OutputMode::Directory(dir.clone()),
            (None, None) => OutputMode::Directory(PathBuf::from(".")),
        }
    }

    /// Audio goes to stdout, so nothing else may be printed there.
    pub fn uses_stdout(&self) -> bool {
        matches!(self, OutputMode::Stdout | OutputMode::Raw)
    }
}

/// `<dir>/<nanoseconds since epoch>.wav`
pub fn timestamp_wav_path(dir: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    dir.join(format!("{nanos}.wav"))
}
