//! One stdin line → one synthesis request.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use piper_voice::SpeakerId;

#[derive(Debug, Clone, Deserialize)]
struct JsonLine {
    text: String,
    #[serde(default)]
    speaker_id: Option<SpeakerId>,
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerChoice {
    /// Keep whatever the voice is configured with.
    Default,
    Id(SpeakerId),
    /// Resolved through the voice's `speaker_id_map`.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub text: String,
    pub speaker: SpeakerChoice,
    /// Per-line WAV destination overriding the output mode.
    pub output_file: Option<PathBuf>,
}

impl Request {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            speaker: SpeakerChoice::Default,
            output_file: None,
        }
    }
}

/// Parse a line as plain text, or as a JSON object when `json` is set.
/// `speaker_id` wins over `speaker` when both are present.
pub fn parse_line(line: &str, json: bool) -> Result<Request> {
    if !json {
        return Ok(Request::plain(line));
    }

    let parsed: JsonLine =
        serde_json::from_str(line).with_context(|| format!("invalid JSON input line: {line}"))?;
    let speaker = match (parsed.speaker_id, parsed.speaker) {
        (Some(id), _) => SpeakerChoice::Id(id),
        (None, Some(name)) => SpeakerChoice::Name(name),
        (None, None) => SpeakerChoice::Default,
    };
    Ok(Request {
        text: parsed.text,
        speaker,
        output_file: parsed.output_file,
    })
}
