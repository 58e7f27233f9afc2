//! piper: reads text from stdin, one utterance per line, and speaks it.

use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use piper_voice::delivery::describe_raw;
use piper_voice::{
    PiperConfig, RawSink, SynthesisResult, Voice, default_config_path, deliver_buffered,
    deliver_live,
};
use piper_voice_cli::{Cli, OutputMode, Request, SpeakerChoice, parse_line, timestamp_wav_path};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    run(cli)
}

/// Logs go to stderr; stdout may carry audio.
fn init_logging(cli: &Cli) {
    let filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if !cli.model.is_file() {
        bail!("Model file doesn't exist: {}", cli.model.display());
    }
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&cli.model));
    if !config_path.is_file() {
        bail!("Model config doesn't exist: {}", config_path.display());
    }

    let mut engine = match &cli.engine_config {
        Some(path) => PiperConfig::load(path)
            .with_context(|| format!("failed to load engine config {}", path.display()))?,
        None => PiperConfig::default(),
    };
    if let Some(data) = &cli.espeak_data {
        engine.espeak.data_path = Some(data.clone());
    }
    engine.use_cuda |= cli.use_cuda;

    let mut voice = Voice::load(&cli.model, Some(&config_path), &engine)
        .with_context(|| format!("failed to load voice {}", cli.model.display()))?;
    apply_overrides(&mut voice, &cli);

    let mode = OutputMode::from_cli(&cli);
    match &mode {
        OutputMode::Directory(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("cannot create output directory {}", dir.display()))?;
            info!("Output directory: {}", dir.display());
        }
        OutputMode::Raw => info!("Raw output: {}", describe_raw(voice.format())),
        _ => {}
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let request = match parse_line(&line, cli.json_input) {
            Ok(request) => request,
            Err(e) => {
                error!("{e:#}");
                continue;
            }
        };

        match speak(&mut voice, &request, &mode) {
            Ok(result) => info!(
                infer_seconds = result.infer_seconds,
                audio_seconds = result.audio_seconds,
                "Real-time factor: {:.3}",
                result.real_time_factor
            ),
            Err(e) => error!("{e:#}"),
        }
    }

    Ok(())
}

fn apply_overrides(voice: &mut Voice, cli: &Cli) {
    let synthesis = voice.synthesis_config_mut();
    if let Some(noise_scale) = cli.noise_scale {
        synthesis.noise_scale = noise_scale;
    }
    if let Some(length_scale) = cli.length_scale {
        synthesis.length_scale = length_scale;
    }
    if let Some(noise_w) = cli.noise_w {
        synthesis.noise_w = noise_w;
    }
    if let Some(seconds) = cli.sentence_silence {
        synthesis.sentence_silence_seconds = seconds;
    }
    if !cli.phoneme_silence.is_empty() {
        synthesis.merge_phoneme_silence(cli.phoneme_silence.iter().copied().collect());
    }
    if cli.speaker.is_some() {
        voice.set_speaker(cli.speaker);
    }
}

/// Synthesize one request. A per-line speaker applies to that line only.
fn speak(voice: &mut Voice, request: &Request, mode: &OutputMode) -> Result<SynthesisResult> {
    let saved_speaker = voice.synthesis_config().speaker_id;
    match &request.speaker {
        SpeakerChoice::Default => {}
        SpeakerChoice::Id(id) => voice.set_speaker(Some(*id)),
        SpeakerChoice::Name(name) => match voice.speaker_id(name) {
            Some(id) => voice.set_speaker(Some(id)),
            None => warn!("No speaker named {name:?}, using the default"),
        },
    }

    let result = synthesize_to(voice, &request.text, request.output_file.as_deref(), mode);
    voice.synthesis_config_mut().speaker_id = saved_speaker;
    result
}

fn synthesize_to(
    voice: &mut Voice,
    text: &str,
    output_file: Option<&Path>,
    mode: &OutputMode,
) -> Result<SynthesisResult> {
    if let Some(path) = output_file {
        return write_wav_file(voice, text, path);
    }

    match mode {
        OutputMode::Directory(dir) => {
            let path = timestamp_wav_path(dir);
            let result = write_wav_file(voice, text, &path)?;
            println!("{}", path.display());
            Ok(result)
        }
        OutputMode::File(path) => write_wav_file(voice, text, path),
        OutputMode::Stdout => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            Ok(deliver_buffered(voice, text, &mut out)?)
        }
        OutputMode::Raw => {
            let (result, _) = deliver_live(voice, text, RawSink::new(io::stdout()))?;
            Ok(result)
        }
        OutputMode::Play => play(voice, text),
    }
}

fn write_wav_file(voice: &mut Voice, text: &str, path: &Path) -> Result<SynthesisResult> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let result = deliver_buffered(voice, text, &mut out)?;
    out.flush()?;
    Ok(result)
}

#[cfg(feature = "playback")]
fn play(voice: &mut Voice, text: &str) -> Result<SynthesisResult> {
    let format = voice.format();
    let (result, _) = piper_voice::deliver_live_with(voice, text, move || {
        piper_voice::delivery::PlaybackSink::open(format)
    })?;
    Ok(result)
}

#[cfg(not(feature = "playback"))]
fn play(_voice: &mut Voice, _text: &str) -> Result<SynthesisResult> {
    bail!("audio playback is not compiled in; rebuild with --features playback")
}
