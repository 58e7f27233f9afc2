use std::path::PathBuf;

use clap::Parser;
use piper_voice_cli::{
    Cli, OutputMode, Request, SpeakerChoice, parse_line, parse_phoneme_silence, timestamp_wav_path,
};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("piper").chain(args.iter().copied()))
        .expect("arguments should parse")
}

#[test]
fn defaults_to_current_directory() {
    let cli = parse(&["--model", "voice.onnx"]);
    assert_eq!(OutputMode::from_cli(&cli), OutputMode::Directory(PathBuf::from(".")));
    assert_eq!(cli.log_level(), "info");
    assert!(cli.config.is_none());
}

#[test]
fn output_modes() {
    let cli = parse(&["-m", "voice.onnx", "-f", "-"]);
    assert_eq!(OutputMode::from_cli(&cli), OutputMode::Stdout);
    assert!(OutputMode::from_cli(&cli).uses_stdout());

    let cli = parse(&["-m", "voice.onnx", "-f", "out.wav"]);
    assert_eq!(OutputMode::from_cli(&cli), OutputMode::File(PathBuf::from("out.wav")));

    let cli = parse(&["-m", "voice.onnx", "-d", "wavs"]);
    assert_eq!(OutputMode::from_cli(&cli), OutputMode::Directory(PathBuf::from("wavs")));

    let cli = parse(&["-m", "voice.onnx", "--output-raw"]);
    assert_eq!(OutputMode::from_cli(&cli), OutputMode::Raw);

    let err = Cli::try_parse_from(["piper", "-m", "v.onnx", "-f", "a.wav", "--output-raw"]);
    assert!(err.is_err(), "file and raw output are exclusive");
}

#[test]
fn synthesis_overrides_and_silence() {
    let cli = parse(&[
        "-m",
        "voice.onnx",
        "-s",
        "3",
        "--length-scale",
        "1.5",
        "--sentence-silence",
        "0.5",
        "--phoneme-silence",
        ",=0.1",
        "--phoneme-silence",
        "ə=0.25",
        "--debug",
    ]);
    assert_eq!(cli.speaker, Some(3));
    assert_eq!(cli.length_scale, Some(1.5));
    assert_eq!(cli.sentence_silence, Some(0.5));
    assert_eq!(cli.phoneme_silence, vec![(',', 0.1), ('ə', 0.25)]);
    assert_eq!(cli.log_level(), "debug");
}

#[test]
fn phoneme_silence_must_be_single_code_point() {
    assert_eq!(parse_phoneme_silence("==0.2"), Ok(('=', 0.2)));
    assert!(parse_phoneme_silence("ab=0.2").is_err());
    assert!(parse_phoneme_silence("a").is_err());
    assert!(parse_phoneme_silence("a=soon").is_err());
}

#[test]
fn plain_and_json_lines() {
    assert_eq!(parse_line("Hello there.", false).expect("plain"), Request::plain("Hello there."));

    let request = parse_line(
        r#"{"text": "Hi.", "speaker": "amy", "output_file": "/tmp/hi.wav"}"#,
        true,
    )
    .expect("json line");
    assert_eq!(request.text, "Hi.");
    assert_eq!(request.speaker, SpeakerChoice::Name("amy".to_string()));
    assert_eq!(request.output_file, Some(PathBuf::from("/tmp/hi.wav")));

    let request =
        parse_line(r#"{"text": "Hi.", "speaker_id": 2, "speaker": "amy"}"#, true).expect("json line");
    assert_eq!(request.speaker, SpeakerChoice::Id(2));

    assert!(parse_line(r#"{"speaker_id": 2}"#, true).is_err());
    assert!(parse_line("not json", true).is_err());
}

#[test]
fn timestamped_paths_land_in_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = timestamp_wav_path(dir.path());
    assert_eq!(path.parent(), Some(dir.path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("wav"));
    println!("✅ {}", path.display());
}
