//! Getting synthesized PCM out: buffered (whole WAV written once) or live
//! (sentence buffers handed to a consumer thread as they are produced).

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error};

use piper_voice_domain::{AudioFormat, PiperError, Result, SynthesisResult};

use crate::audio::{write_pcm, write_wav};
use crate::voice::Voice;

/// Destination for PCM delivered incrementally.
pub trait AudioSink {
    fn write_samples(&mut self, samples: &[i16]) -> Result<()>;

    /// Called once after the last buffer.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Headerless little-endian PCM to any writer.
#[derive(Debug)]
pub struct RawSink<W: Write> {
    writer: W,
}

impl<W: Write> RawSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AudioSink for RawSink<W> {
    fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        write_pcm(&mut self.writer, samples)?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Synthesize all of `text`, then write one WAV header and the payload.
pub fn deliver_buffered<W: Write>(
    voice: &mut Voice,
    text: &str,
    writer: &mut W,
) -> Result<SynthesisResult> {
    let mut audio = Vec::new();
    let result = voice.text_to_audio(text, &mut audio)?;
    write_wav(writer, &audio, voice.format())?;
    debug!(samples = audio.len(), "Wrote buffered audio");
    Ok(result)
}

enum LiveMessage {
    Samples(Vec<i16>),
    Finished,
}

/// Producer side of a live stream. The consumer thread owns the sink and
/// writes buffers in the order they were pushed.
#[derive(Debug)]
pub struct LiveStream {
    sender: Sender<LiveMessage>,
    consumer: JoinHandle<Result<LiveStats>>,
}

/// What the consumer wrote before closing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveStats {
    pub buffers: usize,
    pub samples: usize,
}

impl std::fmt::Debug for LiveMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveMessage::Samples(samples) => write!(f, "Samples({})", samples.len()),
            LiveMessage::Finished => write!(f, "Finished"),
        }
    }
}

impl LiveStream {
    /// Start a consumer over an existing sink.
    pub fn start<S>(sink: S) -> Result<Self>
    where
        S: AudioSink + Send + 'static,
    {
        Self::spawn(move || Ok(sink))
    }

    /// Start a consumer whose sink is built on the consumer thread, for
    /// sinks that cannot move between threads.
    pub fn spawn<F, S>(make_sink: F) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: AudioSink,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let consumer = thread::Builder::new()
            .name("piper-audio-out".to_string())
            .spawn(move || {
                let mut sink = make_sink()?;
                consume(&receiver, &mut sink)
            })?;
        Ok(Self { sender, consumer })
    }

    /// Hand one sentence buffer to the consumer. Fails once the consumer has
    /// stopped, e.g. after a sink write error.
    pub fn push(&self, samples: Vec<i16>) -> Result<()> {
        self.sender.send(LiveMessage::Samples(samples)).map_err(|_| {
            PiperError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "audio consumer has stopped",
            ))
        })
    }

    /// Signal completion and wait for the consumer to drain.
    pub fn close(self) -> Result<LiveStats> {
        // A send failure means the consumer already exited; its result says why.
        let _ = self.sender.send(LiveMessage::Finished);
        drop(self.sender);
        self.consumer.join().map_err(|_| {
            PiperError::Io(io::Error::other("audio consumer thread panicked"))
        })?
    }
}

fn consume<S: AudioSink>(receiver: &Receiver<LiveMessage>, sink: &mut S) -> Result<LiveStats> {
    let mut stats = LiveStats::default();
    // Blocks between buffers; a dropped sender without `Finished` also ends the stream.
    for message in receiver.iter() {
        match message {
            LiveMessage::Samples(samples) => {
                if let Err(e) = sink.write_samples(&samples) {
                    error!("Audio sink write failed: {e}");
                    return Err(e);
                }
                stats.buffers += 1;
                stats.samples += samples.len();
            }
            LiveMessage::Finished => break,
        }
    }
    sink.finish()?;
    debug!(buffers = stats.buffers, samples = stats.samples, "Audio consumer drained");
    Ok(stats)
}

/// Synthesize `text` on the calling thread while a consumer thread writes
/// each sentence to `sink` as soon as it is ready.
pub fn deliver_live<S>(voice: &mut Voice, text: &str, sink: S) -> Result<(SynthesisResult, LiveStats)>
where
    S: AudioSink + Send + 'static,
{
    let stream = LiveStream::start(sink)?;
    run_live(voice, text, stream)
}

/// Like [`deliver_live`] with a sink constructed on the consumer thread.
pub fn deliver_live_with<F, S>(
    voice: &mut Voice,
    text: &str,
    make_sink: F,
) -> Result<(SynthesisResult, LiveStats)>
where
    F: FnOnce() -> Result<S> + Send + 'static,
    S: AudioSink,
{
    let stream = LiveStream::spawn(make_sink)?;
    run_live(voice, text, stream)
}

fn run_live(voice: &mut Voice, text: &str, stream: LiveStream) -> Result<(SynthesisResult, LiveStats)> {
    let produced = voice.synthesize_sentences(text, |pcm| stream.push(pcm));
    let drained = stream.close();
    match (produced, drained) {
        (Ok(result), Ok(stats)) => Ok((result, stats)),
        // The sink error explains a failed push better than the push itself.
        (Err(_), Err(sink_error)) => Err(sink_error),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}

#[cfg(feature = "playback")]
pub use playback::{PlaybackError, PlaybackSink};

#[cfg(feature = "playback")]
mod playback {
    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, OutputStreamBuilder, Sink};

    use piper_voice_domain::{AudioFormat, PiperError, Result};

    use super::AudioSink;

    #[derive(Debug, thiserror::Error)]
    pub enum PlaybackError {
        #[error("Audio device error: {0}")]
        DeviceError(String),
    }

    impl From<PlaybackError> for PiperError {
        fn from(e: PlaybackError) -> Self {
            PiperError::Io(std::io::Error::other(e))
        }
    }

    /// Plays each delivered buffer on the default output device.
    pub struct PlaybackSink {
        _stream: OutputStream,
        sink: Sink,
        format: AudioFormat,
    }

    impl PlaybackSink {
        pub fn open(format: AudioFormat) -> Result<Self> {
            let stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
                PlaybackError::DeviceError(format!("Failed to open audio output: {e}"))
            })?;
            let sink = Sink::connect_new(stream.mixer());
            tracing::info!(sample_rate = format.sample_rate, "Opened audio output");
            Ok(Self {
                _stream: stream,
                sink,
                format,
            })
        }
    }

    impl AudioSink for PlaybackSink {
        fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
            let data: Vec<f32> = samples
                .iter()
                .map(|s| f32::from(*s) / f32::from(i16::MAX))
                .collect();
            self.sink.append(SamplesBuffer::new(
                self.format.channels,
                self.format.sample_rate,
                data,
            ));
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.sink.sleep_until_end();
            Ok(())
        }
    }
}

/// Human-readable layout of raw output, for piping into a player.
pub fn describe_raw(format: AudioFormat) -> String {
    format!(
        "s{}le, {} Hz, {} channel(s)",
        format.bits_per_sample(),
        format.sample_rate,
        format.channels
    )
}
