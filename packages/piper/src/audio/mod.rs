//! Float waveforms → 16-bit PCM with silence and timing.

pub mod wav;

use piper_voice_domain::{AudioFormat, SynthesisResult};

pub use wav::{WAV_HEADER_LEN, write_pcm, write_wav, write_wav_header};

/// Peak floor so near-silent output is not amplified into noise.
pub const MIN_PEAK: f32 = 0.01;

/// Scale a waveform so its peak reaches full 16-bit range, clamping the result.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    let peak = samples
        .iter()
        .fold(MIN_PEAK, |peak, sample| peak.max(sample.abs()));
    let scale = f32::from(i16::MAX) / peak;

    samples
        .iter()
        .map(|sample| {
            (sample * scale).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
        })
        .collect()
}

/// Per-call accumulator of PCM telemetry. Loudness is normalized per
/// inferred chunk, never across the whole call.
#[derive(Debug, Clone)]
pub struct AudioAssembler {
    format: AudioFormat,
    result: SynthesisResult,
}

impl AudioAssembler {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            result: SynthesisResult::default(),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Convert one inferred waveform, append it to `out` and record its timing.
    pub fn append_waveform(&mut self, out: &mut Vec<i16>, waveform: &[f32], infer_seconds: f64) {
        out.extend(float_to_pcm16(waveform));
        let audio_seconds = waveform.len() as f64 / f64::from(self.format.sample_rate);
        self.result.add(infer_seconds, audio_seconds);
    }

    /// Append `⌊seconds · rate · channels⌋` zero samples.
    pub fn append_silence(&self, out: &mut Vec<i16>, seconds: f32) {
        let samples = self.format.silence_samples(seconds);
        out.resize(out.len() + samples, 0);
    }

    pub fn finish(mut self) -> SynthesisResult {
        self.result.finish();
        self.result
    }
}
