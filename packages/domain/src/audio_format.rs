//! PCM layout produced by the assembler and written by the sinks.

use serde::{Deserialize, Serialize};

/// 16-bit little-endian PCM is the only encoding the pipeline emits.
pub const SAMPLE_WIDTH_BYTES: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second, per channel.
    pub sample_rate: u32,
    /// Bytes per sample.
    pub sample_width: u16,
    /// Interleaved channel count.
    pub channels: u16,
}

impl AudioFormat {
    /// Signed 16-bit PCM at `sample_rate`.
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            sample_width: SAMPLE_WIDTH_BYTES,
            channels,
        }
    }

    /// Bytes per second of audio.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.sample_width) * u32::from(self.channels)
    }

    /// Bytes per interleaved frame.
    pub fn block_align(&self) -> u16 {
        self.sample_width * self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width * 8
    }

    /// Number of zero samples covering `seconds` of silence, 0 for non-positive durations.
    pub fn silence_samples(&self, seconds: f32) -> usize {
        if seconds <= 0.0 {
            return 0;
        }
        (f64::from(seconds) * f64::from(self.sample_rate) * f64::from(self.channels)).floor()
            as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16(22_050, 1)
    }
}
