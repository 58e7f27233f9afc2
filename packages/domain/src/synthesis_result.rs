//! Timing telemetry for one text-to-audio call.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Wall-clock seconds spent inside the model.
    pub infer_seconds: f64,
    /// Seconds of inferred audio, silence excluded.
    pub audio_seconds: f64,
    /// `infer_seconds / audio_seconds`, 0 when no audio was produced.
    pub real_time_factor: f64,
}

impl SynthesisResult {
    /// Accumulate one sentence.
    pub fn add(&mut self, infer_seconds: f64, audio_seconds: f64) {
        self.infer_seconds += infer_seconds;
        self.audio_seconds += audio_seconds;
    }

    /// Derive the real-time factor from the accumulated totals.
    pub fn finish(&mut self) {
        self.real_time_factor = if self.audio_seconds > 0.0 {
            self.infer_seconds / self.audio_seconds
        } else {
            0.0
        };
    }
}
