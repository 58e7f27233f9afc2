//! Waveform generation boundary.
//!
//! A model takes one encoded sentence, the three synthesis scales and an
//! optional speaker, and yields exactly one float tensor.

use std::time::Instant;

use tracing::debug;

use piper_voice_domain::{PhonemeId, PiperError, Result, SpeakerId};

/// One raw model output before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Flattened float32 tensor.
    Tensor(Vec<f32>),
    /// Anything that is not a float tensor, described for diagnostics.
    Other(String),
}

/// The trained model behind a voice. Not safe for concurrent use; callers
/// serialize through `&mut`.
pub trait WaveformModel: Send {
    /// Run the model on `ids` (a batch of one). `speaker` is `None` for
    /// single-speaker voices and is then not passed to the model at all.
    fn run(
        &mut self,
        ids: &[PhonemeId],
        scales: [f32; 3],
        speaker: Option<SpeakerId>,
    ) -> Result<Vec<ModelOutput>>;
}

/// Waveform of one sentence and the wall-clock time spent producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Inferred {
    pub samples: Vec<f32>,
    pub seconds: f64,
}

pub struct InferenceInvoker {
    model: Box<dyn WaveformModel>,
}

impl std::fmt::Debug for InferenceInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceInvoker").finish_non_exhaustive()
    }
}

impl InferenceInvoker {
    pub fn new(model: Box<dyn WaveformModel>) -> Self {
        Self { model }
    }

    pub fn infer(
        &mut self,
        ids: &[PhonemeId],
        scales: [f32; 3],
        speaker: Option<SpeakerId>,
    ) -> Result<Inferred> {
        let start = Instant::now();
        let outputs = self.model.run(ids, scales, speaker)?;
        let seconds = start.elapsed().as_secs_f64();

        let mut outputs = outputs.into_iter();
        let samples = match (outputs.next(), outputs.next()) {
            (None, _) => return Err(PiperError::Inference("model produced no output".to_string())),
            (Some(_), Some(_)) => {
                return Err(PiperError::Inference(format!(
                    "expected a single output, got {}",
                    2 + outputs.len()
                )));
            }
            (Some(ModelOutput::Other(kind)), None) => {
                return Err(PiperError::Inference(format!("output is not a tensor: {kind}")));
            }
            (Some(ModelOutput::Tensor(samples)), None) => samples,
        };

        debug!(ids = ids.len(), samples = samples.len(), seconds, "Inferred sentence");
        Ok(Inferred { samples, seconds })
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OrtModel;

#[cfg(feature = "onnx")]
mod onnx {
    use std::path::Path;
    use std::time::Instant;

    use ort::session::Session;
    #[cfg(feature = "cuda")]
    use ort::execution_providers::CUDAExecutionProvider;
    use ort::execution_providers::CPUExecutionProvider;
    use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
    use ort::value::Tensor;
    use tracing::debug;

    use piper_voice_domain::{PhonemeId, PiperError, Result, SpeakerId};

    use super::{ModelOutput, WaveformModel};

    /// ONNX Runtime session for a piper voice model.
    #[derive(Debug)]
    pub struct OrtModel {
        session: Session,
    }

    impl OrtModel {
        pub fn load<P: AsRef<Path>>(path: P, use_cuda: bool) -> Result<Self> {
            let path = path.as_ref();
            let start = Instant::now();

            let builder = Session::builder()
                .map_err(|e| PiperError::Config(format!("Failed to create session builder: {e}")))?
                .with_optimization_level(GraphOptimizationLevel::Disable)
                .map_err(|e| PiperError::Config(format!("Failed to set optimization level: {e}")))?
                .with_memory_pattern(false)
                .map_err(|e| PiperError::Config(format!("Failed to disable memory pattern: {e}")))?;
            let builder = with_providers(builder, use_cuda)?;
            let session = builder.commit_from_file(path).map_err(|e| {
                PiperError::Config(format!("Failed to load model {}: {e}", path.display()))
            })?;

            debug!(
                model = %path.display(),
                seconds = start.elapsed().as_secs_f64(),
                "Loaded onnx model"
            );
            Ok(Self { session })
        }
    }

    /// CUDA first when requested, then the CPU provider with its memory
    /// arena disabled.
    fn with_providers(builder: SessionBuilder, use_cuda: bool) -> Result<SessionBuilder> {
        let mut providers = Vec::new();
        if use_cuda {
            #[cfg(feature = "cuda")]
            {
                debug!("Using CUDA execution provider");
                providers.push(CUDAExecutionProvider::default().build());
            }
            #[cfg(not(feature = "cuda"))]
            tracing::warn!("CUDA requested but the cuda feature is disabled, using CPU");
        }
        providers.push(CPUExecutionProvider::default().with_arena_allocator(false).build());

        builder
            .with_execution_providers(providers)
            .map_err(|e| PiperError::Config(format!("Failed to register execution providers: {e}")))
    }

    fn tensor_error(e: ort::Error) -> PiperError {
        PiperError::Inference(format!("Failed to create input tensor: {e}"))
    }

    impl WaveformModel for OrtModel {
        fn run(
            &mut self,
            ids: &[PhonemeId],
            scales: [f32; 3],
            speaker: Option<SpeakerId>,
        ) -> Result<Vec<ModelOutput>> {
            let input = Tensor::from_array(([1usize, ids.len()], ids.to_vec())).map_err(tensor_error)?;
            let input_lengths =
                Tensor::from_array(([1usize], vec![ids.len() as i64])).map_err(tensor_error)?;
            let scales = Tensor::from_array(([3usize], scales.to_vec())).map_err(tensor_error)?;

            let outputs = match speaker {
                Some(speaker) => {
                    let sid = Tensor::from_array(([1usize], vec![speaker])).map_err(tensor_error)?;
                    self.session.run(ort::inputs![
                        "input" => input,
                        "input_lengths" => input_lengths,
                        "scales" => scales,
                        "sid" => sid,
                    ])
                }
                None => self.session.run(ort::inputs![
                    "input" => input,
                    "input_lengths" => input_lengths,
                    "scales" => scales,
                ]),
            }
            .map_err(|e| PiperError::Inference(e.to_string()))?;

            let mut values = Vec::with_capacity(outputs.len());
            for index in 0..outputs.len() {
                let value = match outputs[index].try_extract_tensor::<f32>() {
                    Ok((_, data)) => ModelOutput::Tensor(data.to_vec()),
                    Err(e) => ModelOutput::Other(e.to_string()),
                };
                values.push(value);
            }
            Ok(values)
        }
    }
}
