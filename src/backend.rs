//! Model invocation backends.
//!
//! The four neural stages are opaque "named tensors in, named tensors out"
//! functions behind one trait, [`InferenceBackend`] — the pipeline stays
//! uniform across stages and tests substitute a mock backend.  The shipped
//! implementation is [`OrtBackend`], four ONNX Runtime sessions:
//!
//! | Stage             | Inputs                                                        | Output            |
//! |-------------------|---------------------------------------------------------------|-------------------|
//! | duration predictor| `text_ids`, `style_dp`, `text_mask`                           | `duration`        |
//! | text encoder      | `text_ids`, `style_ttl`, `text_mask`                          | `text_emb`        |
//! | vector estimator  | `noisy_latent`, `text_emb`, `style_ttl`, `latent_mask`, `text_mask`, `current_step`, `total_step` | `denoised_latent` |
//! | vocoder           | `latent`                                                      | `wav_tts`         |

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ndarray::{Array2, Array3};
use ort::{session::Session, value::Tensor};

pub use crate::error::Stage;

/// The four model roles the pipeline invokes.  Implementations are stateless
/// from the caller's perspective; each method may be invoked repeatedly and
/// concurrently with unrelated synthesis calls.
pub trait InferenceBackend {
    /// Per-item speech duration in seconds (before speed adjustment).
    fn predict_duration(
        &self,
        text_ids: &Array2<i64>,
        style_dp: &Array3<f32>,
        text_mask: &Array3<f32>,
    ) -> Result<Vec<f32>>;

    /// Text embedding, held fixed for the remainder of a chunk.
    fn encode_text(
        &self,
        text_ids: &Array2<i64>,
        style_ttl: &Array3<f32>,
        text_mask: &Array3<f32>,
    ) -> Result<Array3<f32>>;

    /// One denoising step: current latent in, denoised latent out.
    #[allow(clippy::too_many_arguments)]
    fn estimate_vector(
        &self,
        noisy_latent: &Array3<f32>,
        text_emb: &Array3<f32>,
        style_ttl: &Array3<f32>,
        latent_mask: &Array3<f32>,
        text_mask: &Array3<f32>,
        current_step: usize,
        total_step: usize,
    ) -> Result<Array3<f32>>;

    /// Final latent → raw waveform rows, shape `(batch, samples)`.
    fn vocode(&self, latent: &Array3<f32>) -> Result<Array2<f32>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tensor plumbing
// ─────────────────────────────────────────────────────────────────────────────

// All reshaping between ndarray and the flat ORT layout is row-major
// (batch, then channel, then time); model I/O is shape-contracted on that.

fn tensor2_i64(a: &Array2<i64>) -> Result<Tensor<i64>> {
    let (b, l) = a.dim();
    Tensor::<i64>::from_array(([b, l], a.iter().copied().collect::<Vec<i64>>()))
        .context("failed to build i64 input tensor")
}

fn tensor3_f32(a: &Array3<f32>) -> Result<Tensor<f32>> {
    let (b, d, t) = a.dim();
    Tensor::<f32>::from_array(([b, d, t], a.iter().copied().collect::<Vec<f32>>()))
        .context("failed to build f32 input tensor")
}

fn tensor1_f32(data: Vec<f32>) -> Result<Tensor<f32>> {
    let len = data.len();
    Tensor::<f32>::from_array(([len], data)).context("failed to build scalar input tensor")
}

// ─────────────────────────────────────────────────────────────────────────────
// OrtBackend
// ─────────────────────────────────────────────────────────────────────────────

/// Filenames of the four ONNX graphs inside a model directory.
pub const DURATION_PREDICTOR_FILE: &str = "duration_predictor.onnx";
pub const TEXT_ENCODER_FILE: &str = "text_encoder.onnx";
pub const VECTOR_ESTIMATOR_FILE: &str = "vector_estimator.onnx";
pub const VOCODER_FILE: &str = "vocoder.onnx";

/// ONNX Runtime implementation of all four stages.
///
/// Each session sits behind a `Mutex` so synthesis can run with `&self`
/// while `Session::run` requires exclusive access.
pub struct OrtBackend {
    duration_predictor: Mutex<Session>,
    text_encoder: Mutex<Session>,
    vector_estimator: Mutex<Session>,
    vocoder: Mutex<Session>,
}

impl OrtBackend {
    /// Load the four graphs from explicit file paths.
    pub fn from_files(
        duration_predictor: &Path,
        text_encoder: &Path,
        vector_estimator: &Path,
        vocoder: &Path,
    ) -> Result<Self> {
        let load = |path: &Path| -> Result<Mutex<Session>> {
            let session = Session::builder()
                .context("failed to create ORT session builder")?
                .commit_from_file(path)
                .with_context(|| format!("cannot load ONNX model: {}", path.display()))?;
            Ok(Mutex::new(session))
        };
        Ok(Self {
            duration_predictor: load(duration_predictor)?,
            text_encoder: load(text_encoder)?,
            vector_estimator: load(vector_estimator)?,
            vocoder: load(vocoder)?,
        })
    }

    /// Load the four graphs by their conventional filenames in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::from_files(
            &dir.join(DURATION_PREDICTOR_FILE),
            &dir.join(TEXT_ENCODER_FILE),
            &dir.join(VECTOR_ESTIMATOR_FILE),
            &dir.join(VOCODER_FILE),
        )
    }

    /// Load the four graphs from in-memory bytes.
    pub fn from_memory(
        duration_predictor: &[u8],
        text_encoder: &[u8],
        vector_estimator: &[u8],
        vocoder: &[u8],
    ) -> Result<Self> {
        let load = |bytes: &[u8], name: &str| -> Result<Mutex<Session>> {
            let session = Session::builder()
                .context("failed to create ORT session builder")?
                .commit_from_memory(bytes)
                .with_context(|| format!("cannot load ONNX model from bytes: {name}"))?;
            Ok(Mutex::new(session))
        };
        Ok(Self {
            duration_predictor: load(duration_predictor, "duration predictor")?,
            text_encoder: load(text_encoder, "text encoder")?,
            vector_estimator: load(vector_estimator, "vector estimator")?,
            vocoder: load(vocoder, "vocoder")?,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn predict_duration(
        &self,
        text_ids: &Array2<i64>,
        style_dp: &Array3<f32>,
        text_mask: &Array3<f32>,
    ) -> Result<Vec<f32>> {
        let mut session = self
            .duration_predictor
            .lock()
            .expect("duration predictor session mutex poisoned");
        let outputs = session
            .run(ort::inputs! {
                "text_ids" => tensor2_i64(text_ids)?,
                "style_dp" => tensor3_f32(style_dp)?,
                "text_mask" => tensor3_f32(text_mask)?,
            })
            .context("duration predictor inference failed")?;

        let (_, data) = outputs["duration"]
            .try_extract_tensor::<f32>()
            .context("failed to extract duration tensor")?;
        Ok(data.to_vec())
    }

    fn encode_text(
        &self,
        text_ids: &Array2<i64>,
        style_ttl: &Array3<f32>,
        text_mask: &Array3<f32>,
    ) -> Result<Array3<f32>> {
        let mut session = self
            .text_encoder
            .lock()
            .expect("text encoder session mutex poisoned");
        let outputs = session
            .run(ort::inputs! {
                "text_ids" => tensor2_i64(text_ids)?,
                "style_ttl" => tensor3_f32(style_ttl)?,
                "text_mask" => tensor3_f32(text_mask)?,
            })
            .context("text encoder inference failed")?;

        let (shape, data) = outputs["text_emb"]
            .try_extract_tensor::<f32>()
            .context("failed to extract text embedding tensor")?;
        Array3::from_shape_vec(
            (shape[0] as usize, shape[1] as usize, shape[2] as usize),
            data.to_vec(),
        )
        .context("text embedding shape mismatch")
    }

    fn estimate_vector(
        &self,
        noisy_latent: &Array3<f32>,
        text_emb: &Array3<f32>,
        style_ttl: &Array3<f32>,
        latent_mask: &Array3<f32>,
        text_mask: &Array3<f32>,
        current_step: usize,
        total_step: usize,
    ) -> Result<Array3<f32>> {
        let bsz = noisy_latent.dim().0;
        let mut session = self
            .vector_estimator
            .lock()
            .expect("vector estimator session mutex poisoned");
        let outputs = session
            .run(ort::inputs! {
                "noisy_latent" => tensor3_f32(noisy_latent)?,
                "text_emb" => tensor3_f32(text_emb)?,
                "style_ttl" => tensor3_f32(style_ttl)?,
                "latent_mask" => tensor3_f32(latent_mask)?,
                "text_mask" => tensor3_f32(text_mask)?,
                "current_step" => tensor1_f32(vec![current_step as f32; bsz])?,
                "total_step" => tensor1_f32(vec![total_step as f32; bsz])?,
            })
            .context("vector estimator inference failed")?;

        let (shape, data) = outputs["denoised_latent"]
            .try_extract_tensor::<f32>()
            .context("failed to extract denoised latent tensor")?;
        Array3::from_shape_vec(
            (shape[0] as usize, shape[1] as usize, shape[2] as usize),
            data.to_vec(),
        )
        .context("denoised latent shape mismatch")
    }

    fn vocode(&self, latent: &Array3<f32>) -> Result<Array2<f32>> {
        let bsz = latent.dim().0;
        let mut session = self
            .vocoder
            .lock()
            .expect("vocoder session mutex poisoned");
        let outputs = session
            .run(ort::inputs! {
                "latent" => tensor3_f32(latent)?,
            })
            .context("vocoder inference failed")?;

        let (_, data) = outputs["wav_tts"]
            .try_extract_tensor::<f32>()
            .context("failed to extract waveform tensor")?;
        let samples_per_item = data.len() / bsz.max(1);
        Array2::from_shape_vec((bsz, samples_per_item), data.to_vec())
            .context("waveform shape mismatch")
    }
}
