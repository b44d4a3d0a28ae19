//! The synthesis engine — per-chunk inference pipeline and the orchestrator
//! that drives it across a whole document.
//!
//! Per chunk the pipeline is strictly ordered: duration prediction → text
//! encoding → latent sampling → fixed-step denoising → vocoding.  There are
//! no backward transitions and no convergence check; the step budget is the
//! caller's latency/quality knob.  Chunks are processed sequentially to
//! bound peak memory and keep the progress callback linear; a failed model
//! call aborts the chunk and the whole synthesis call with the originating
//! stage attached.

use std::path::Path;

use ndarray::Array2;

use crate::backend::InferenceBackend;
use crate::chunk::{chunk_text, max_chunk_len};
use crate::config::Config;
use crate::error::{Error, Result, Stage};
use crate::latent::sample_noisy_latent;
use crate::normalize::{normalize, Lang};
use crate::style::{Style, Voice};
use crate::tokenize::UnicodeIndexer;
use crate::wav;

/// Observation hook for the denoising loop: called with
/// `(step, total_step)` before each step's computation.  Not a cancellation
/// point.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize);

/// Caller-tunable synthesis parameters.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Denoising step budget; more steps, higher fidelity, more latency.
    pub total_step: usize,
    /// Playback speed factor; values above 1 shorten the audio.
    pub speed: f32,
    /// Silence inserted between chunks, in seconds.
    pub silence_duration: f32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self { total_step: 16, speed: 1.0, silence_duration: 0.3 }
    }
}

impl SynthesisOptions {
    fn validate(&self) -> Result<()> {
        if self.total_step == 0 {
            return Err(Error::InvalidParameter(
                "total_step must be at least 1".into(),
            ));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(Error::InvalidParameter(
                "speed must be a positive number".into(),
            ));
        }
        if !(self.silence_duration.is_finite() && self.silence_duration >= 0.0) {
            return Err(Error::InvalidParameter(
                "silence_duration must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// A finished synthesis: raw samples plus the reported duration.
#[derive(Debug)]
pub struct Synthesis {
    /// Mono samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Total duration in seconds, including inter-chunk silence.
    pub duration: f32,
    /// Sample rate the samples were generated at.
    pub sample_rate: u32,
}

impl Synthesis {
    /// Serialise to an in-memory 16-bit PCM WAV buffer.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        wav::encode_wav(&self.samples, self.sample_rate)
    }

    /// Write a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        wav::write_wav_file(path, &self.samples, self.sample_rate)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TextToSpeech
// ─────────────────────────────────────────────────────────────────────────────

/// The synthesis engine: model config, indexer, backend, and the single
/// mutable current-voice slot.
///
/// The voice slot changes only through [`load_voice`](Self::load_voice) —
/// never implicitly from call arguments.  `load_voice` takes `&mut self`
/// while synthesis takes `&self`, so a reload cannot interleave with a
/// running synthesis on the same instance.
pub struct TextToSpeech<B: InferenceBackend> {
    config: Config,
    indexer: UnicodeIndexer,
    backend: B,
    voice: Option<(Voice, Style)>,
}

impl<B: InferenceBackend> TextToSpeech<B> {
    pub fn new(config: Config, indexer: UnicodeIndexer, backend: B) -> Self {
        Self { config, indexer, backend, voice: None }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output sample rate, fixed by the loaded configuration.
    pub fn sample_rate(&self) -> u32 {
        self.config.ae.sample_rate
    }

    /// Replace the current voice.  Rejects multi-style batches; on error the
    /// previous voice stays loaded.
    pub fn load_voice(&mut self, voice: Voice, style: Style) -> Result<()> {
        style.ensure_single()?;
        self.voice = Some((voice, style));
        Ok(())
    }

    /// The voice currently in the slot, if any.
    pub fn current_voice(&self) -> Option<Voice> {
        self.voice.as_ref().map(|(v, _)| *v)
    }

    /// Synthesise `text` with the loaded voice.
    pub fn synthesize(
        &self,
        text: &str,
        lang: Lang,
        opts: &SynthesisOptions,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Synthesis> {
        let (_, style) = self.voice.as_ref().ok_or(Error::NoVoiceLoaded)?;
        self.synthesize_with_style(text, lang, style, opts, progress)
    }

    /// Synthesise `text` with an explicit style, bypassing the voice slot.
    ///
    /// Long text is chunked at sentence boundaries (120-char limit for
    /// Korean, 300 otherwise); chunk waveforms are concatenated with
    /// `silence_duration` seconds of zeros at each seam, and the reported
    /// duration accumulates chunk durations plus one silence per seam.
    pub fn synthesize_with_style(
        &self,
        text: &str,
        lang: Lang,
        style: &Style,
        opts: &SynthesisOptions,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<Synthesis> {
        opts.validate()?;
        style.ensure_single()?;

        let chunks = chunk_text(text, max_chunk_len(lang));
        if chunks.is_empty() {
            return Err(Error::EmptyText);
        }

        let sample_rate = self.config.ae.sample_rate;
        let mut wav_cat: Vec<f32> = Vec::new();
        let mut dur_cat = 0.0f32;

        for (i, chunk) in chunks.iter().enumerate() {
            let cb = progress
                .as_mut()
                .map(|cb| &mut **cb as &mut dyn FnMut(usize, usize));
            let (wav, durations) =
                self.infer(std::slice::from_ref(chunk), &[lang], style, opts, cb)?;

            let dur = durations[0];
            let wav_len = ((sample_rate as f32 * dur) as usize).min(wav.dim().1);
            let row = wav.row(0);
            let chunk_samples = row.iter().take(wav_len).copied();

            if i == 0 {
                wav_cat.extend(chunk_samples);
                dur_cat = dur;
            } else {
                let silence_len = (opts.silence_duration * sample_rate as f32) as usize;
                wav_cat.extend(std::iter::repeat(0.0f32).take(silence_len));
                wav_cat.extend(chunk_samples);
                dur_cat += opts.silence_duration + dur;
            }
        }

        Ok(Synthesis { samples: wav_cat, duration: dur_cat, sample_rate })
    }

    /// Run several texts through the pipeline as one batch — one model
    /// invocation per stage — and split the result per item.  No chunking:
    /// each text is a single inference unit.
    pub fn synthesize_batch(
        &self,
        texts: &[String],
        langs: &[Lang],
        style: &Style,
        opts: &SynthesisOptions,
    ) -> Result<Vec<Synthesis>> {
        opts.validate()?;
        style.ensure_single()?;
        if texts.len() != langs.len() {
            return Err(Error::InvalidParameter(format!(
                "texts ({}) and langs ({}) must have equal length",
                texts.len(),
                langs.len()
            )));
        }
        if texts.is_empty() || texts.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::EmptyText);
        }

        let (wav, durations) = self.infer(texts, langs, style, opts, None)?;
        let sample_rate = self.config.ae.sample_rate;

        Ok(durations
            .iter()
            .enumerate()
            .map(|(i, &dur)| {
                let wav_len = ((sample_rate as f32 * dur) as usize).min(wav.dim().1);
                Synthesis {
                    samples: wav.row(i).iter().take(wav_len).copied().collect(),
                    duration: dur,
                    sample_rate,
                }
            })
            .collect())
    }

    /// One pipeline pass over a batch: returns the raw vocoded waveform rows
    /// (untrimmed) and the speed-adjusted per-item durations.
    fn infer(
        &self,
        texts: &[String],
        langs: &[Lang],
        style: &Style,
        opts: &SynthesisOptions,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<(Array2<f32>, Vec<f32>)> {
        let bsz = texts.len();
        let normalized: Vec<String> = texts
            .iter()
            .zip(langs)
            .map(|(t, &l)| normalize(t, l))
            .collect();
        let (text_ids, text_mask) = self.indexer.encode_batch(&normalized);

        // Duration prediction, then speed adjustment.
        let mut durations = self
            .backend
            .predict_duration(&text_ids, &style.dp, &text_mask)
            .map_err(|e| Error::backend(Stage::DurationPredictor, e))?;
        if durations.len() != bsz {
            return Err(Error::backend(
                Stage::DurationPredictor,
                anyhow::anyhow!("expected {} durations, got {}", bsz, durations.len()),
            ));
        }
        for d in durations.iter_mut() {
            *d /= opts.speed;
        }

        // Text embedding, held fixed for the rest of the chunk.
        let text_emb = self
            .backend
            .encode_text(&text_ids, &style.ttl, &text_mask)
            .map_err(|e| Error::backend(Stage::TextEncoder, e))?;

        // Initial noise sized from the adjusted durations.
        let mut rng = rand::thread_rng();
        let (mut latent, latent_mask) = sample_noisy_latent(
            &durations,
            self.config.ae.sample_rate,
            self.config.ae.base_chunk_size,
            self.config.ttl.chunk_compress_factor,
            self.config.ttl.latent_dim,
            &mut rng,
        );

        // Fixed-step denoising; each step consumes the previous step's output.
        for step in 0..opts.total_step {
            if let Some(cb) = progress.as_mut() {
                cb(step + 1, opts.total_step);
            }
            latent = self
                .backend
                .estimate_vector(
                    &latent,
                    &text_emb,
                    &style.ttl,
                    &latent_mask,
                    &text_mask,
                    step,
                    opts.total_step,
                )
                .map_err(|e| Error::backend(Stage::VectorEstimator, e))?;
        }

        let wav = self
            .backend
            .vocode(&latent)
            .map_err(|e| Error::backend(Stage::Vocoder, e))?;

        Ok((wav, durations))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use ndarray::{Array2, Array3};

    use crate::config::{AeConfig, TtlConfig};
    use crate::style::Voice;
    use crate::tokenize::UnicodeIndexer;

    /// Deterministic stand-in for the four ONNX sessions.  Durations come
    /// from a queue (one pop per batch item), the vocoder emits a constant
    /// signal exactly covering the latent's waveform span.
    struct MockBackend {
        samples_per_frame: usize,
        durations: RefCell<VecDeque<f32>>,
        default_duration: f32,
        fail_stage: Option<Stage>,
    }

    impl MockBackend {
        fn new(samples_per_frame: usize) -> Self {
            Self {
                samples_per_frame,
                durations: RefCell::new(VecDeque::new()),
                default_duration: 0.5,
                fail_stage: None,
            }
        }

        fn with_durations(mut self, durations: &[f32]) -> Self {
            self.durations = RefCell::new(durations.iter().copied().collect());
            self
        }

        fn failing_at(mut self, stage: Stage) -> Self {
            self.fail_stage = Some(stage);
            self
        }

        fn check(&self, stage: Stage) -> anyhow::Result<()> {
            if self.fail_stage == Some(stage) {
                anyhow::bail!("mock backend failure");
            }
            Ok(())
        }
    }

    impl InferenceBackend for MockBackend {
        fn predict_duration(
            &self,
            text_ids: &Array2<i64>,
            _style_dp: &Array3<f32>,
            _text_mask: &Array3<f32>,
        ) -> anyhow::Result<Vec<f32>> {
            self.check(Stage::DurationPredictor)?;
            let mut queue = self.durations.borrow_mut();
            Ok((0..text_ids.dim().0)
                .map(|_| queue.pop_front().unwrap_or(self.default_duration))
                .collect())
        }

        fn encode_text(
            &self,
            text_ids: &Array2<i64>,
            _style_ttl: &Array3<f32>,
            _text_mask: &Array3<f32>,
        ) -> anyhow::Result<Array3<f32>> {
            self.check(Stage::TextEncoder)?;
            let (bsz, seq_len) = text_ids.dim();
            Ok(Array3::zeros((bsz, 4, seq_len)))
        }

        fn estimate_vector(
            &self,
            noisy_latent: &Array3<f32>,
            _text_emb: &Array3<f32>,
            _style_ttl: &Array3<f32>,
            _latent_mask: &Array3<f32>,
            _text_mask: &Array3<f32>,
            _current_step: usize,
            _total_step: usize,
        ) -> anyhow::Result<Array3<f32>> {
            self.check(Stage::VectorEstimator)?;
            Ok(noisy_latent.mapv(|v| v * 0.5))
        }

        fn vocode(&self, latent: &Array3<f32>) -> anyhow::Result<Array2<f32>> {
            self.check(Stage::Vocoder)?;
            let (bsz, _, latent_len) = latent.dim();
            Ok(Array2::from_elem(
                (bsz, latent_len * self.samples_per_frame),
                0.25,
            ))
        }
    }

    /// sample_rate 1000, chunk_size = 10 × 2 = 20 samples per latent frame.
    fn test_config() -> Config {
        Config {
            ae: AeConfig { sample_rate: 1000, base_chunk_size: 10 },
            ttl: TtlConfig { chunk_compress_factor: 2, latent_dim: 4 },
        }
    }

    fn test_engine(backend: MockBackend) -> TextToSpeech<MockBackend> {
        TextToSpeech::new(
            test_config(),
            UnicodeIndexer::new((0..0x3000).collect()),
            backend,
        )
    }

    fn test_style(batch: usize) -> Style {
        Style {
            ttl: Array3::zeros((batch, 4, 8)),
            dp: Array3::zeros((batch, 2, 4)),
        }
    }

    fn opts(total_step: usize, speed: f32, silence: f32) -> SynthesisOptions {
        SynthesisOptions { total_step, speed, silence_duration: silence }
    }

    #[test]
    fn test_end_to_end_single_chunk() {
        let mut engine = test_engine(MockBackend::new(20).with_durations(&[0.5]));
        engine.load_voice(Voice::F1, test_style(1)).unwrap();

        let out = engine
            .synthesize("Hello there.", Lang::En, &opts(2, 1.0, 0.3), None)
            .unwrap();
        assert_eq!(out.sample_rate, 1000);
        assert!((out.duration - 0.5).abs() < 1e-6);
        assert_eq!(out.samples.len(), 500);

        // WAV header agrees with the reported duration.
        let bytes = out.to_wav_bytes().unwrap();
        assert_eq!(bytes.len(), 44 + 2 * 500);
        let declared_rate =
            u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
        assert_eq!(declared_rate, 1000);
    }

    #[test]
    fn test_multi_chunk_concatenation() {
        // Two paragraphs → two chunks; durations 1.0 s and 1.5 s with a
        // 0.3 s seam → 2.8 s total, 2800 samples at 1 kHz.
        let mut engine = test_engine(MockBackend::new(20).with_durations(&[1.0, 1.5]));
        engine.load_voice(Voice::M3, test_style(1)).unwrap();

        let out = engine
            .synthesize(
                "First paragraph.\n\nSecond paragraph.",
                Lang::En,
                &opts(2, 1.0, 0.3),
                None,
            )
            .unwrap();
        assert!((out.duration - 2.8).abs() < 1e-6);
        assert_eq!(out.samples.len(), 2800);

        // The seam is silent.
        assert!(out.samples[1000..1300].iter().all(|&s| s == 0.0));
        assert_eq!(out.samples[999], 0.25);
        assert_eq!(out.samples[1300], 0.25);
    }

    #[test]
    fn test_speed_shortens_audio() {
        let mut engine = test_engine(MockBackend::new(20).with_durations(&[2.0]));
        engine.load_voice(Voice::M1, test_style(1)).unwrap();

        let out = engine
            .synthesize("Quickly now.", Lang::En, &opts(1, 2.0, 0.0), None)
            .unwrap();
        assert!((out.duration - 1.0).abs() < 1e-6);
        assert_eq!(out.samples.len(), 1000);
    }

    #[test]
    fn test_progress_callback_sequence() {
        let mut engine = test_engine(MockBackend::new(20).with_durations(&[1.0, 1.0]));
        engine.load_voice(Voice::F2, test_style(1)).unwrap();

        let mut seen: Vec<(usize, usize)> = Vec::new();
        let mut cb = |step: usize, total: usize| seen.push((step, total));
        engine
            .synthesize(
                "First paragraph.\n\nSecond paragraph.",
                Lang::En,
                &opts(2, 1.0, 0.1),
                Some(&mut cb),
            )
            .unwrap();
        assert_eq!(seen, vec![(1, 2), (2, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_multi_style_batch_rejected() {
        let engine = test_engine(MockBackend::new(20));
        let err = engine
            .synthesize_with_style("Hi.", Lang::En, &test_style(2), &opts(2, 1.0, 0.3), None)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedStyleShape(2)));
    }

    #[test]
    fn test_load_voice_rejects_multi_style() {
        let mut engine = test_engine(MockBackend::new(20));
        assert!(engine.load_voice(Voice::F1, test_style(2)).is_err());
        assert_eq!(engine.current_voice(), None);
    }

    #[test]
    fn test_no_voice_loaded() {
        let engine = test_engine(MockBackend::new(20));
        let err = engine
            .synthesize("Hi.", Lang::En, &opts(2, 1.0, 0.3), None)
            .unwrap_err();
        assert!(matches!(err, Error::NoVoiceLoaded));
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut engine = test_engine(MockBackend::new(20));
        engine.load_voice(Voice::F1, test_style(1)).unwrap();
        let err = engine
            .synthesize("   ", Lang::En, &opts(2, 1.0, 0.3), None)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyText));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut engine = test_engine(MockBackend::new(20));
        engine.load_voice(Voice::F1, test_style(1)).unwrap();
        for bad in [opts(0, 1.0, 0.3), opts(2, 0.0, 0.3), opts(2, 1.0, -0.1)] {
            let err = engine.synthesize("Hi.", Lang::En, &bad, None).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter(_)));
        }
    }

    #[test]
    fn test_backend_failure_carries_stage() {
        let mut engine =
            test_engine(MockBackend::new(20).failing_at(Stage::Vocoder));
        engine.load_voice(Voice::F1, test_style(1)).unwrap();
        let err = engine
            .synthesize("Hi.", Lang::En, &opts(2, 1.0, 0.3), None)
            .unwrap_err();
        match &err {
            Error::Backend { stage, .. } => assert_eq!(*stage, Stage::Vocoder),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("vocoder"));
    }

    #[test]
    fn test_voice_slot_replacement() {
        let mut engine = test_engine(MockBackend::new(20));
        engine.load_voice(Voice::M1, test_style(1)).unwrap();
        assert_eq!(engine.current_voice(), Some(Voice::M1));
        engine.load_voice(Voice::F4, test_style(1)).unwrap();
        assert_eq!(engine.current_voice(), Some(Voice::F4));
    }

    #[test]
    fn test_batch_synthesis_splits_per_item() {
        let mut engine = test_engine(MockBackend::new(20).with_durations(&[1.0, 0.5]));
        engine.load_voice(Voice::F5, test_style(1)).unwrap();

        let texts = vec!["One sentence.".to_string(), "Two.".to_string()];
        let langs = vec![Lang::En, Lang::En];
        let out = engine
            .synthesize_batch(&texts, &langs, &test_style(1), &opts(2, 1.0, 0.0))
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].samples.len(), 1000);
        assert_eq!(out[1].samples.len(), 500);
        assert!((out[0].duration - 1.0).abs() < 1e-6);
        assert!((out[1].duration - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_batch_length_mismatch_rejected() {
        let engine = test_engine(MockBackend::new(20));
        let err = engine
            .synthesize_batch(
                &["Hi.".to_string()],
                &[Lang::En, Lang::Fr],
                &test_style(1),
                &opts(2, 1.0, 0.0),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }
}
