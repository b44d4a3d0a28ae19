//! # flowtts
//!
//! On-device text-to-speech built on four ONNX graphs: a duration predictor,
//! a text encoder, a flow-matching vector estimator, and a vocoder.  Text in,
//! 16-bit PCM WAV out; no network access at synthesis time.
//!
//! ## Quick start
//!
//! ```no_run
//! use flowtts::{download, Lang, SynthesisOptions, Voice};
//!
//! // Download the model from HuggingFace (cached after first run)
//! let mut tts = download::load_default().unwrap();
//! let style = download::fetch_voice(download::DEFAULT_REPO, Voice::F1).unwrap();
//! tts.load_voice(Voice::F1, style).unwrap();
//!
//! // Synthesise and write a WAV file
//! let audio = tts
//!     .synthesize("Hello from Rust!", Lang::En, &SynthesisOptions::default(), None)
//!     .unwrap();
//! audio.write_wav(std::path::Path::new("output.wav")).unwrap();
//! ```
//!
//! ## Pipeline
//! 1. **Normalisation** — NFKD, symbol substitutions, whitespace collapse,
//!    then language tagging (`<en>…</en>`).
//! 2. **Chunking** — long texts split at sentence boundaries into chunks of
//!    at most 300 characters (120 for Korean).
//! 3. **Tokenisation** — code points mapped through the vocabulary table.
//! 4. **Inference** — duration prediction, text encoding, a fixed number of
//!    denoising steps over a sampled latent, then vocoding.
//! 5. **Concat** — chunk waveforms joined with a configurable silence gap.
//! 6. **WAV** — mono 16-bit PCM at the model's sample rate.

pub mod backend;
pub mod chunk;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod latent;
pub mod normalize;
pub mod style;
pub mod tokenize;
pub mod wav;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use backend::{InferenceBackend, OrtBackend};
pub use config::Config;
pub use engine::{Synthesis, SynthesisOptions, TextToSpeech};
pub use error::{Error, Result, Stage};
pub use normalize::Lang;
pub use style::{Style, Voice};
pub use tokenize::UnicodeIndexer;
