//! Error taxonomy for the synthesis pipeline.
//!
//! Every failure is surfaced to the caller exactly once, tagged with the
//! place it originated (a pipeline stage for model invocations, an asset name
//! for loading).  The library performs no retries and swallows nothing; the
//! caller decides whether to retry, fall back, or report.

use thiserror::Error;

/// Pipeline stage at which a model invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DurationPredictor,
    TextEncoder,
    VectorEstimator,
    Vocoder,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::DurationPredictor => "duration predictor",
            Stage::TextEncoder => "text encoder",
            Stage::VectorEstimator => "vector estimator",
            Stage::Vocoder => "vocoder",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Language tag outside the supported set (`en`, `ko`, `es`, `pt`, `fr`).
    #[error("unsupported language '{0}' (available: en, ko, es, pt, fr)")]
    InvalidLanguage(String),

    /// Unknown voice identifier.
    #[error("unknown voice '{0}' (available: M1-M5, F1-F5)")]
    InvalidVoice(String),

    /// Voice style tensors with a batch dimension other than 1.
    /// Synthesis is single-speaker; multi-style batches are rejected up front.
    #[error("voice style batch dimension must be 1, got {0}")]
    UnsupportedStyleShape(usize),

    /// Input text is empty (or whitespace-only) after trimming.
    #[error("input text is empty")]
    EmptyText,

    /// A synthesis parameter is out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// `synthesize` called before any voice was loaded.
    #[error("no voice loaded — call load_voice first")]
    NoVoiceLoaded,

    /// An external model invocation failed.  The chunk and the overall
    /// synthesis call are aborted; no partial audio is returned.
    #[error("{stage} invocation failed: {reason}")]
    Backend {
        stage: Stage,
        reason: anyhow::Error,
    },

    /// Loading or parsing a model asset (config, indexer, style, ONNX graph)
    /// failed.  The engine stays in its prior valid state.
    #[error("failed to load {asset}: {reason}")]
    AssetLoad {
        asset: String,
        reason: anyhow::Error,
    },

    /// WAV container writing failed.
    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),
}

impl Error {
    pub(crate) fn backend(stage: Stage, reason: anyhow::Error) -> Self {
        Error::Backend { stage, reason }
    }

    pub(crate) fn asset(asset: impl Into<String>, reason: anyhow::Error) -> Self {
        Error::AssetLoad { asset: asset.into(), reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
