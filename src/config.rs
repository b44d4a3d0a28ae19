//! Model configuration — the `tts.json` shipped alongside the ONNX graphs.
//!
//! The latent geometry of the pipeline is derived entirely from these four
//! values; nothing audio-related is hardcoded in the engine.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Deserialised `tts.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Autoencoder section.
    pub ae: AeConfig,
    /// Text-to-latent section.
    pub ttl: TtlConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AeConfig {
    /// Output sample rate in Hz (typically 22050 or 24000).
    pub sample_rate: u32,
    /// Waveform samples per uncompressed latent frame.
    pub base_chunk_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtlConfig {
    /// Latent time-axis compression factor.
    pub chunk_compress_factor: u32,
    /// Latent channel count before compression.
    pub latent_dim: u32,
}

impl Config {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .context("cannot parse model config JSON")
            .map_err(|e| Error::asset("model config", e))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))
            .map_err(|e| Error::asset("model config", e))?;
        Self::from_json_bytes(&bytes)
    }
}
