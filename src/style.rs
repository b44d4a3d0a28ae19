//! Voice styles — the learned embedding pair conditioning every synthesis.
//!
//! A style file is JSON holding two named tensors: `style_ttl` conditions the
//! text encoder and vector estimator, `style_dp` conditions the duration
//! predictor.  Styles are loaded once per voice and shared read-only across
//! synthesis calls.

use std::path::Path;

use anyhow::Context;
use ndarray::Array3;
use serde::Deserialize;

use crate::error::{Error, Result};

/// The ten stock voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Voice {
    M1,
    M2,
    M3,
    M4,
    M5,
    F1,
    F2,
    F3,
    F4,
    F5,
}

impl Voice {
    pub const ALL: [Voice; 10] = [
        Voice::M1,
        Voice::M2,
        Voice::M3,
        Voice::M4,
        Voice::M5,
        Voice::F1,
        Voice::F2,
        Voice::F3,
        Voice::F4,
        Voice::F5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Voice::M1 => "M1",
            Voice::M2 => "M2",
            Voice::M3 => "M3",
            Voice::M4 => "M4",
            Voice::M5 => "M5",
            Voice::F1 => "F1",
            Voice::F2 => "F2",
            Voice::F3 => "F3",
            Voice::F4 => "F4",
            Voice::F5 => "F5",
        }
    }

    /// Style file path inside a model repository.
    pub fn style_path(self) -> String {
        format!("voice_styles/{}.json", self.as_str())
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Voice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Voice::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidVoice(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Style file schema
// ─────────────────────────────────────────────────────────────────────────────

/// One named tensor inside a voice style file: nested data plus shape dims.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleComponent {
    pub data: Vec<Vec<Vec<f32>>>,
    pub dims: Vec<usize>,
    #[serde(rename = "type")]
    pub dtype: String,
}

impl StyleComponent {
    fn into_array(self, name: &str) -> Result<Array3<f32>> {
        let dims = self.dims.clone();
        if dims.len() != 3 {
            return Err(Error::asset(
                name,
                anyhow::anyhow!("expected 3 dims, got {:?}", dims),
            ));
        }
        let flat: Vec<f32> = self.data.into_iter().flatten().flatten().collect();
        Array3::from_shape_vec((dims[0], dims[1], dims[2]), flat)
            .with_context(|| format!("tensor data does not match dims {:?}", dims))
            .map_err(|e| Error::asset(name, e))
    }
}

/// Deserialised voice style file.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceStyleData {
    pub style_ttl: StyleComponent,
    pub style_dp: StyleComponent,
}

/// A voice's embedding tensors, ready for the backend.
pub struct Style {
    pub ttl: Array3<f32>,
    pub dp: Array3<f32>,
}

impl Style {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let data: VoiceStyleData = serde_json::from_slice(bytes)
            .context("cannot parse voice style JSON")
            .map_err(|e| Error::asset("voice style", e))?;
        Ok(Self {
            ttl: data.style_ttl.into_array("voice style (ttl)")?,
            dp: data.style_dp.into_array("voice style (dp)")?,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))
            .map_err(|e| Error::asset("voice style", e))?;
        Self::from_json_bytes(&bytes)
    }

    /// Leading (batch) dimension of the `ttl` tensor.
    pub fn batch_size(&self) -> usize {
        self.ttl.dim().0
    }

    /// Synthesis is single-speaker: reject multi-style batches up front.
    pub fn ensure_single(&self) -> Result<()> {
        match self.batch_size() {
            1 => Ok(()),
            n => Err(Error::UnsupportedStyleShape(n)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
