//! Model acquisition: HuggingFace Hub downloads and local directory loading.
//!
//! A model repository carries the four ONNX graphs plus `tts.json` and
//! `unicode_indexer.json` under `onnx/`, and per-voice style files under
//! `voice_styles/`.  Hub downloads are cached by hf-hub in its standard
//! cache directory, so repeat loads hit the network only for revision checks.

use std::path::{Path, PathBuf};

use anyhow::Context;
use hf_hub::api::sync::Api;

use crate::backend::{
    OrtBackend, DURATION_PREDICTOR_FILE, TEXT_ENCODER_FILE, VECTOR_ESTIMATOR_FILE, VOCODER_FILE,
};
use crate::config::Config;
use crate::engine::TextToSpeech;
use crate::error::{Error, Result};
use crate::style::{Style, Voice};
use crate::tokenize::UnicodeIndexer;

/// Repository the stock model ships from.
pub const DEFAULT_REPO: &str = "Supertone/supertonic";

/// Latent geometry and sample-rate configuration filename.
pub const CONFIG_FILE: &str = "tts.json";
/// Code-point vocabulary table filename.
pub const INDEXER_FILE: &str = "unicode_indexer.json";

/// Download a single file from a HuggingFace repository.
fn hf_download(api: &Api, repo_id: &str, filename: &str) -> anyhow::Result<PathBuf> {
    let repo = api.model(repo_id.to_string());
    repo.get(filename)
        .with_context(|| format!("failed to download '{}' from '{}'", filename, repo_id))
}

/// Download the model assets from a HuggingFace repository and build an
/// engine.  No voice is loaded; follow with [`fetch_voice`] and
/// [`TextToSpeech::load_voice`].
///
/// # Example
/// ```no_run
/// use flowtts::{download, Voice, Lang, SynthesisOptions};
///
/// let mut tts = download::load_from_hub(download::DEFAULT_REPO).unwrap();
/// let style = download::fetch_voice(download::DEFAULT_REPO, Voice::F1).unwrap();
/// tts.load_voice(Voice::F1, style).unwrap();
/// let audio = tts
///     .synthesize("Hello world.", Lang::En, &SynthesisOptions::default(), None)
///     .unwrap();
/// ```
pub fn load_from_hub(repo_id: &str) -> Result<TextToSpeech<OrtBackend>> {
    let api = Api::new()
        .context("failed to initialise HuggingFace Hub client")
        .map_err(|e| Error::asset("hub client", e))?;

    println!("Downloading config from {}…", repo_id);
    let config_path = hf_download(&api, repo_id, &format!("onnx/{CONFIG_FILE}"))
        .map_err(|e| Error::asset(CONFIG_FILE, e))?;
    let indexer_path = hf_download(&api, repo_id, &format!("onnx/{INDEXER_FILE}"))
        .map_err(|e| Error::asset(INDEXER_FILE, e))?;

    println!("Downloading ONNX models…");
    let mut model_paths = Vec::with_capacity(4);
    for file in [
        DURATION_PREDICTOR_FILE,
        TEXT_ENCODER_FILE,
        VECTOR_ESTIMATOR_FILE,
        VOCODER_FILE,
    ] {
        println!("  {}", file);
        let path =
            hf_download(&api, repo_id, &format!("onnx/{file}")).map_err(|e| Error::asset(file, e))?;
        model_paths.push(path);
    }

    println!("Loading model…");
    build_engine(
        &config_path,
        &indexer_path,
        &model_paths[0],
        &model_paths[1],
        &model_paths[2],
        &model_paths[3],
    )
}

/// Download one voice's style file from a HuggingFace repository.
pub fn fetch_voice(repo_id: &str, voice: Voice) -> Result<Style> {
    let api = Api::new()
        .context("failed to initialise HuggingFace Hub client")
        .map_err(|e| Error::asset("hub client", e))?;
    let path = hf_download(&api, repo_id, &voice.style_path())
        .map_err(|e| Error::asset(format!("voice style {voice}"), e))?;
    Style::from_json_file(&path)
}

/// Build an engine from a flat local directory holding `tts.json`,
/// `unicode_indexer.json`, and the four ONNX graphs.
pub fn load_from_dir(dir: &Path) -> Result<TextToSpeech<OrtBackend>> {
    build_engine(
        &dir.join(CONFIG_FILE),
        &dir.join(INDEXER_FILE),
        &dir.join(DURATION_PREDICTOR_FILE),
        &dir.join(TEXT_ENCODER_FILE),
        &dir.join(VECTOR_ESTIMATOR_FILE),
        &dir.join(VOCODER_FILE),
    )
}

/// Convenience alias for the stock repository.
pub fn load_default() -> Result<TextToSpeech<OrtBackend>> {
    load_from_hub(DEFAULT_REPO)
}

fn build_engine(
    config_path: &Path,
    indexer_path: &Path,
    duration_predictor: &Path,
    text_encoder: &Path,
    vector_estimator: &Path,
    vocoder: &Path,
) -> Result<TextToSpeech<OrtBackend>> {
    let config = Config::from_json_file(config_path)?;
    let indexer = UnicodeIndexer::from_json_file(indexer_path)?;
    let backend = OrtBackend::from_files(duration_predictor, text_encoder, vector_estimator, vocoder)
        .map_err(|e| Error::asset("onnx models", e))?;
    Ok(TextToSpeech::new(config, indexer, backend))
}
