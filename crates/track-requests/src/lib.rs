//! Request/response glue shared by the CLI and the HTTP service.
//!
//! A request carries a main track and an optional reference track, either as
//! filesystem paths or base64-encoded uploads. Each track is checked against
//! the upload limits, decoded, extracted and flattened into the
//! [`FeedbackMetadata`] shape.

pub mod feedback;
pub mod limits;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use track_features::{load_bytes, ExtractConfig, FeatureExtractor};

pub use feedback::{FeedbackMetadata, PeakRms, STRUCTURE_NOTE};
pub use limits::{audio_extension, LimitError, Limits, ALLOWED_EXTENSIONS};

#[derive(Clone, Serialize, Deserialize, Debug)]
pub enum InputPayload {
    Path { path: PathBuf },
    AudioBase64 { data_b64: String, filename: String },
}

/// Malformed request content, as opposed to a limit violation.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("audio payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub request_id: Option<String>,
    pub main: InputPayload,
    #[serde(default)]
    pub reference: Option<InputPayload>,
    /// Partial overrides of the extraction defaults.
    #[serde(default)]
    pub config: Option<ExtractConfig>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AnalyzeResponse {
    pub request_id: String,
    pub main: FeedbackMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<FeedbackMetadata>,
}

/// Encoded audio that passed the extension and size checks.
#[derive(Clone, Debug)]
pub struct LoadedInput {
    pub name: String,
    pub ext: String,
    pub bytes: Vec<u8>,
}

impl InputPayload {
    pub fn load(&self, limits: &Limits) -> Result<LoadedInput> {
        match self {
            InputPayload::Path { path } => {
                let name = path.display().to_string();
                let ext = audio_extension(&name)?;
                let meta = fs::metadata(path).with_context(|| format!("failed reading audio: {name}"))?;
                limits.check_size(meta.len())?;
                let bytes = fs::read(path).with_context(|| format!("failed reading audio: {name}"))?;
                Ok(LoadedInput { name, ext, bytes })
            }
            InputPayload::AudioBase64 { data_b64, filename } => {
                let ext = audio_extension(filename)?;
                // reject oversized uploads before allocating the decoded buffer
                limits.check_size(data_b64.len() as u64 / 4 * 3)?;
                let bytes = B64.decode(data_b64.trim()).map_err(PayloadError::from)?;
                limits.check_size(bytes.len() as u64)?;
                Ok(LoadedInput { name: filename.clone(), ext, bytes })
            }
        }
    }
}

/// Decode, enforce the duration limit and extract one track.
pub fn analyze_input(extractor: &FeatureExtractor, input: &LoadedInput, limits: &Limits) -> Result<FeedbackMetadata> {
    let wave = load_bytes(&input.bytes, Some(&input.ext)).with_context(|| format!("failed decoding {}", input.name))?;
    limits.check_duration(wave.duration_sec())?;
    Ok(extractor.extract(&wave).into())
}

/// The caller's id when it is non-blank, otherwise a fresh UUID v4.
pub fn request_id(provided: Option<&str>) -> String {
    match provided.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    }
}

pub fn extractor_for(config: Option<&ExtractConfig>) -> Result<FeatureExtractor> {
    let config = config.cloned().unwrap_or_default();
    Ok(FeatureExtractor::new(config)?)
}

/// Run a request to completion on the current thread.
pub fn handle_analyze(req: AnalyzeRequest, limits: &Limits) -> Result<AnalyzeResponse> {
    let request_id = request_id(req.request_id.as_deref());
    let extractor = extractor_for(req.config.as_ref())?;

    let main = analyze_input(&extractor, &req.main.load(limits)?, limits).context("main track")?;
    let reference = match &req.reference {
        Some(payload) => Some(analyze_input(&extractor, &payload.load(limits)?, limits).context("reference track")?),
        None => None,
    };
    info!(%request_id, with_reference = reference.is_some(), "analysis complete");
    Ok(AnalyzeResponse { request_id, main, reference })
}
