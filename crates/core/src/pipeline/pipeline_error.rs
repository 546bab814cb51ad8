use thiserror::Error;

use crate::chunking::domain::chunk_plan::ChunkPlanError;
use crate::media::domain::media_error::{ProbeError, ProcessError};
use crate::shared::settings::SettingsError;

use super::segment_materializer::MaterializationFailed;

/// Errors that abort a whole run. Per-chunk failures never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] SettingsError),
    #[error("failed to stage upload: {0}")]
    Upload(#[source] std::io::Error),
    #[error("preprocessing failed: {0}")]
    Preprocess(#[source] ProcessError),
    #[error("probing failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("planning failed: {0}")]
    Plan(#[from] ChunkPlanError),
    #[error(transparent)]
    MaterializationFailed(#[from] MaterializationFailed),
}

impl PipelineError {
    /// Message returned to the caller in the error envelope.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidConfiguration(e) => format!("Invalid configuration: {e}"),
            PipelineError::Upload(e) => format!("Failed to save uploaded file: {e}"),
            PipelineError::Preprocess(e) => format!("Failed to preprocess audio: {e}"),
            PipelineError::Probe(e) => format!("Failed to analyze audio: {e}"),
            PipelineError::Plan(e) => format!("Failed to chunk audio: {e}"),
            PipelineError::MaterializationFailed(e) => format!("Failed to chunk audio: {e}"),
        }
    }
}
