use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{DEFAULT_LANGUAGE, DEFAULT_MODEL};

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("service returned status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("failed to read segment: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Json,
    VerboseJson,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::VerboseJson => "verbose_json",
        }
    }
}

/// Fixed per-request parameters sent with every segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionParams {
    pub model: String,
    pub language: String,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl Default for TranscriptionParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            temperature: 0.0,
            response_format: ResponseFormat::VerboseJson,
        }
    }
}

/// Domain interface for the remote speech-to-text service.
///
/// Called concurrently from dispatcher workers; each call blocks until the
/// service answers or the implementation's own timeout elapses.
pub trait TranscriptionService: Send + Sync {
    fn transcribe(
        &self,
        segment: &[u8],
        params: &TranscriptionParams,
    ) -> Result<String, TranscriptionError>;
}
