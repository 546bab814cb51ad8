use serde::{Deserialize, Serialize};

use crate::transcription::domain::transcript::Transcript;

use super::pipeline_error::PipelineError;

/// JSON envelope returned to callers: either `{"transcription": ...}` or
/// `{"error": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptionResponse {
    Success { transcription: String },
    Failure { error: String },
}

impl TranscriptionResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, TranscriptionResponse::Success { .. })
    }
}

impl From<&Result<Transcript, PipelineError>> for TranscriptionResponse {
    fn from(result: &Result<Transcript, PipelineError>) -> Self {
        match result {
            Ok(transcript) => TranscriptionResponse::Success {
                transcription: transcript.text.clone(),
            },
            Err(e) => TranscriptionResponse::Failure {
                error: e.user_message(),
            },
        }
    }
}
