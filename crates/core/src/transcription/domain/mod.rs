pub mod transcript;
pub mod transcription_outcome;
pub mod transcription_service;
