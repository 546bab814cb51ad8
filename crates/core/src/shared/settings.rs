use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunking::domain::chunk_plan::{ChunkPlanError, ChunkingParams};
use crate::media::domain::media_transcoder::{AudioCodec, OutputSpec};
use crate::shared::constants::{
    DEFAULT_DISPATCHER_WORKERS, DEFAULT_ENDPOINT, DEFAULT_LANGUAGE, DEFAULT_MODEL,
    DEFAULT_OVERLAP_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WINDOW_MS, PREPROCESS_CHANNELS,
    PREPROCESS_SAMPLE_RATE,
};
use crate::transcription::domain::transcription_service::{ResponseFormat, TranscriptionParams};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Chunking(#[from] ChunkPlanError),
    #[error("{0} must be at least 1")]
    ZeroValue(&'static str),
    #[error("service endpoint is empty")]
    EmptyEndpoint,
}

/// Every tunable of a pipeline run.
///
/// Missing fields in a settings file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window_ms: f64,
    pub overlap_ms: f64,
    /// `None` sizes the pool from the detected processing-unit count.
    pub materializer_workers: Option<usize>,
    pub dispatcher_workers: usize,
    pub request_timeout_secs: u64,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub language: String,
    pub temperature: f32,
    pub response_format: ResponseFormat,
    pub preprocess_sample_rate: u32,
    pub preprocess_channels: u16,
    /// `None` uses the system temp directory.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            overlap_ms: DEFAULT_OVERLAP_MS,
            materializer_workers: None,
            dispatcher_workers: DEFAULT_DISPATCHER_WORKERS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            temperature: 0.0,
            response_format: ResponseFormat::VerboseJson,
            preprocess_sample_rate: PREPROCESS_SAMPLE_RATE,
            preprocess_channels: PREPROCESS_CHANNELS,
            scratch_dir: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Chunkscribe").join("settings.json"))
    }

    /// Loads the platform settings file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Loads an explicitly named settings file; errors are surfaced.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks every parameter without touching the filesystem or network.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.chunking()?;
        if self.materializer_workers == Some(0) {
            return Err(SettingsError::ZeroValue("materializer_workers"));
        }
        if self.dispatcher_workers == 0 {
            return Err(SettingsError::ZeroValue("dispatcher_workers"));
        }
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::ZeroValue("request_timeout_secs"));
        }
        if self.preprocess_sample_rate == 0 {
            return Err(SettingsError::ZeroValue("preprocess_sample_rate"));
        }
        if self.preprocess_channels == 0 {
            return Err(SettingsError::ZeroValue("preprocess_channels"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(SettingsError::EmptyEndpoint);
        }
        Ok(())
    }

    pub fn chunking(&self) -> Result<ChunkingParams, ChunkPlanError> {
        ChunkingParams::new(self.window_ms, self.overlap_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn transcription_params(&self) -> TranscriptionParams {
        TranscriptionParams {
            model: self.model.clone(),
            language: self.language.clone(),
            temperature: self.temperature,
            response_format: self.response_format,
        }
    }

    pub fn preprocess_spec(&self) -> OutputSpec {
        OutputSpec {
            sample_rate: self.preprocess_sample_rate,
            channels: self.preprocess_channels,
            codec: AudioCodec::Flac,
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
