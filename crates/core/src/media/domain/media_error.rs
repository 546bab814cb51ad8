use std::path::PathBuf;

use thiserror::Error;

/// Failure of a transcode or segment extraction.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
    #[error("no audio stream in {0}")]
    NoAudioStream(PathBuf),
    #[error("no {0} encoder available")]
    EncoderUnavailable(&'static str),
    #[error("invalid segment window: start {start_seconds}s, duration {duration_seconds}s")]
    InvalidWindow {
        start_seconds: f64,
        duration_seconds: f64,
    },
}

/// Failure to determine a source's duration.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
    #[error("duration of {0} is unknown")]
    UnknownDuration(PathBuf),
}
