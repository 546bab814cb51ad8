use std::path::Path;

use super::media_error::ProcessError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioCodec {
    Flac,
    /// 16-bit little-endian PCM.
    Pcm,
}

impl AudioCodec {
    pub fn name(&self) -> &'static str {
        match self {
            AudioCodec::Flac => "flac",
            AudioCodec::Pcm => "pcm_s16le",
        }
    }
}

/// Target format for a full transcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: AudioCodec,
}

/// Domain interface for the media-processing collaborator.
///
/// Both operations block the calling thread. No guarantee is made about
/// the state of `output` after a failure; callers remove it themselves.
pub trait MediaTranscoder: Send + Sync {
    /// Convert the first audio stream of `input` into `output` using `spec`.
    fn transcode(&self, input: &Path, spec: &OutputSpec, output: &Path)
        -> Result<(), ProcessError>;

    /// Cut `[start_seconds, start_seconds + duration_seconds)` of `input`
    /// into a standalone file at `output`, keeping the source's rate and layout.
    fn extract_segment(
        &self,
        input: &Path,
        start_seconds: f64,
        duration_seconds: f64,
        output: &Path,
    ) -> Result<(), ProcessError>;
}
