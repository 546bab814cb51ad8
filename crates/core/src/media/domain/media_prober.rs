use std::path::Path;

use super::media_error::ProbeError;

/// Domain interface for reading a media file's duration without decoding it.
pub trait MediaProber: Send + Sync {
    fn probe_duration_ms(&self, input: &Path) -> Result<f64, ProbeError>;
}
