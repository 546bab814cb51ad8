use std::path::Path;

use crate::media::domain::media_error::ProbeError;
use crate::media::domain::media_prober::MediaProber;

/// Reads container duration via libavformat, falling back to the best
/// audio stream's own duration when the container doesn't report one.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegProber;

impl MediaProber for FfmpegProber {
    fn probe_duration_ms(&self, input: &Path) -> Result<f64, ProbeError> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(input)?;

        let container = ictx.duration();
        if container > 0 {
            return Ok(container as f64 * 1000.0 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE));
        }

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Audio)
            .ok_or_else(|| ProbeError::UnknownDuration(input.to_path_buf()))?;
        let ticks = stream.duration();
        let time_base = stream.time_base();
        if ticks <= 0 || time_base.denominator() == 0 {
            return Err(ProbeError::UnknownDuration(input.to_path_buf()));
        }

        Ok(ticks as f64 * f64::from(time_base) * 1000.0)
    }
}
