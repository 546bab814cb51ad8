pub mod media_error;
pub mod media_prober;
pub mod media_transcoder;
