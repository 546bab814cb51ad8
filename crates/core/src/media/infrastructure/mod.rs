pub mod ffmpeg_prober;
pub mod ffmpeg_transcoder;
