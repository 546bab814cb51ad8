pub mod chunking;
pub mod media;
pub mod pipeline;
pub mod shared;
pub mod transcription;
