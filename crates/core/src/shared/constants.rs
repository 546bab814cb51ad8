/// Default chunk window length (2 minutes).
pub const DEFAULT_WINDOW_MS: f64 = 120_000.0;
/// Default overlap between consecutive windows, so words cut at a boundary survive.
pub const DEFAULT_OVERLAP_MS: f64 = 1_000.0;
/// Smallest distance between window starts the planner accepts.
pub const MIN_STRIDE_MS: f64 = 1.0;
/// Upper bound on chunks per run; each chunk costs a file and a request.
pub const MAX_CHUNK_COUNT: usize = 100_000;

/// Materializer pool size when the processing-unit count cannot be detected.
pub const FALLBACK_MATERIALIZER_WORKERS: usize = 4;
/// Transcription calls in flight at once; tuned against the service's rate limit.
pub const DEFAULT_DISPATCHER_WORKERS: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
pub const DEFAULT_MODEL: &str = "distil-whisper-large-v3-en";
pub const DEFAULT_LANGUAGE: &str = "en";

pub const PREPROCESS_SAMPLE_RATE: u32 = 16000;
pub const PREPROCESS_CHANNELS: u16 = 1;

pub const SEGMENT_EXTENSION: &str = "flac";
pub const SEGMENT_UPLOAD_NAME: &str = "chunk.flac";
pub const SEGMENT_MIME_TYPE: &str = "audio/flac";

pub const API_KEY_ENV: &str = "CHUNKSCRIBE_API_KEY";
