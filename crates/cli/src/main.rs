use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use chunkscribe_core::media::infrastructure::ffmpeg_prober::FfmpegProber;
use chunkscribe_core::media::infrastructure::ffmpeg_transcoder::FfmpegTranscoder;
use chunkscribe_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use chunkscribe_core::pipeline::transcribe_audio_use_case::TranscribeAudioUseCase;
use chunkscribe_core::pipeline::transcription_response::TranscriptionResponse;
use chunkscribe_core::shared::constants::API_KEY_ENV;
use chunkscribe_core::shared::settings::Settings;
use chunkscribe_core::transcription::infrastructure::http_transcription_client::HttpTranscriptionClient;

/// Transcribe long audio by splitting it into overlapping chunks.
#[derive(Parser)]
#[command(name = "chunkscribe")]
struct Cli {
    /// Input audio or video file.
    input: PathBuf,

    /// Settings file (JSON). Defaults to the per-user settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chunk window length in milliseconds.
    #[arg(long)]
    window_ms: Option<f64>,

    /// Overlap between consecutive chunks in milliseconds.
    #[arg(long)]
    overlap_ms: Option<f64>,

    /// Segment extraction threads (default: one per CPU).
    #[arg(long)]
    materializer_workers: Option<usize>,

    /// Concurrent transcription requests.
    #[arg(long)]
    dispatcher_workers: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Transcription endpoint URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Transcription model name.
    #[arg(long)]
    model: Option<String>,

    /// Spoken language (ISO 639-1).
    #[arg(long)]
    language: Option<String>,

    /// Bearer token for the transcription service.
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Directory for temporary files (default: system temp dir).
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Print only the transcript text instead of the JSON envelope.
    #[arg(long)]
    text: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }

    let settings = build_settings(&cli)?;
    if settings.api_key.is_none() {
        log::warn!("No API key set; pass --api-key or set {API_KEY_ENV}");
    }

    let client = HttpTranscriptionClient::new(
        settings.endpoint.clone(),
        settings.api_key.clone(),
        settings.request_timeout(),
    )?;

    let mut use_case = TranscribeAudioUseCase::new(
        Arc::new(FfmpegTranscoder),
        Arc::new(FfmpegProber),
        Arc::new(client),
        settings,
        Box::new(StdoutPipelineLogger::default()),
    );

    let result = use_case.execute_file(&cli.input);
    if let Ok(transcript) = &result {
        if !transcript.is_complete() {
            log::warn!(
                "Transcript is missing segments {:?}",
                transcript.failed_segments
            );
        }
    }

    let response = TranscriptionResponse::from(&result);
    println!("{}", render(&response, cli.text)?);
    into_exit_result(response)
}

/// Text-only output applies to successful runs; failures always print the envelope.
fn render(response: &TranscriptionResponse, text_only: bool) -> Result<String, serde_json::Error> {
    match (response, text_only) {
        (TranscriptionResponse::Success { transcription }, true) => Ok(transcription.clone()),
        _ => serde_json::to_string_pretty(response),
    }
}

fn into_exit_result(response: TranscriptionResponse) -> Result<(), Box<dyn std::error::Error>> {
    match response {
        TranscriptionResponse::Success { .. } => Ok(()),
        TranscriptionResponse::Failure { error } => Err(error.into()),
    }
}

fn build_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    apply_overrides(cli, &mut settings);
    settings.validate()?;
    Ok(settings)
}

fn apply_overrides(cli: &Cli, settings: &mut Settings) {
    if let Some(v) = cli.window_ms {
        settings.window_ms = v;
    }
    if let Some(v) = cli.overlap_ms {
        settings.overlap_ms = v;
    }
    if let Some(v) = cli.materializer_workers {
        settings.materializer_workers = Some(v);
    }
    if let Some(v) = cli.dispatcher_workers {
        settings.dispatcher_workers = v;
    }
    if let Some(v) = cli.timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = &cli.endpoint {
        settings.endpoint = v.clone();
    }
    if let Some(v) = &cli.model {
        settings.model = v.clone();
    }
    if let Some(v) = &cli.language {
        settings.language = v.clone();
    }
    if let Some(v) = &cli.api_key {
        settings.api_key = Some(v.clone());
    }
    if let Some(v) = &cli.scratch_dir {
        settings.scratch_dir = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success() -> TranscriptionResponse {
        TranscriptionResponse::Success {
            transcription: "hello there".to_string(),
        }
    }

    fn failure() -> TranscriptionResponse {
        TranscriptionResponse::Failure {
            error: "Failed to analyze audio: no duration".to_string(),
        }
    }

    #[test]
    fn test_success_exits_cleanly() {
        assert!(into_exit_result(success()).is_ok());
    }

    #[test]
    fn test_failure_returns_error_message() {
        let err = into_exit_result(failure()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to analyze audio: no duration");
    }

    #[test]
    fn test_text_mode_prints_bare_transcription() {
        assert_eq!(render(&success(), true).unwrap(), "hello there");
    }

    #[test]
    fn test_failure_renders_envelope_even_in_text_mode() {
        let out = render(&failure(), true).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["error"], "Failed to analyze audio: no duration");
    }

    #[test]
    fn test_cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "chunkscribe",
            "talk.mp3",
            "--window-ms",
            "60000",
            "--overlap-ms",
            "500",
            "--dispatcher-workers",
            "3",
            "--model",
            "whisper-1",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&cli, &mut settings);
        assert_eq!(settings.window_ms, 60_000.0);
        assert_eq!(settings.overlap_ms, 500.0);
        assert_eq!(settings.dispatcher_workers, 3);
        assert_eq!(settings.model, "whisper-1");
    }
}
