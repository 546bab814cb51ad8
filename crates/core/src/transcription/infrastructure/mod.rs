pub mod http_transcription_client;
