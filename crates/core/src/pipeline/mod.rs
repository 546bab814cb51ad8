pub mod infrastructure;
pub mod pipeline_error;
pub mod pipeline_logger;
pub mod pipeline_run;
pub mod resource_reaper;
pub mod result_assembler;
pub mod segment_materializer;
pub mod transcribe_audio_use_case;
pub mod transcription_dispatcher;
pub mod transcription_response;
