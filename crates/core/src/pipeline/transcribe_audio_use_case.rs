use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::chunking::domain::chunk_plan::ChunkPlan;
use crate::media::domain::media_prober::MediaProber;
use crate::media::domain::media_transcoder::MediaTranscoder;
use crate::shared::settings::Settings;
use crate::transcription::domain::transcript::Transcript;
use crate::transcription::domain::transcription_outcome::{
    FailureReason, OutcomeTable, TranscriptionOutcome,
};
use crate::transcription::domain::transcription_service::TranscriptionService;

use super::infrastructure::worker_pool::WorkerPool;
use super::pipeline_error::PipelineError;
use super::pipeline_logger::PipelineLogger;
use super::pipeline_run::{PipelineRun, RunPhase};
use super::result_assembler::ResultAssembler;
use super::segment_materializer::SegmentMaterializer;
use super::transcription_dispatcher::TranscriptionDispatcher;

/// Orchestrates one transcription request end to end.
///
/// Stages: stage upload → preprocess → probe → plan → materialize →
/// dispatch → assemble. Every temporary file of the run is removed before
/// `execute` returns, whether the run succeeded or not.
pub struct TranscribeAudioUseCase {
    transcoder: Arc<dyn MediaTranscoder>,
    prober: Arc<dyn MediaProber>,
    service: Arc<dyn TranscriptionService>,
    settings: Settings,
    logger: Box<dyn PipelineLogger>,
}

impl TranscribeAudioUseCase {
    pub fn new(
        transcoder: Arc<dyn MediaTranscoder>,
        prober: Arc<dyn MediaProber>,
        service: Arc<dyn TranscriptionService>,
        settings: Settings,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            transcoder,
            prober,
            service,
            settings,
            logger,
        }
    }

    /// Transcribes the audio read from `source`. `filename_hint` only
    /// influences the staged file's name (and so the container sniffing).
    pub fn execute(
        &mut self,
        source: &mut dyn Read,
        filename_hint: &str,
    ) -> Result<Transcript, PipelineError> {
        self.settings.validate()?;

        let mut run = PipelineRun::new(self.settings.scratch_dir());
        let result = self.run_stages(&mut run, source, filename_hint);

        let report = run.reap();
        self.logger.metric("files_removed", report.removed as f64);
        if !report.failures.is_empty() {
            self.logger
                .metric("cleanup_failures", report.failures.len() as f64);
        }

        match &result {
            Ok(transcript) => {
                self.logger
                    .metric("failed_segments", transcript.failed_segments.len() as f64);
                if !transcript.is_complete() {
                    self.logger.info(&format!(
                        "{} of {} segments failed: {:?}",
                        transcript.failed_segments.len(),
                        transcript.segment_count,
                        transcript.failed_segments
                    ));
                }
            }
            Err(e) => log::error!("{}", e.user_message()),
        }
        self.logger.summary();
        result
    }

    pub fn execute_file(&mut self, path: &Path) -> Result<Transcript, PipelineError> {
        let mut file = File::open(path).map_err(PipelineError::Upload)?;
        let hint = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.execute(&mut file, &hint)
    }

    fn run_stages(
        &mut self,
        run: &mut PipelineRun,
        source: &mut dyn Read,
        filename_hint: &str,
    ) -> Result<Transcript, PipelineError> {
        let Self {
            transcoder,
            prober,
            service,
            settings,
            logger,
        } = self;

        // 1. Stage the upload
        let started = Instant::now();
        let upload = run.upload_path(filename_hint);
        run.reaper().register(&upload);
        stage_upload(source, &upload).map_err(PipelineError::Upload)?;
        logger.timing("upload", elapsed_ms(started));

        // 2. Normalize to the service's input format
        let started = Instant::now();
        let preprocessed = run.preprocessed_path();
        run.reaper().register(&preprocessed);
        transcoder
            .transcode(&upload, &settings.preprocess_spec(), &preprocessed)
            .map_err(PipelineError::Preprocess)?;
        logger.timing("preprocess", elapsed_ms(started));

        // 3. Probe and plan
        let started = Instant::now();
        let duration_ms = prober.probe_duration_ms(&preprocessed)?;
        let plan = ChunkPlan::new(duration_ms, settings.chunking()?)?;
        run.advance(RunPhase::Planned);
        logger.timing("probe", elapsed_ms(started));
        logger.metric("duration_ms", duration_ms);
        logger.metric("chunks", plan.chunk_count() as f64);
        logger.info(&format!(
            "Audio is {:.1}s long, {} chunk(s)",
            duration_ms / 1000.0,
            plan.chunk_count()
        ));

        let materializer = SegmentMaterializer::new(
            transcoder.clone(),
            settings
                .materializer_workers
                .map(WorkerPool::new)
                .unwrap_or_else(WorkerPool::for_available_cpus),
        );
        let dispatcher = TranscriptionDispatcher::new(
            service.clone(),
            WorkerPool::new(settings.dispatcher_workers),
            settings.transcription_params(),
        );
        let logger = Mutex::new(&mut **logger);

        // 4. Cut segments
        let started = Instant::now();
        run.advance(RunPhase::Materializing);
        let report = materializer.materialize_all(&preprocessed, &plan, run, &|done, total| {
            lock(&logger).progress("materialize", done, total);
        })?;
        lock(&logger).timing("materialize", elapsed_ms(started));

        let outcomes = OutcomeTable::new(plan.chunk_count());
        for failure in &report.failures {
            log::warn!("{failure}");
            outcomes.record(
                failure.index,
                TranscriptionOutcome::Failed(FailureReason::Materialization(
                    failure.reason.clone(),
                )),
            );
        }

        // 5. Transcribe
        let started = Instant::now();
        run.advance(RunPhase::Transcribing);
        dispatcher.dispatch_into(&report.artifacts, &outcomes, &|done, total| {
            lock(&logger).progress("transcribe", done, total);
        });
        lock(&logger).timing("transcribe", elapsed_ms(started));

        // 6. Assemble
        let transcript = ResultAssembler::assemble(&outcomes.into_slots(), plan.chunk_count());
        run.advance(RunPhase::Assembled);
        Ok(transcript)
    }
}

fn stage_upload(source: &mut dyn Read, path: &Path) -> io::Result<u64> {
    let mut file = File::create(path)?;
    io::copy(source, &mut file)
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
