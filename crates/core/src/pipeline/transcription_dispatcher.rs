use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::transcription::domain::transcription_outcome::{
    FailureReason, OutcomeTable, TranscriptionOutcome,
};
use crate::transcription::domain::transcription_service::{
    TranscriptionError, TranscriptionParams, TranscriptionService,
};

use super::infrastructure::worker_pool::WorkerPool;
use super::segment_materializer::SegmentArtifact;

/// Sends segments to the transcription service with bounded concurrency.
///
/// Every artifact ends up with exactly one outcome in the table. A failed
/// request is logged and recorded as `Failed`; it never aborts the batch.
pub struct TranscriptionDispatcher {
    service: Arc<dyn TranscriptionService>,
    pool: WorkerPool,
    params: TranscriptionParams,
}

impl TranscriptionDispatcher {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        pool: WorkerPool,
        params: TranscriptionParams,
    ) -> Self {
        Self {
            service,
            pool,
            params,
        }
    }

    pub fn dispatch(&self, artifacts: &[SegmentArtifact], chunk_count: usize) -> OutcomeTable {
        let table = OutcomeTable::new(chunk_count);
        self.dispatch_into(artifacts, &table, &|_, _| {});
        table
    }

    /// Transcribes each artifact into its slot of `table`.
    ///
    /// `on_progress(done, total)` runs on worker threads after each request.
    pub fn dispatch_into(
        &self,
        artifacts: &[SegmentArtifact],
        table: &OutcomeTable,
        on_progress: &(dyn Fn(usize, usize) + Sync),
    ) {
        let total = artifacts.len();
        let done = AtomicUsize::new(0);

        let result = self.pool.run(artifacts.iter().collect(), |artifact| {
            let outcome = match self.transcribe_one(artifact) {
                Ok(text) => TranscriptionOutcome::Transcribed(text),
                Err(e) => {
                    log::warn!("Error transcribing chunk {}: {e}", artifact.index);
                    TranscriptionOutcome::Failed(FailureReason::Transcription(e.to_string()))
                }
            };
            if !table.record(artifact.index, outcome) {
                log::warn!("Chunk {} already has an outcome", artifact.index);
            }
            on_progress(done.fetch_add(1, Ordering::SeqCst) + 1, total);
        });

        if let Err(e) = result {
            log::warn!("Dispatcher pool: {e}");
        }
    }

    fn transcribe_one(&self, artifact: &SegmentArtifact) -> Result<String, TranscriptionError> {
        let bytes = fs::read(&artifact.path)?;
        self.service.transcribe(&bytes, &self.params)
    }
}
