use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::chunking::domain::chunk_plan::{ChunkDescriptor, ChunkPlan};
use crate::media::domain::media_error::ProcessError;
use crate::media::domain::media_transcoder::MediaTranscoder;

use super::infrastructure::worker_pool::WorkerPool;
use super::pipeline_run::PipelineRun;
use super::resource_reaper::ResourceReaper;

/// A cut segment on disk, bound to its chunk index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentArtifact {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentFailure {
    pub index: usize,
    pub reason: String,
}

impl std::fmt::Display for SegmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error creating chunk {}: {}", self.index, self.reason)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("all {} chunks failed: {}", .failures.len(), join_failures(.failures))]
pub struct MaterializationFailed {
    pub failures: Vec<SegmentFailure>,
}

fn join_failures(failures: &[SegmentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of cutting every chunk: artifacts and failures, each in index order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterializationReport {
    pub artifacts: Vec<SegmentArtifact>,
    pub failures: Vec<SegmentFailure>,
}

impl MaterializationReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.artifacts.is_empty()
    }

    pub fn summary(&self) -> String {
        join_failures(&self.failures)
    }
}

/// Cuts each planned chunk out of the preprocessed source in parallel.
pub struct SegmentMaterializer {
    transcoder: Arc<dyn MediaTranscoder>,
    pool: WorkerPool,
}

impl SegmentMaterializer {
    pub fn new(transcoder: Arc<dyn MediaTranscoder>, pool: WorkerPool) -> Self {
        Self { transcoder, pool }
    }

    /// Cuts one chunk to `output`. The path is registered with `reaper`
    /// before the transcoder runs; on failure the partial file is removed.
    pub fn materialize(
        &self,
        source: &Path,
        descriptor: &ChunkDescriptor,
        output: &Path,
        reaper: &ResourceReaper,
    ) -> Result<SegmentArtifact, ProcessError> {
        reaper.register(output);

        match self.transcoder.extract_segment(
            source,
            descriptor.start_seconds(),
            descriptor.duration_seconds(),
            output,
        ) {
            Ok(()) => Ok(SegmentArtifact {
                index: descriptor.index,
                path: output.to_path_buf(),
            }),
            Err(e) => {
                if let Err(cleanup) = reaper.discard(output) {
                    log::warn!("Chunk {}: {cleanup}", descriptor.index);
                }
                Err(e)
            }
        }
    }

    /// Cuts every chunk of `plan`. Individual failures are collected; the
    /// stage fails only when no chunk could be cut.
    ///
    /// `on_progress(done, total)` is called from worker threads after each chunk.
    pub fn materialize_all(
        &self,
        source: &Path,
        plan: &ChunkPlan,
        run: &PipelineRun,
        on_progress: &(dyn Fn(usize, usize) + Sync),
    ) -> Result<MaterializationReport, MaterializationFailed> {
        let total = plan.chunk_count();
        let slots: Mutex<Vec<Option<Result<SegmentArtifact, String>>>> =
            Mutex::new(vec![None; total]);
        let done = AtomicUsize::new(0);

        let descriptors: Vec<ChunkDescriptor> = plan.descriptors().collect();
        let pool_result = self.pool.run(descriptors, |descriptor| {
            let output = run.segment_path(descriptor.index);
            let result = self
                .materialize(source, &descriptor, &output, run.reaper())
                .map_err(|e| e.to_string());

            slots.lock().unwrap_or_else(PoisonError::into_inner)[descriptor.index] = Some(result);
            on_progress(done.fetch_add(1, Ordering::SeqCst) + 1, total);
        });

        if let Err(e) = pool_result {
            log::warn!("Materializer pool: {e}");
        }

        let mut report = MaterializationReport::default();
        let slots = slots.into_inner().unwrap_or_else(PoisonError::into_inner);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(artifact)) => report.artifacts.push(artifact),
                Some(Err(reason)) => report.failures.push(SegmentFailure { index, reason }),
                None => report.failures.push(SegmentFailure {
                    index,
                    reason: "worker exited before finishing".to_string(),
                }),
            }
        }

        if report.artifacts.is_empty() {
            return Err(MaterializationFailed {
                failures: report.failures,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::domain::chunk_plan::plan;
    use approx::assert_relative_eq;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    // ─── Stubs ───

    /// Writes a small file per segment, failing for the listed start times.
    struct StubTranscoder {
        fail_at_start_seconds: HashSet<u64>,
        calls: Mutex<Vec<(f64, f64)>>,
        write_partial_on_failure: bool,
    }

    impl StubTranscoder {
        fn new() -> Self {
            Self {
                fail_at_start_seconds: HashSet::new(),
                calls: Mutex::new(Vec::new()),
                write_partial_on_failure: false,
            }
        }

        fn failing(starts: &[u64]) -> Self {
            Self {
                fail_at_start_seconds: starts.iter().copied().collect(),
                ..Self::new()
            }
        }
    }

    impl MediaTranscoder for StubTranscoder {
        fn transcode(
            &self,
            _: &Path,
            _: &crate::media::domain::media_transcoder::OutputSpec,
            output: &Path,
        ) -> Result<(), ProcessError> {
            fs::write(output, b"pre").unwrap();
            Ok(())
        }

        fn extract_segment(
            &self,
            input: &Path,
            start_seconds: f64,
            duration_seconds: f64,
            output: &Path,
        ) -> Result<(), ProcessError> {
            self.calls
                .lock()
                .unwrap()
                .push((start_seconds, duration_seconds));
            if self.fail_at_start_seconds.contains(&(start_seconds as u64)) {
                if self.write_partial_on_failure {
                    fs::write(output, b"partial").unwrap();
                }
                return Err(ProcessError::NoAudioStream(input.to_path_buf()));
            }
            fs::write(output, format!("{start_seconds}+{duration_seconds}")).unwrap();
            Ok(())
        }
    }

    fn no_progress(_: usize, _: usize) {}

    #[test]
    fn test_materialize_all_cuts_every_chunk_in_order() {
        let tmp = TempDir::new().unwrap();
        let transcoder = Arc::new(StubTranscoder::new());
        let materializer = SegmentMaterializer::new(transcoder.clone(), WorkerPool::new(3));
        let run = PipelineRun::new(tmp.path());
        let p = plan(250_000.0, 120_000.0, 1_000.0).unwrap();

        let report = materializer
            .materialize_all(Path::new("pre.flac"), &p, &run, &no_progress)
            .unwrap();

        assert!(report.failures.is_empty());
        let indices: Vec<_> = report.artifacts.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        for artifact in &report.artifacts {
            assert!(artifact.path.exists());
            assert_eq!(artifact.path, run.segment_path(artifact.index));
        }
        assert_eq!(run.reaper().registered().len(), 3);

        let mut calls = transcoder.calls.lock().unwrap().clone();
        calls.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        assert_relative_eq!(calls[0].0, 0.0);
        assert_relative_eq!(calls[0].1, 120.0);
        assert_relative_eq!(calls[1].0, 119.0);
        assert_relative_eq!(calls[1].1, 120.0);
        assert_relative_eq!(calls[2].0, 238.0);
        assert_relative_eq!(calls[2].1, 12.0);
    }

    #[test]
    fn test_partial_failure_is_reported_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let materializer =
            SegmentMaterializer::new(Arc::new(StubTranscoder::failing(&[119])), WorkerPool::new(2));
        let run = PipelineRun::new(tmp.path());
        let p = plan(250_000.0, 120_000.0, 1_000.0).unwrap();

        let report = materializer
            .materialize_all(Path::new("pre.flac"), &p, &run, &no_progress)
            .unwrap();

        assert!(report.is_partial());
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(report.summary().contains("Error creating chunk 1"));
    }

    #[test]
    fn test_total_failure_is_materialization_failed() {
        let tmp = TempDir::new().unwrap();
        let materializer =
            SegmentMaterializer::new(Arc::new(StubTranscoder::failing(&[0])), WorkerPool::new(2));
        let run = PipelineRun::new(tmp.path());
        let p = plan(5_000.0, 120_000.0, 1_000.0).unwrap();

        let err = materializer
            .materialize_all(Path::new("pre.flac"), &p, &run, &no_progress)
            .unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert!(err.to_string().starts_with("all 1 chunks failed"));
    }

    #[test]
    fn test_failed_segment_leaves_no_file_behind() {
        let tmp = TempDir::new().unwrap();
        let transcoder = StubTranscoder {
            write_partial_on_failure: true,
            ..StubTranscoder::failing(&[0])
        };
        let materializer = SegmentMaterializer::new(Arc::new(transcoder), WorkerPool::new(1));
        let run = PipelineRun::new(tmp.path());
        let descriptor = ChunkDescriptor {
            index: 0,
            start_ms: 0.0,
            end_ms: 1_000.0,
        };
        let output = run.segment_path(0);

        let result = materializer.materialize(Path::new("pre.flac"), &descriptor, &output, run.reaper());
        assert!(result.is_err());
        assert!(!output.exists());
        assert_eq!(run.reaper().registered(), vec![output]);
    }

    #[test]
    fn test_progress_reaches_total() {
        let tmp = TempDir::new().unwrap();
        let materializer =
            SegmentMaterializer::new(Arc::new(StubTranscoder::new()), WorkerPool::new(4));
        let run = PipelineRun::new(tmp.path());
        let p = plan(1_000_000.0, 120_000.0, 1_000.0).unwrap();
        let seen = Mutex::new(Vec::new());

        materializer
            .materialize_all(Path::new("pre.flac"), &p, &run, &|done, total| {
                seen.lock().unwrap().push((done, total));
            })
            .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen.len(), p.chunk_count());
        assert_eq!(seen.last(), Some(&(p.chunk_count(), p.chunk_count())));
    }
}
