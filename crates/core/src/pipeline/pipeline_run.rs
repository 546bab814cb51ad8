use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::shared::constants::SEGMENT_EXTENSION;

use super::resource_reaper::{ReapReport, ResourceReaper};

const FALLBACK_UPLOAD_NAME: &str = "upload";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Created,
    Planned,
    Materializing,
    Transcribing,
    Assembled,
    Reaped,
}

/// State owned by a single transcription request.
///
/// Names every temporary file the run creates and tracks it in the run's
/// own reaper; nothing here is shared with other runs.
#[derive(Debug)]
pub struct PipelineRun {
    id: Uuid,
    scratch_dir: PathBuf,
    phase: RunPhase,
    reaper: ResourceReaper,
}

impl PipelineRun {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        let run = Self {
            id: Uuid::new_v4(),
            scratch_dir: scratch_dir.into(),
            phase: RunPhase::Created,
            reaper: ResourceReaper::new(),
        };
        log::debug!("run {}: created in {}", run.id, run.scratch_dir.display());
        run
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn advance(&mut self, next: RunPhase) {
        log::debug!("run {}: {:?} -> {:?}", self.id, self.phase, next);
        self.phase = next;
    }

    pub fn reaper(&self) -> &ResourceReaper {
        &self.reaper
    }

    /// `<uuid>-<name>`, keeping only the final component of the client's filename.
    pub fn upload_path(&self, filename_hint: &str) -> PathBuf {
        self.scratch_dir
            .join(format!("{}-{}", Uuid::new_v4(), sanitize_filename(filename_hint)))
    }

    pub fn preprocessed_path(&self) -> PathBuf {
        self.scratch_dir
            .join(format!("{}-preprocessed.{SEGMENT_EXTENSION}", Uuid::new_v4()))
    }

    /// Segment files are numbered from 1.
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.scratch_dir
            .join(format!("{}_{}.{SEGMENT_EXTENSION}", self.id, index + 1))
    }

    pub fn reap(&mut self) -> ReapReport {
        let report = self.reaper.reap();
        self.advance(RunPhase::Reaped);
        report
    }
}

fn sanitize_filename(hint: &str) -> String {
    let normalized = hint.replace('\\', "/");
    let name = Path::new(&normalized)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.trim().is_empty() {
        FALLBACK_UPLOAD_NAME.to_string()
    } else {
        name
    }
}
