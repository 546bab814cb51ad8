use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_OVERLAP_MS, DEFAULT_WINDOW_MS, MAX_CHUNK_COUNT, MIN_STRIDE_MS,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkPlanError {
    #[error(
        "invalid chunking configuration: window {window_ms}ms, overlap {overlap_ms}ms (need overlap > 0 and window - overlap >= {}ms)",
        MIN_STRIDE_MS
    )]
    InvalidConfiguration { window_ms: f64, overlap_ms: f64 },
    #[error("invalid source duration: {0}ms")]
    InvalidDuration(f64),
    #[error(
        "{total_duration_ms}ms at a {stride_ms}ms stride needs more than {} chunks",
        MAX_CHUNK_COUNT
    )]
    TooManyChunks { total_duration_ms: f64, stride_ms: f64 },
}

/// Window and overlap lengths used to partition a timeline.
///
/// Validated on construction: both finite, `overlap_ms > 0` and a stride
/// (`window_ms - overlap_ms`) of at least `MIN_STRIDE_MS`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkingParams {
    window_ms: f64,
    overlap_ms: f64,
}

impl ChunkingParams {
    pub fn new(window_ms: f64, overlap_ms: f64) -> Result<Self, ChunkPlanError> {
        let valid = window_ms.is_finite()
            && overlap_ms.is_finite()
            && overlap_ms > 0.0
            && window_ms - overlap_ms >= MIN_STRIDE_MS;
        if !valid {
            return Err(ChunkPlanError::InvalidConfiguration {
                window_ms,
                overlap_ms,
            });
        }
        Ok(Self {
            window_ms,
            overlap_ms,
        })
    }

    pub fn window_ms(&self) -> f64 {
        self.window_ms
    }

    pub fn overlap_ms(&self) -> f64 {
        self.overlap_ms
    }

    /// Distance between the starts of consecutive windows.
    pub fn stride_ms(&self) -> f64 {
        self.window_ms - self.overlap_ms
    }
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            overlap_ms: DEFAULT_OVERLAP_MS,
        }
    }
}

/// One time window of the source, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkDescriptor {
    pub index: usize,
    pub start_ms: f64,
    pub end_ms: f64,
}

impl ChunkDescriptor {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_ms / 1000.0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_ms() / 1000.0
    }
}

/// Immutable partition of a source timeline into overlapping windows.
///
/// Always contains at least one chunk, even for a zero-length source, and
/// never more than `MAX_CHUNK_COUNT`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkPlan {
    total_duration_ms: f64,
    params: ChunkingParams,
    chunk_count: usize,
}

impl ChunkPlan {
    pub fn new(total_duration_ms: f64, params: ChunkingParams) -> Result<Self, ChunkPlanError> {
        if !total_duration_ms.is_finite() || total_duration_ms < 0.0 {
            return Err(ChunkPlanError::InvalidDuration(total_duration_ms));
        }
        let count = (total_duration_ms / params.stride_ms()).floor() + 1.0;
        if !count.is_finite() || count > MAX_CHUNK_COUNT as f64 {
            return Err(ChunkPlanError::TooManyChunks {
                total_duration_ms,
                stride_ms: params.stride_ms(),
            });
        }
        let chunk_count = count as usize;
        Ok(Self {
            total_duration_ms,
            params,
            chunk_count,
        })
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.total_duration_ms
    }

    pub fn params(&self) -> ChunkingParams {
        self.params
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn descriptor(&self, index: usize) -> Option<ChunkDescriptor> {
        if index >= self.chunk_count {
            return None;
        }
        let start_ms = index as f64 * self.params.stride_ms();
        let end_ms = (start_ms + self.params.window_ms).min(self.total_duration_ms);
        Some(ChunkDescriptor {
            index,
            start_ms,
            end_ms,
        })
    }

    /// Descriptors in ascending index order.
    pub fn descriptors(&self) -> impl Iterator<Item = ChunkDescriptor> + '_ {
        (0..self.chunk_count).filter_map(|i| self.descriptor(i))
    }
}

/// Validates the parameters and computes the plan in one step.
pub fn plan(
    total_duration_ms: f64,
    window_ms: f64,
    overlap_ms: f64,
) -> Result<ChunkPlan, ChunkPlanError> {
    ChunkPlan::new(total_duration_ms, ChunkingParams::new(window_ms, overlap_ms)?)
}
