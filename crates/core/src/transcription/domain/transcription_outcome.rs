use std::sync::{Mutex, PoisonError};

/// Why a slot has no text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    Materialization(String),
    Transcription(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Materialization(msg) => write!(f, "materialization failed: {msg}"),
            FailureReason::Transcription(msg) => write!(f, "transcription failed: {msg}"),
        }
    }
}

/// Result for one chunk. `Transcribed("")` is a segment the service heard
/// as silence, distinct from `Failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    Transcribed(String),
    Failed(FailureReason),
}

impl TranscriptionOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            TranscriptionOutcome::Transcribed(text) => Some(text),
            TranscriptionOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TranscriptionOutcome::Failed(_))
    }
}

/// Fixed-size, index-addressed outcome store for one pipeline run.
///
/// Workers write their slot under a short-lived lock; the first write to a
/// slot wins so completion order can never overwrite an earlier result.
#[derive(Debug)]
pub struct OutcomeTable {
    slots: Mutex<Vec<Option<TranscriptionOutcome>>>,
}

impl OutcomeTable {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; chunk_count]),
        }
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records `outcome` at `index`. Returns false if the index is out of
    /// range or the slot was already written.
    pub fn record(&self, index: usize, outcome: TranscriptionOutcome) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(outcome);
                true
            }
            _ => false,
        }
    }

    /// Consumes the table, returning slots in index order. Unwritten slots are `None`.
    pub fn into_slots(self) -> Vec<Option<TranscriptionOutcome>> {
        self.slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
