use crate::transcription::domain::transcript::Transcript;
use crate::transcription::domain::transcription_outcome::TranscriptionOutcome;

/// Joins per-chunk outcomes into one transcript.
///
/// Text is concatenated in ascending index order with no separator. Failed
/// and unwritten slots contribute nothing and are listed in
/// `failed_segments`.
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn assemble(slots: &[Option<TranscriptionOutcome>], chunk_count: usize) -> Transcript {
        let mut transcript = Transcript {
            segment_count: chunk_count,
            ..Transcript::default()
        };

        for index in 0..chunk_count {
            match slots.get(index).and_then(Option::as_ref) {
                Some(TranscriptionOutcome::Transcribed(text)) => transcript.text.push_str(text),
                Some(TranscriptionOutcome::Failed(reason)) => {
                    log::debug!("chunk {index} skipped: {reason}");
                    transcript.failed_segments.push(index);
                }
                None => transcript.failed_segments.push(index),
            }
        }
        transcript
    }
}
