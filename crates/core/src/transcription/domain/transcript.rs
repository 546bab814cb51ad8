/// Final assembled transcript of one run.
///
/// `failed_segments` lists chunk indices that contributed nothing because
/// they failed; segments that transcribed to empty text are not listed.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Transcript {
    pub text: String,
    pub segment_count: usize,
    pub failed_segments: Vec<usize>,
}

impl Transcript {
    pub fn succeeded_segments(&self) -> usize {
        self.segment_count - self.failed_segments.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_counts() {
        let t = Transcript {
            text: "hello".to_string(),
            segment_count: 3,
            failed_segments: vec![1],
        };
        assert_eq!(t.succeeded_segments(), 2);
        assert!(!t.is_complete());
    }

    #[test]
    fn test_default_is_empty_and_complete() {
        let t = Transcript::default();
        assert_eq!(t.text, "");
        assert!(t.is_complete());
    }
}
