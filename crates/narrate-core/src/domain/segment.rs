use serde::{Deserialize, Serialize};

/// A bounded-size slice of the input text with its position in reading order.
///
/// Produced once by the segmenter and never mutated afterwards. Indices
/// are zero-based and dense within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in reading order.
    pub index: usize,
    /// Text sent to the synthesis endpoint.
    pub text: String,
}

impl Segment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Length in characters (not bytes).
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
