//! Text preparation for speech: normalisation and segmentation.

pub mod normalize;
pub mod segmenter;

pub use normalize::normalize;
pub use segmenter::{char_len, segment, split_chunks};
