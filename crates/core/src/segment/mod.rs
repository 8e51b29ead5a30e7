pub mod chain;
pub mod context;
pub mod section;
pub mod traits;

pub use chain::{qualifying_sections, Segmentation, SegmenterChain};
pub use context::SegmentContext;
pub use section::{split_at_marks, HeaderMark, Section};
pub use traits::Segmenter;
