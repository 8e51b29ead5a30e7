use super::context::SegmentContext;
use super::section::Section;

/// One way of splitting a response into candidate finding sections.
pub trait Segmenter: Send + Sync {
    /// Unique identifier for this strategy (e.g., "numbered-header")
    fn name(&self) -> &str;

    /// Human-readable description of what this strategy splits on
    fn description(&self) -> &str;

    /// A last-resort strategy keeps its sections even when all of them are
    /// below the minimum section length.
    fn is_last_resort(&self) -> bool {
        false
    }

    /// Split `text`. Sections may be short; the chain applies the length filter.
    fn segment<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Vec<Section<'t>>;
}
