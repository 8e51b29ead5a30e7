pub mod fields;
pub mod gas;
pub mod vulnerability;

pub use fields::{enumerated_items, FieldExtractor};
pub use gas::GasOptimizationExtractor;
pub use vulnerability::{known_title, VulnerabilityExtractor};

/// A finding built from one section, not yet validated.
#[derive(Debug, Clone)]
pub struct Candidate<'t, F> {
    pub finding: F,
    /// Text of the section the finding came from.
    pub source: &'t str,
    /// Whether the section carried at least one fenced code block.
    pub has_code: bool,
}
