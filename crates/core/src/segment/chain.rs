use tracing::{debug, trace};

use super::context::SegmentContext;
use super::section::Section;
use super::traits::Segmenter;

/// Outcome of running the chain: the winning strategy and its sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation<'t> {
    pub strategy: Option<String>,
    pub sections: Vec<Section<'t>>,
}

impl Segmentation<'_> {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Ordered strategies; the first one producing a qualifying section wins.
pub struct SegmenterChain {
    segmenters: Vec<Box<dyn Segmenter>>,
}

impl SegmenterChain {
    pub fn new() -> Self {
        Self {
            segmenters: Vec::new(),
        }
    }

    /// Append a strategy at the lowest priority
    pub fn register(&mut self, segmenter: Box<dyn Segmenter>) {
        self.segmenters.push(segmenter);
    }

    /// Append several strategies, keeping their order
    pub fn register_all(&mut self, segmenters: Vec<Box<dyn Segmenter>>) {
        self.segmenters.extend(segmenters);
    }

    /// Strategy names in priority order
    pub fn list_segmenters(&self) -> Vec<&str> {
        self.segmenters.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.segmenters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segmenters.is_empty()
    }

    /// Run strategies in order. Later strategies are never invoked once one qualifies.
    pub fn run<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Segmentation<'t> {
        for segmenter in &self.segmenters {
            let sections = qualifying_sections(segmenter.as_ref(), text, ctx);
            if sections.is_empty() {
                trace!(strategy = segmenter.name(), "no qualifying sections");
                continue;
            }
            debug!(
                strategy = segmenter.name(),
                sections = sections.len(),
                "segmentation strategy selected"
            );
            return Segmentation {
                strategy: Some(segmenter.name().to_string()),
                sections,
            };
        }
        debug!("no segmentation strategy produced sections");
        Segmentation::default()
    }
}

impl Default for SegmenterChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Sections of a single strategy that pass the length filter. A last-resort strategy
/// whose sections are all short keeps them unfiltered.
pub fn qualifying_sections<'t>(
    segmenter: &dyn Segmenter,
    text: &'t str,
    ctx: &SegmentContext<'_>,
) -> Vec<Section<'t>> {
    let sections = segmenter.segment(text, ctx);
    let min = ctx.min_section_len();
    let long: Vec<Section<'t>> = sections
        .iter()
        .filter(|s| s.content_len() >= min)
        .cloned()
        .collect();
    if long.is_empty() && segmenter.is_last_resort() {
        return sections;
    }
    long
}
