use crate::config::{KeywordSet, Tables};
use crate::finding::Domain;
use crate::patterns::Patterns;

/// Read-only inputs every segmentation strategy may consult.
#[derive(Debug, Clone, Copy)]
pub struct SegmentContext<'a> {
    pub domain: Domain,
    pub tables: &'a Tables,
}

impl<'a> SegmentContext<'a> {
    pub fn new(domain: Domain, tables: &'a Tables) -> Self {
        Self { domain, tables }
    }

    pub fn patterns(&self) -> &'a Patterns {
        &self.tables.patterns
    }

    /// Keywords of the domain being parsed.
    pub fn domain_keywords(&self) -> &'a KeywordSet {
        self.tables.domain_keywords(self.domain)
    }

    pub fn min_section_len(&self) -> usize {
        self.tables.thresholds.min_section_len
    }
}
