use crate::config::{CueTable, LabelKind, Tables};
use crate::finding::{Difficulty, Severity};
use crate::segment::Section;
use crate::text::strip_fences;

/// Maps cue words in a section onto the closed severity and difficulty scales.
///
/// Lookup order: an explicit `Severity:` / `Difficulty:` label, then the earliest cue
/// in the header, then the earliest cue in the body prose (code excluded).
#[derive(Debug, Clone, Copy)]
pub struct SeverityClassifier<'a> {
    tables: &'a Tables,
}

impl<'a> SeverityClassifier<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    /// Severity of a vulnerability section; `Informational` when nothing matches.
    pub fn severity(&self, section: &Section<'_>) -> Severity {
        self.classify(section, LabelKind::Severity, &self.tables.severity)
            .unwrap_or(Severity::Informational)
    }

    /// Difficulty of a gas optimization section; `Medium` when nothing matches.
    pub fn difficulty(&self, section: &Section<'_>) -> Difficulty {
        self.classify(section, LabelKind::Difficulty, &self.tables.difficulty)
            .unwrap_or(Difficulty::Medium)
    }

    fn classify<L: Copy>(
        &self,
        section: &Section<'_>,
        label: LabelKind,
        table: &CueTable<L>,
    ) -> Option<L> {
        let prose = strip_fences(section.text);
        if let Some(level) = self
            .tables
            .labels
            .inline_value(label, &prose)
            .and_then(|value| table.earliest(value))
        {
            return Some(level);
        }
        if let Some(level) = section.header.as_deref().and_then(|h| table.earliest(h)) {
            return Some(level);
        }
        table.earliest(&strip_fences(section.body()))
    }
}
