use tracing::{debug, trace};

use super::fields::FieldExtractor;
use super::Candidate;
use crate::classify::SeverityClassifier;
use crate::code::{CodeBlockExtractor, CodeSynthesizer, SynthesisRules};
use crate::config::Tables;
use crate::finding::{CodeExamplePair, Difficulty, GasOptimizationFinding, OptimizationKind};
use crate::segment::Section;

/// Builds a gas-optimization candidate from one section.
#[derive(Debug, Clone, Copy)]
pub struct GasOptimizationExtractor<'a> {
    tables: &'a Tables,
    fields: FieldExtractor<'a>,
    classifier: SeverityClassifier<'a>,
    blocks: CodeBlockExtractor<'a>,
    synthesizer: CodeSynthesizer<'a>,
}

impl<'a> GasOptimizationExtractor<'a> {
    pub fn new(tables: &'a Tables, rules: &'a SynthesisRules) -> Self {
        Self {
            tables,
            fields: FieldExtractor::new(tables),
            classifier: SeverityClassifier::new(tables),
            blocks: CodeBlockExtractor::new(tables),
            synthesizer: CodeSynthesizer::new(rules),
        }
    }

    pub fn extract<'t>(&self, section: &Section<'t>) -> Candidate<'t, GasOptimizationFinding> {
        let kind = self.fields.infer_kind(section.header.as_deref(), section.text);
        let description = self.fields.description(section);
        let title = self
            .fields
            .title(section, &description)
            .unwrap_or_else(|| kind.label().to_string());

        let mut pair = CodeExamplePair::default();
        for labeled in self.blocks.extract(section.text) {
            pair.set_extracted(labeled.side, labeled.block.code.to_string());
        }
        let has_code = !pair.is_empty();
        let code_pair = self.synthesizer.complete(kind, pair, &description);

        let finding = GasOptimizationFinding {
            title,
            optimization_type: kind,
            description,
            estimated_gas_savings: self.fields.gas_savings(section.text),
            difficulty: self.classifier.difficulty(section),
            code_pair,
        };
        trace!(title = %finding.title, kind = %kind, "gas candidate");
        Candidate {
            finding,
            source: section.text,
            has_code,
        }
    }

    /// Keyword-driven hints for a gas response that produced no findings.
    /// Empty unless enabled in the config and the text is long enough to judge.
    pub fn fallback_hints(&self, text: &str) -> Vec<GasOptimizationFinding> {
        let extraction = &self.tables.extraction;
        if !extraction.fallback_hints || text.chars().count() < MIN_HINT_TEXT_LEN {
            return Vec::new();
        }
        let hints: Vec<_> = self
            .tables
            .catalogue
            .iter()
            .filter(|(_, keywords)| keywords.is_match(text))
            .take(extraction.max_fallback_hints)
            .map(|(kind, _)| self.hint(*kind))
            .collect();
        debug!(count = hints.len(), "emitted fallback gas hints");
        hints
    }

    fn hint(&self, kind: OptimizationKind) -> GasOptimizationFinding {
        let description = hint_description(kind).to_string();
        let code_pair = self
            .synthesizer
            .complete(kind, CodeExamplePair::default(), &description);
        GasOptimizationFinding {
            title: kind.label().to_string(),
            optimization_type: kind,
            description,
            estimated_gas_savings: None,
            difficulty: Difficulty::Medium,
            code_pair,
        }
    }
}

const MIN_HINT_TEXT_LEN: usize = 100;

fn hint_description(kind: OptimizationKind) -> &'static str {
    match kind {
        OptimizationKind::StoragePacking => {
            "Pack state variables that fit together into a single storage slot to cut SSTORE and SLOAD costs."
        }
        OptimizationKind::VisibilityChange => {
            "Declare functions that are never called internally as external so arguments stay in calldata."
        }
        OptimizationKind::LoopOptimization => {
            "Cache the array length outside the loop and use prefix increments to reduce per-iteration gas."
        }
        OptimizationKind::ConstantImmutable => {
            "Mark values that never change as constant or immutable to avoid storage reads."
        }
        OptimizationKind::CustomError => {
            "Replace require statements carrying revert strings with custom errors to shrink bytecode and revert cost."
        }
        OptimizationKind::UncheckedBlock => {
            "Wrap arithmetic that cannot overflow in an unchecked block to skip the compiler's overflow checks."
        }
        OptimizationKind::Generic => {
            "Review the contract for redundant storage access and repeated computation that can be cached."
        }
    }
}
