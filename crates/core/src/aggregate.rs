//! Order-preserving collection of accepted findings with exact-title collapsing.

use std::collections::HashMap;

use tracing::debug;

use crate::finding::{CodeSide, GasOptimizationFinding, ParseResult, VulnerabilityFinding};
use crate::text::normalize_title;

/// Collects findings in arrival order. A finding whose normalized title matches an
/// earlier one of the same domain is merged into it and keeps the earlier position.
#[derive(Debug, Default)]
pub struct Aggregator {
    result: ParseResult,
    vulnerability_index: HashMap<String, usize>,
    gas_index: HashMap<String, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vulnerability(&mut self, finding: VulnerabilityFinding) {
        let key = normalize_title(&finding.title);
        match self.vulnerability_index.get(&key) {
            Some(&idx) => {
                debug!(title = %finding.title, "merging duplicate vulnerability");
                merge_vulnerability(&mut self.result.vulnerabilities[idx], finding);
            }
            None => {
                self.vulnerability_index
                    .insert(key, self.result.vulnerabilities.len());
                self.result.vulnerabilities.push(finding);
            }
        }
    }

    pub fn push_gas(&mut self, finding: GasOptimizationFinding) {
        let key = normalize_title(&finding.title);
        match self.gas_index.get(&key) {
            Some(&idx) => {
                debug!(title = %finding.title, "merging duplicate gas optimization");
                merge_gas(&mut self.result.gas_optimizations[idx], finding);
            }
            None => {
                self.gas_index.insert(key, self.result.gas_optimizations.len());
                self.result.gas_optimizations.push(finding);
            }
        }
    }

    /// Feed another result through the same collapsing rules.
    pub fn extend(&mut self, other: ParseResult) {
        for finding in other.vulnerabilities {
            self.push_vulnerability(finding);
        }
        for finding in other.gas_optimizations {
            self.push_gas(finding);
        }
    }

    pub fn finish(self) -> ParseResult {
        self.result
    }
}

fn merge_vulnerability(kept: &mut VulnerabilityFinding, other: VulnerabilityFinding) {
    keep_longer(&mut kept.description, other.description);
    kept.severity = kept.severity.min(other.severity);
    prefer_longer(&mut kept.attack_scenario, other.attack_scenario, Vec::len);
    prefer_longer(&mut kept.remediation, other.remediation, |r| r.chars().count());
    if kept.code_location.is_none() {
        kept.code_location = other.code_location;
    }
    kept.code = match (kept.code.take(), other.code) {
        (Some(a), Some(b)) => Some(code_union(a, b)),
        (a, b) => a.or(b),
    };
}

fn merge_gas(kept: &mut GasOptimizationFinding, other: GasOptimizationFinding) {
    keep_longer(&mut kept.description, other.description);
    if kept.estimated_gas_savings.is_none() {
        kept.estimated_gas_savings = other.estimated_gas_savings;
    }
    for side in [CodeSide::Before, CodeSide::After] {
        if kept.code_pair.is_extracted(side) || !other.code_pair.is_extracted(side) {
            continue;
        }
        if let Some(code) = other.code_pair.side(side) {
            kept.code_pair.set_extracted(side, code.to_string());
        }
    }
}

fn prefer_longer<T>(kept: &mut Option<T>, other: Option<T>, len: impl Fn(&T) -> usize) {
    if let Some(other) = other {
        if kept.as_ref().map_or(true, |k| len(&other) > len(k)) {
            *kept = Some(other);
        }
    }
}

fn keep_longer(kept: &mut String, other: String) {
    if other.chars().count() > kept.chars().count() {
        *kept = other;
    }
}

/// Union of two snippets: one containing the other collapses to the larger.
fn code_union(a: String, b: String) -> String {
    if a.contains(b.trim()) {
        a
    } else if b.contains(a.trim()) {
        b
    } else {
        format!("{}\n\n{}", a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{CodeExamplePair, Difficulty, OptimizationKind, Severity};

    fn vulnerability(title: &str, severity: Severity, description: &str) -> VulnerabilityFinding {
        VulnerabilityFinding {
            title: title.to_string(),
            severity,
            description: description.to_string(),
            attack_scenario: None,
            remediation: None,
            code_location: None,
            code: None,
        }
    }

    fn gas(title: &str, pair: CodeExamplePair) -> GasOptimizationFinding {
        GasOptimizationFinding {
            title: title.to_string(),
            optimization_type: OptimizationKind::StoragePacking,
            description: "Pack the struct fields.".to_string(),
            estimated_gas_savings: None,
            difficulty: Difficulty::Easy,
            code_pair: pair,
        }
    }

    #[test]
    fn test_order_preserved_and_titles_collapsed() {
        let mut agg = Aggregator::new();
        let mut first = vulnerability("Reentrancy", Severity::Medium, "Short text.");
        first.code = Some("a.call();".to_string());
        agg.push_vulnerability(first);
        agg.push_vulnerability(vulnerability("Access control", Severity::Low, "Anyone can call."));
        let mut dup = vulnerability("**1. reentrancy**", Severity::High, "A much longer description.");
        dup.code = Some("b.call();".to_string());
        dup.code_location = Some("withdraw()".to_string());
        agg.push_vulnerability(dup);

        let result = agg.finish();
        assert_eq!(result.vulnerabilities.len(), 2);
        let merged = &result.vulnerabilities[0];
        assert_eq!(merged.title, "Reentrancy");
        assert_eq!(merged.severity, Severity::High);
        assert_eq!(merged.description, "A much longer description.");
        assert_eq!(merged.code.as_deref(), Some("a.call();\n\nb.call();"));
        assert_eq!(merged.code_location.as_deref(), Some("withdraw()"));
        assert_eq!(result.vulnerabilities[1].title, "Access control");
    }

    #[test]
    fn test_code_union_collapses_containment() {
        assert_eq!(
            code_union("a();\nb();".to_string(), "b();".to_string()),
            "a();\nb();"
        );
        assert_eq!(code_union("b();".to_string(), "a();\nb();".to_string()), "a();\nb();");
    }

    #[test]
    fn test_gas_merge_prefers_extracted_sides() {
        let mut synthesized = CodeExamplePair::default();
        synthesized.set_extracted(CodeSide::Before, "uint256 a; uint8 b; uint256 c;".to_string());
        synthesized.set_synthesized(CodeSide::After, "uint256 a; uint256 c; uint8 b;".to_string());

        let mut extracted = CodeExamplePair::default();
        extracted.set_extracted(CodeSide::Before, "struct S { uint8 x; }".to_string());
        extracted.set_extracted(CodeSide::After, "uint8 b; uint8 d;".to_string());

        let mut agg = Aggregator::new();
        agg.push_gas(gas("Storage packing", synthesized));
        agg.push_gas(gas("Storage Packing", extracted));

        let result = agg.finish();
        assert_eq!(result.gas_optimizations.len(), 1);
        let pair = &result.gas_optimizations[0].code_pair;
        assert_eq!(pair.before.as_deref(), Some("uint256 a; uint8 b; uint256 c;"));
        assert_eq!(pair.after.as_deref(), Some("uint8 b; uint8 d;"));
        assert!(pair.synthesized.is_empty());
    }

    #[test]
    fn test_extend_applies_same_rules() {
        let mut agg = Aggregator::new();
        agg.push_vulnerability(vulnerability("Oracle", Severity::Low, "Spot price."));
        agg.extend(ParseResult {
            vulnerabilities: vec![vulnerability("oracle", Severity::Critical, "Spot.")],
            gas_optimizations: vec![gas("Pack", CodeExamplePair::default())],
        });
        let result = agg.finish();
        assert_eq!(result.vulnerabilities.len(), 1);
        assert_eq!(result.vulnerabilities[0].severity, Severity::Critical);
        assert_eq!(result.vulnerabilities[0].description, "Spot price.");
        assert_eq!(result.gas_optimizations.len(), 1);
    }
}
