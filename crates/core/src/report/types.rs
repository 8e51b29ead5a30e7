use serde::Serialize;

use crate::finding::{CodeSide, Difficulty, ParseResult, Severity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DifficultyCounts {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

/// Totals over a [`ParseResult`], for status lines and dashboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub total_vulnerabilities: usize,
    pub total_gas_optimizations: usize,
    pub by_severity: SeverityCounts,
    pub by_difficulty: DifficultyCounts,
    /// Sum of the savings estimates that are known. Unknown estimates count as nothing.
    pub known_gas_savings: u64,
    pub synthesized_sides: usize,
}

impl ParseSummary {
    pub fn from_result(result: &ParseResult) -> Self {
        let severity = |level: Severity| {
            result
                .vulnerabilities
                .iter()
                .filter(|v| v.severity == level)
                .count()
        };
        let difficulty = |level: Difficulty| {
            result
                .gas_optimizations
                .iter()
                .filter(|g| g.difficulty == level)
                .count()
        };
        let by_severity = SeverityCounts {
            critical: severity(Severity::Critical),
            high: severity(Severity::High),
            medium: severity(Severity::Medium),
            low: severity(Severity::Low),
            informational: severity(Severity::Informational),
        };
        let by_difficulty = DifficultyCounts {
            easy: difficulty(Difficulty::Easy),
            medium: difficulty(Difficulty::Medium),
            hard: difficulty(Difficulty::Hard),
        };
        let known_gas_savings = result
            .gas_optimizations
            .iter()
            .filter_map(|g| g.estimated_gas_savings)
            .fold(0u64, u64::saturating_add);
        let synthesized_sides = result
            .gas_optimizations
            .iter()
            .map(|g| {
                [CodeSide::Before, CodeSide::After]
                    .iter()
                    .filter(|side| g.code_pair.synthesized.contains(side))
                    .count()
            })
            .sum();

        Self {
            total_vulnerabilities: result.vulnerabilities.len(),
            total_gas_optimizations: result.gas_optimizations.len(),
            by_severity,
            by_difficulty,
            known_gas_savings,
            synthesized_sides,
        }
    }
}
