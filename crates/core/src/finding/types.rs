use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Severity levels ordered from most to least severe.
/// IMPORTANT: Variant order matters. Derived Ord puts Critical < High < ... < Informational,
/// which the aggregator relies on when it keeps the more severe of two merged findings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Informational,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Informational,
    ];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "Critical"),
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
            Severity::Informational => write!(f, "Informational"),
        }
    }
}

/// Implementation difficulty of a gas optimization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// Which analysis pass a response belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Security,
    GasOptimization,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Security => write!(f, "security"),
            Domain::GasOptimization => write!(f, "gas-optimization"),
        }
    }
}

/// One side of a before/after code comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CodeSide {
    Before,
    After,
}

impl CodeSide {
    pub fn opposite(self) -> Self {
        match self {
            CodeSide::Before => CodeSide::After,
            CodeSide::After => CodeSide::Before,
        }
    }
}

/// Before/after snippets of a gas optimization. `synthesized` records the sides
/// that were generated rather than extracted from the response text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeExamplePair {
    pub before: Option<String>,
    pub after: Option<String>,
    pub synthesized: BTreeSet<CodeSide>,
}

impl CodeExamplePair {
    pub fn side(&self, side: CodeSide) -> Option<&str> {
        match side {
            CodeSide::Before => self.before.as_deref(),
            CodeSide::After => self.after.as_deref(),
        }
    }

    /// Store a snippet taken verbatim from the response.
    pub fn set_extracted(&mut self, side: CodeSide, code: String) {
        self.slot(side).replace(code);
        self.synthesized.remove(&side);
    }

    /// Store a generated snippet and flag the side as synthesized.
    pub fn set_synthesized(&mut self, side: CodeSide, code: String) {
        self.slot(side).replace(code);
        self.synthesized.insert(side);
    }

    pub fn is_extracted(&self, side: CodeSide) -> bool {
        self.side(side).is_some() && !self.synthesized.contains(&side)
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }

    pub fn is_fully_synthesized(&self) -> bool {
        self.synthesized.contains(&CodeSide::Before) && self.synthesized.contains(&CodeSide::After)
    }

    fn slot(&mut self, side: CodeSide) -> &mut Option<String> {
        match side {
            CodeSide::Before => &mut self.before,
            CodeSide::After => &mut self.after,
        }
    }
}

/// Closed catalogue of optimization types. Unmatched sections fall back to `Generic`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OptimizationKind {
    #[serde(rename = "Storage Packing")]
    StoragePacking,
    #[serde(rename = "Function Visibility")]
    VisibilityChange,
    #[serde(rename = "Loop Optimization")]
    LoopOptimization,
    #[serde(rename = "Constant/Immutable Usage")]
    ConstantImmutable,
    #[serde(rename = "Custom Errors")]
    CustomError,
    #[serde(rename = "Unchecked Arithmetic")]
    UncheckedBlock,
    #[serde(rename = "General Optimization")]
    Generic,
}

impl OptimizationKind {
    /// Matching priority when a section mentions several types equally often.
    pub const ALL: [OptimizationKind; 7] = [
        OptimizationKind::CustomError,
        OptimizationKind::UncheckedBlock,
        OptimizationKind::StoragePacking,
        OptimizationKind::LoopOptimization,
        OptimizationKind::ConstantImmutable,
        OptimizationKind::VisibilityChange,
        OptimizationKind::Generic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OptimizationKind::StoragePacking => "Storage Packing",
            OptimizationKind::VisibilityChange => "Function Visibility",
            OptimizationKind::LoopOptimization => "Loop Optimization",
            OptimizationKind::ConstantImmutable => "Constant/Immutable Usage",
            OptimizationKind::CustomError => "Custom Errors",
            OptimizationKind::UncheckedBlock => "Unchecked Arithmetic",
            OptimizationKind::Generic => "General Optimization",
        }
    }
}

impl std::fmt::Display for OptimizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VulnerabilityFinding {
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub attack_scenario: Option<Vec<String>>,
    pub remediation: Option<String>,
    pub code_location: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GasOptimizationFinding {
    pub title: String,
    pub optimization_type: OptimizationKind,
    pub description: String,
    /// `None` means unknown; `Some(0)` is a real estimate.
    pub estimated_gas_savings: Option<u64>,
    pub difficulty: Difficulty,
    pub code_pair: CodeExamplePair,
}

/// The only value handed back to the orchestrator and UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseResult {
    pub vulnerabilities: Vec<VulnerabilityFinding>,
    pub gas_optimizations: Vec<GasOptimizationFinding>,
}

impl ParseResult {
    pub fn is_empty(&self) -> bool {
        self.vulnerabilities.is_empty() && self.gas_optimizations.is_empty()
    }

    pub fn summary(&self) -> crate::report::ParseSummary {
        crate::report::ParseSummary::from_result(self)
    }
}
