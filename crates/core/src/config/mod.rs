mod tables;

pub use tables::{CueTable, KeywordSet, LabelKind, LabelSet, Tables};

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::finding::OptimizationKind;

/// Keyword tables and thresholds driving extraction, loadable from `.solidity-findings.toml`.
///
/// A `Config` is plain data. Call [`Tables::compile`] once and pass the result to every component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub severity: SeverityCues,
    pub difficulty: DifficultyCues,
    pub keywords: KeywordConfig,
    pub optimization_catalogue: OptimizationCatalogue,
    pub code_context: CodeContextConfig,
    pub templates: TemplateConfig,
    pub field_labels: FieldLabels,
    pub cleaning: CleaningConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Sections shorter than this (in chars) are dropped by the segmenter chain.
    pub min_section_len: usize,
    pub min_description_len: usize,
    /// Relaxed description minimum when the section carries a code example.
    pub min_description_len_with_code: usize,
    pub max_title_len: usize,
    /// Number of chars before a code block inspected for before/after cues.
    pub context_window: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_section_len: 50,
            min_description_len: 50,
            min_description_len_with_code: 30,
            max_title_len: 120,
            context_window: 160,
        }
    }
}

/// Cue words per severity level, scanned in priority order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeverityCues {
    pub critical: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    pub low: Vec<String>,
    pub informational: Vec<String>,
}

impl Default for SeverityCues {
    fn default() -> Self {
        Self {
            critical: strings(&["critical"]),
            high: strings(&["high"]),
            medium: strings(&["medium", "moderate"]),
            low: strings(&["low"]),
            informational: strings(&["informational", "info"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DifficultyCues {
    pub easy: Vec<String>,
    pub medium: Vec<String>,
    pub hard: Vec<String>,
}

impl Default for DifficultyCues {
    fn default() -> Self {
        Self {
            easy: strings(&["easy", "simple", "trivial", "straightforward"]),
            medium: strings(&["medium", "moderate"]),
            hard: strings(&["hard", "complex", "difficult"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub security: Vec<String>,
    pub gas: Vec<String>,
    /// Words that mark a line as the header of a finding.
    pub finding_headers: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            security: strings(&[
                "vulnerability",
                "vulnerable",
                "security",
                "attack",
                "attacker",
                "exploit",
                "risk",
                "unsafe",
                "malicious",
                "reentrancy",
                "reentrant",
                "overflow",
                "underflow",
                "access control",
                "unchecked call",
                "tx.origin",
                "timestamp",
                "front-running",
                "front running",
                "frontrunning",
                "denial of service",
                "dos",
                "delegatecall",
                "flash loan",
                "oracle manipulation",
                "storage collision",
                "uninitialized",
                "privilege escalation",
                "authorization",
                "authentication",
                "input validation",
                "drain",
            ]),
            gas: strings(&[
                "gas",
                "optimization",
                "optimize",
                "optimized",
                "efficient",
                "cheaper",
                "save",
                "saves",
                "reduce",
                "packing",
                "storage",
                "memory",
                "calldata",
                "external",
                "loop",
                "increment",
                "++i",
                "constant",
                "immutable",
                "custom error",
                "unchecked",
                "assembly",
                "sload",
                "sstore",
                "expensive",
                "cost",
            ]),
            finding_headers: strings(&[
                "vulnerability",
                "finding",
                "issue",
                "risk",
                "optimization",
                "attack",
                "exploit",
            ]),
        }
    }
}

/// Keywords per optimization type. `Generic` has no entry; it is the fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizationCatalogue {
    pub storage_packing: Vec<String>,
    pub visibility_change: Vec<String>,
    pub loop_optimization: Vec<String>,
    pub constant_immutable: Vec<String>,
    pub custom_error: Vec<String>,
    pub unchecked_block: Vec<String>,
}

impl OptimizationCatalogue {
    pub fn keywords(&self, kind: OptimizationKind) -> &[String] {
        match kind {
            OptimizationKind::StoragePacking => &self.storage_packing,
            OptimizationKind::VisibilityChange => &self.visibility_change,
            OptimizationKind::LoopOptimization => &self.loop_optimization,
            OptimizationKind::ConstantImmutable => &self.constant_immutable,
            OptimizationKind::CustomError => &self.custom_error,
            OptimizationKind::UncheckedBlock => &self.unchecked_block,
            OptimizationKind::Generic => &[],
        }
    }
}

impl Default for OptimizationCatalogue {
    fn default() -> Self {
        Self {
            storage_packing: strings(&[
                "storage packing",
                "pack",
                "packing",
                "packed",
                "storage slot",
                "slots",
                "struct packing",
            ]),
            visibility_change: strings(&[
                "external",
                "visibility",
                "public function",
                "public functions",
            ]),
            loop_optimization: strings(&[
                "loop",
                "loops",
                "iteration",
                "++i",
                "i++",
                "pre-increment",
                "prefix increment",
                "array length",
                ".length",
            ]),
            constant_immutable: strings(&["constant", "constants", "immutable"]),
            custom_error: strings(&[
                "custom error",
                "custom errors",
                "revert string",
                "revert strings",
                "require string",
                "require strings",
                "error message",
            ]),
            unchecked_block: strings(&["unchecked", "overflow check", "overflow checks"]),
        }
    }
}

/// Words in the text right before a code block that say which side it shows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeContextConfig {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl Default for CodeContextConfig {
    fn default() -> Self {
        Self {
            before: strings(&[
                "before",
                "original",
                "inefficient",
                "current",
                "unoptimized",
                "vulnerable",
            ]),
            after: strings(&[
                "after",
                "optimized",
                "improved",
                "recommended",
                "fixed",
                "better",
                "suggested",
            ]),
        }
    }
}

/// Phrases marking instructional scaffolding or "nothing found" boilerplate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub signatures: Vec<String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            signatures: strings(&[
                "describe the vulnerability",
                "describe the issue",
                "describe the optimization",
                "for each vulnerability found",
                "for each finding",
                "for each optimization",
                "your description here",
                "insert description",
                "[description]",
                "<description>",
                "your finding should contain",
                "each finding should contain",
                "each finding must include",
                "your response must include",
                "use the following format",
                "example format",
                "use this template",
                "fill in the template",
                "following template",
                "lorem ipsum",
                "already optimized",
                "no vulnerabilities found",
                "no vulnerabilities were found",
                "no issues found",
                "no optimizations needed",
                "no further optimization",
            ]),
        }
    }
}

/// Sub-block labels inside a finding section (`**Remediation:** ...`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldLabels {
    pub title: Vec<String>,
    pub description: Vec<String>,
    pub attack_scenario: Vec<String>,
    pub remediation: Vec<String>,
    pub location: Vec<String>,
    pub severity: Vec<String>,
    pub difficulty: Vec<String>,
    pub savings: Vec<String>,
    /// Labels that only terminate other blocks.
    pub other: Vec<String>,
}

impl Default for FieldLabels {
    fn default() -> Self {
        Self {
            title: strings(&["title", "vulnerability type", "optimization type"]),
            description: strings(&["description", "summary", "details", "problem"]),
            attack_scenario: strings(&[
                "attack scenario",
                "exploit scenario",
                "attack steps",
                "exploit path",
                "steps to reproduce",
                "steps",
                "proof of concept",
            ]),
            remediation: strings(&[
                "remediation",
                "recommendation",
                "recommendations",
                "mitigation",
                "fix",
                "solution",
            ]),
            location: strings(&["location", "affected code", "affected function"]),
            severity: strings(&["severity", "risk level", "risk rating", "impact level"]),
            difficulty: strings(&[
                "difficulty",
                "implementation difficulty",
                "complexity",
                "effort",
            ]),
            savings: strings(&[
                "gas savings",
                "estimated gas savings",
                "estimated savings",
                "savings",
            ]),
            other: strings(&[
                "impact",
                "likelihood",
                "code",
                "vulnerable code",
                "before",
                "after",
                "original code",
                "optimized code",
                "current code",
                "references",
                "category",
                "type",
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Regexes for agent metadata removed before segmentation.
    pub metadata_patterns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            metadata_patterns: strings(&[
                r"(?i)conversation_id[:\s]*[a-zA-Z0-9\-_]+",
                r"(?i)request_id[:\s]*[a-zA-Z0-9\-_]+",
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Emit keyword-driven hint optimizations when a gas pass finds nothing.
    pub fallback_hints: bool,
    pub max_fallback_hints: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fallback_hints: false,
            max_fallback_hints: 3,
        }
    }
}

impl Config {
    /// Load config from a TOML file path. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Generate default config file content.
    pub fn default_toml() -> &'static str {
        r#"# solidity-findings configuration
# Every table falls back to the built-in defaults when omitted.

[thresholds]
min_section_len = 50
min_description_len = 50
min_description_len_with_code = 30
max_title_len = 120
context_window = 160

[extraction]
# Emit hint optimizations when a gas pass yields nothing
fallback_hints = false
max_fallback_hints = 3

# [severity]
# critical = ["critical"]
# high = ["high"]

# [keywords]
# finding_headers = ["vulnerability", "finding", "issue", "risk", "optimization"]

# [templates]
# signatures = ["describe the vulnerability", "for each vulnerability found"]

[cleaning]
metadata_patterns = ['(?i)conversation_id[:\s]*[a-zA-Z0-9\-_]+', '(?i)request_id[:\s]*[a-zA-Z0-9\-_]+']
"#
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
