use regex::Regex;

use crate::error::ConfigError;
use crate::patterns::compile;

/// Counts gas-optimization idioms in a snippet. A snippet with any hit "looks optimized".
#[derive(Debug, Clone)]
pub struct OptimizationDetector {
    indicators: Vec<(&'static str, Regex)>,
}

impl OptimizationDetector {
    pub fn new() -> Result<Self, ConfigError> {
        let indicators = [
            ("external-visibility", r"\bexternal\b"),
            ("prefix-increment", r"\+\+[A-Za-z_]\w*"),
            ("constant-immutable", r"\b(?:constant|immutable)\b"),
            (
                "custom-error",
                r"\berror\s+[A-Z]\w*\s*\(|\brevert\s+[A-Z]\w*\s*\(",
            ),
            ("unchecked-block", r"\bunchecked\s*\{"),
            (
                "cached-length",
                r"\b(?:uint\d*|int\d*)\s+[A-Za-z_]\w*\s*=\s*[\w.\[\]]+\.length\s*;",
            ),
        ];
        let indicators = indicators
            .into_iter()
            .map(|(name, pattern)| Ok((name, compile(pattern)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { indicators })
    }

    /// Total indicator hits, counting repeats.
    pub fn score(&self, code: &str) -> usize {
        self.indicators
            .iter()
            .map(|(_, regex)| regex.find_iter(code).count())
            .sum()
    }

    pub fn looks_optimized(&self, code: &str) -> bool {
        self.score(code) >= 1
    }

    /// Names of the indicators present in `code`.
    pub fn matched(&self, code: &str) -> Vec<&'static str> {
        self.indicators
            .iter()
            .filter(|(_, regex)| regex.is_match(code))
            .map(|(name, _)| *name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_code_is_not_optimized() {
        let detector = OptimizationDetector::new().unwrap();
        let code = "function setValue(uint256 v) public {\n    for (uint256 i = 0; i < items.length; i++) {}\n}";
        assert_eq!(detector.score(code), 0);
        assert!(!detector.looks_optimized(code));
    }

    #[test]
    fn test_indicators_are_counted() {
        let detector = OptimizationDetector::new().unwrap();
        let code = "error NotOwner();\nfunction f() external {\n    uint256 len = items.length;\n    for (uint256 i; i < len; ++i) {}\n    if (msg.sender != owner) revert NotOwner();\n}";
        assert_eq!(detector.score(code), 5);
        assert_eq!(
            detector.matched(code),
            vec!["external-visibility", "prefix-increment", "custom-error", "cached-length"]
        );
    }

    #[test]
    fn test_unchecked_and_constant() {
        let detector = OptimizationDetector::new().unwrap();
        assert!(detector.looks_optimized("unchecked { ++count; }"));
        assert!(detector.looks_optimized("uint256 public constant FEE = 30;"));
    }
}
