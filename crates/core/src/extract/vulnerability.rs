use tracing::trace;

use super::fields::{enumerated_items, FieldExtractor};
use super::Candidate;
use crate::classify::SeverityClassifier;
use crate::code::CodeBlockExtractor;
use crate::config::{LabelKind, Tables};
use crate::finding::{CodeSide, VulnerabilityFinding};
use crate::segment::Section;
use crate::text::clean_prose;

/// Well-known vulnerability classes used when a section offers no usable title.
const KNOWN_VULNERABILITIES: &[(&[&str], &str)] = &[
    (&["reentrancy", "reentrant", "re-entrancy"], "Reentrancy"),
    (
        &["integer overflow", "integer underflow", "overflow", "underflow"],
        "Integer Overflow/Underflow",
    ),
    (&["access control", "onlyowner", "unauthorized"], "Access Control"),
    (
        &["unchecked call", "unchecked return", "return value"],
        "Unchecked External Call",
    ),
    (&["tx.origin"], "tx.origin Authentication"),
    (&["timestamp"], "Timestamp Dependence"),
    (
        &["front-running", "front running", "frontrunning", "sandwich"],
        "Front-Running",
    ),
    (&["flash loan", "flashloan"], "Flash Loan Attack"),
    (&["denial of service", "dos"], "Denial of Service"),
];

const FALLBACK_TITLE: &str = "Security Vulnerability";

/// Builds a vulnerability candidate from one section.
#[derive(Debug, Clone, Copy)]
pub struct VulnerabilityExtractor<'a> {
    tables: &'a Tables,
    fields: FieldExtractor<'a>,
    classifier: SeverityClassifier<'a>,
    blocks: CodeBlockExtractor<'a>,
}

impl<'a> VulnerabilityExtractor<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self {
            tables,
            fields: FieldExtractor::new(tables),
            classifier: SeverityClassifier::new(tables),
            blocks: CodeBlockExtractor::new(tables),
        }
    }

    pub fn extract<'t>(&self, section: &Section<'t>) -> Candidate<'t, VulnerabilityFinding> {
        let description = self.fields.description(section);
        let title = self
            .fields
            .title(section, &description)
            .unwrap_or_else(|| known_title(section.text).to_string());

        let attack_scenario = self
            .fields
            .labeled_block(section.text, LabelKind::AttackScenario)
            .and_then(|block| {
                let steps = enumerated_items(&block, self.tables);
                if steps.is_empty() {
                    let prose = clean_prose(&block);
                    (!prose.is_empty()).then(|| vec![prose])
                } else {
                    Some(steps)
                }
            });
        let remediation = self
            .fields
            .labeled_block(section.text, LabelKind::Remediation)
            .map(|block| clean_prose(&block))
            .filter(|r| !r.is_empty());

        // The block labelled "before" shows the vulnerable code; otherwise the first one.
        let labeled = self.blocks.extract(section.text);
        let code = labeled
            .iter()
            .find(|b| b.side == CodeSide::Before)
            .or_else(|| labeled.first())
            .map(|b| b.block.code.to_string());

        let finding = VulnerabilityFinding {
            title,
            severity: self.classifier.severity(section),
            description,
            attack_scenario,
            remediation,
            code_location: self.fields.location(section),
            code,
        };
        trace!(title = %finding.title, severity = %finding.severity, "vulnerability candidate");
        Candidate {
            has_code: finding.code.is_some(),
            finding,
            source: section.text,
        }
    }
}

/// Catalogue title for the first vulnerability class mentioned in `text`.
pub fn known_title(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    KNOWN_VULNERABILITIES
        .iter()
        .find(|(words, _)| words.iter().any(|w| contains_word(&lower, w)))
        .map_or(FALLBACK_TITLE, |(_, title)| title)
}

/// Whole-word containment; `needle` must be lowercase.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(pos, _)| {
        let before = haystack[..pos].chars().next_back();
        let after = haystack[pos + needle.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::finding::Severity;

    fn tables() -> Tables {
        Tables::compile(&Config::default()).unwrap()
    }

    #[test]
    fn test_extract_full_section() {
        let tables = tables();
        let extractor = VulnerabilityExtractor::new(&tables);
        let text = "### 1. Reentrancy in withdraw\n\
**Severity:** Critical\n\
**Description:** `withdraw()` sends ether before zeroing the caller's balance, so a malicious \
contract can re-enter and drain the vault.\n\
**Attack Scenario:**\n\
1. Attacker deposits 1 ETH\n\
2. Attacker calls withdraw from a contract whose fallback re-enters\n\
**Remediation:** Update the balance before the external call and add a reentrancy guard.\n\
```solidity\n\
(bool ok, ) = msg.sender.call{value: amount}(\"\");\n\
balances[msg.sender] = 0;\n\
```";
        let header_end = text.find('\n').unwrap() + 1;
        let section = Section::with_header(0, text, "Reentrancy in withdraw".into(), header_end);
        let candidate = extractor.extract(&section);
        let finding = &candidate.finding;

        assert_eq!(finding.title, "Reentrancy in withdraw");
        assert_eq!(finding.severity, Severity::Critical);
        assert!(finding.description.starts_with("withdraw() sends ether"));
        assert_eq!(
            finding.attack_scenario.as_deref(),
            Some(
                &[
                    "Attacker deposits 1 ETH.".to_string(),
                    "Attacker calls withdraw from a contract whose fallback re-enters.".to_string(),
                ][..]
            )
        );
        assert_eq!(
            finding.remediation.as_deref(),
            Some("Update the balance before the external call and add a reentrancy guard.")
        );
        assert_eq!(finding.code_location.as_deref(), Some("withdraw()"));
        assert!(finding.code.as_deref().unwrap().contains("msg.sender.call"));
        assert!(candidate.has_code);
    }

    #[test]
    fn test_headerless_section_uses_first_sentence() {
        let tables = tables();
        let extractor = VulnerabilityExtractor::new(&tables);
        let section = Section::new(
            0,
            "Authentication relies on tx.origin. A phishing contract can act on behalf of the owner.",
        );
        let finding = extractor.extract(&section).finding;
        assert_eq!(finding.title, "Authentication relies on tx.origin");
        assert_eq!(finding.severity, Severity::Informational);
        assert!(finding.attack_scenario.is_none());
        assert!(finding.remediation.is_none());
    }

    #[test]
    fn test_known_title_catalogue() {
        assert_eq!(known_title("A flash loan lets anyone skew the price"), "Flash Loan Attack");
        assert_eq!(known_title("This does nothing risky"), "Security Vulnerability");
        assert_eq!(known_title("Unbounded loop enables DoS"), "Denial of Service");
    }
}
