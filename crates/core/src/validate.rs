//! Acceptance gate applied to every candidate before aggregation.

use crate::config::Tables;
use crate::extract::Candidate;
use crate::finding::{Domain, GasOptimizationFinding, VulnerabilityFinding};

/// Why a candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("title is empty")]
    EmptyTitle,

    #[error("description has {len} chars, need at least {min}")]
    DescriptionTooShort { len: usize, min: usize },

    #[error("no {domain} keyword in the section")]
    NoDomainKeyword { domain: Domain },

    #[error("matches template phrasing `{0}`")]
    TemplateContent(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    tables: &'a Tables,
}

impl<'a> Validator<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    pub fn validate_vulnerability(
        &self,
        candidate: &Candidate<'_, VulnerabilityFinding>,
    ) -> Result<(), Rejection> {
        let finding = &candidate.finding;
        self.check(
            Domain::Security,
            &finding.title,
            &finding.description,
            candidate.source,
            candidate.has_code,
        )
    }

    pub fn validate_gas(
        &self,
        candidate: &Candidate<'_, GasOptimizationFinding>,
    ) -> Result<(), Rejection> {
        let finding = &candidate.finding;
        self.check(
            Domain::GasOptimization,
            &finding.title,
            &finding.description,
            candidate.source,
            candidate.has_code,
        )
    }

    fn check(
        &self,
        domain: Domain,
        title: &str,
        description: &str,
        source: &str,
        has_code: bool,
    ) -> Result<(), Rejection> {
        if title.trim().is_empty() {
            return Err(Rejection::EmptyTitle);
        }

        let thresholds = &self.tables.thresholds;
        let min = if has_code {
            thresholds.min_description_len_with_code
        } else {
            thresholds.min_description_len
        };
        let len = description.trim().chars().count();
        if len < min {
            return Err(Rejection::DescriptionTooShort { len, min });
        }

        let keywords = self.tables.domain_keywords(domain);
        if ![title, description, source].iter().any(|t| keywords.is_match(t)) {
            return Err(Rejection::NoDomainKeyword { domain });
        }

        // Only the extracted prose is checked; a code comment saying "template" is fine.
        for text in [title, description] {
            if let Some(found) = self.tables.template_signatures.find(text) {
                return Err(Rejection::TemplateContent(found.as_str().to_lowercase()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{CodeExamplePair, Difficulty, OptimizationKind, Severity};
    use crate::config::Config;

    fn tables() -> Tables {
        Tables::compile(&Config::default()).unwrap()
    }

    fn vulnerability(title: &str, description: &str) -> VulnerabilityFinding {
        VulnerabilityFinding {
            title: title.to_string(),
            severity: Severity::High,
            description: description.to_string(),
            attack_scenario: None,
            remediation: None,
            code_location: None,
            code: None,
        }
    }

    fn gas(title: &str, description: &str) -> GasOptimizationFinding {
        GasOptimizationFinding {
            title: title.to_string(),
            optimization_type: OptimizationKind::Generic,
            description: description.to_string(),
            estimated_gas_savings: None,
            difficulty: Difficulty::Medium,
            code_pair: CodeExamplePair::default(),
        }
    }

    #[test]
    fn test_accepts_real_finding() {
        let tables = tables();
        let validator = Validator::new(&tables);
        let finding = vulnerability(
            "Reentrancy",
            "An external call is made before state update allowing repeated withdrawal.",
        );
        let source = "1. Reentrancy\nAn external call is made before state update allowing repeated withdrawal.";
        let candidate = Candidate {
            finding,
            source,
            has_code: false,
        };
        assert_eq!(validator.validate_vulnerability(&candidate), Ok(()));
    }

    #[test]
    fn test_description_length_relaxed_with_code() {
        let tables = tables();
        let validator = Validator::new(&tables);
        let description = "Reentrancy lets an attacker drain funds.";
        let mut candidate = Candidate {
            finding: vulnerability("Reentrancy", description),
            source: description,
            has_code: false,
        };
        assert_eq!(
            validator.validate_vulnerability(&candidate),
            Err(Rejection::DescriptionTooShort { len: 40, min: 50 })
        );
        candidate.has_code = true;
        assert_eq!(validator.validate_vulnerability(&candidate), Ok(()));
    }

    #[test]
    fn test_rejects_missing_domain_keyword() {
        let tables = tables();
        let validator = Validator::new(&tables);
        let description = "The weather was pleasant and the team enjoyed a long lunch outside.";
        let candidate = Candidate {
            finding: gas("Lunch", description),
            source: description,
            has_code: false,
        };
        assert_eq!(
            validator.validate_gas(&candidate),
            Err(Rejection::NoDomainKeyword {
                domain: Domain::GasOptimization
            })
        );
    }

    #[test]
    fn test_rejects_template_content() {
        let tables = tables();
        let validator = Validator::new(&tables);
        let description = "Describe the vulnerability here, including the attack and its impact on users.";
        let candidate = Candidate {
            finding: vulnerability("Vulnerability Name", description),
            source: description,
            has_code: false,
        };
        assert_eq!(
            validator.validate_vulnerability(&candidate),
            Err(Rejection::TemplateContent("describe the vulnerability".to_string()))
        );

        let candidate = Candidate {
            finding: gas(
                "Already optimized: loop uses cached length and ++i",
                "Already optimized: loop uses cached length and ++i.",
            ),
            source: "Already optimized: loop uses cached length and ++i",
            has_code: false,
        };
        assert!(validator.validate_gas(&candidate).is_err());
    }

    #[test]
    fn test_ordinary_words_are_not_template_phrasing() {
        let tables = tables();
        let validator = Validator::new(&tables);
        let description = "The clone factory deploys each vault from a shared template contract whose \
initialize() has no access control, so anyone can take ownership. Every privileged function must \
include onlyOwner and the report should contain the deployment address.";
        let candidate = Candidate {
            finding: vulnerability("Unprotected initializer", description),
            source: description,
            has_code: false,
        };
        assert_eq!(validator.validate_vulnerability(&candidate), Ok(()));

        let scaffold = "Use this template for every issue and keep the exploit details short.";
        let candidate = Candidate {
            finding: vulnerability("Reentrancy", scaffold),
            source: scaffold,
            has_code: false,
        };
        assert_eq!(
            validator.validate_vulnerability(&candidate),
            Err(Rejection::TemplateContent("use this template".to_string()))
        );
    }

    #[test]
    fn test_empty_title() {
        let tables = tables();
        let validator = Validator::new(&tables);
        let description = "Storage reads inside the loop cost 2100 gas each and can be cached in memory.";
        let candidate = Candidate {
            finding: gas("  ", description),
            source: description,
            has_code: false,
        };
        assert_eq!(validator.validate_gas(&candidate), Err(Rejection::EmptyTitle));
    }
}
