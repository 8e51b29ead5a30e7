//! Turns free-form agent audit responses into structured findings.
//!
//! ```no_run
//! use solidity_findings_engine::{Domain, ResponseParser};
//!
//! let parser = ResponseParser::new()?;
//! let result = parser.parse("1. Reentrancy\n...", Domain::Security);
//! for finding in &result.vulnerabilities {
//!     println!("{}", finding);
//! }
//! # Ok::<(), solidity_findings_engine::ConfigError>(())
//! ```

use rayon::prelude::*;
use tracing::{debug, trace};

use solidity_findings::aggregate::Aggregator;
use solidity_findings::code::SynthesisRules;
use solidity_findings::config::{Config, Tables};
use solidity_findings::extract::{GasOptimizationExtractor, VulnerabilityExtractor};
use solidity_findings::segment::{SegmentContext, Segmentation, SegmenterChain};
use solidity_findings::text::clean_response;
use solidity_findings::validate::Validator;

pub use solidity_findings::error::ConfigError;
pub use solidity_findings::finding::{
    CodeExamplePair, CodeSide, Difficulty, Domain, GasOptimizationFinding, OptimizationKind,
    ParseResult, Severity, VulnerabilityFinding,
};
pub use solidity_findings::report::ParseSummary;

/// Entry point for parsing. Holds only immutable data, so one parser can be
/// shared across threads.
pub struct ResponseParser {
    tables: Tables,
    chain: SegmenterChain,
    rules: SynthesisRules,
}

impl ResponseParser {
    /// Parser with the default tables, all built-in strategies and synthesis rules.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Result<Self, ConfigError> {
        let mut chain = SegmenterChain::new();
        chain.register_all(solidity_findings_segmenters::all_segmenters());
        Ok(Self::with_parts(
            Tables::compile(config)?,
            chain,
            SynthesisRules::builtin()?,
        ))
    }

    /// Assemble a parser from substituted parts, e.g. a reduced chain in tests.
    pub fn with_parts(tables: Tables, chain: SegmenterChain, rules: SynthesisRules) -> Self {
        Self {
            tables,
            chain,
            rules,
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Segmentation of already-cleaned text, exposed for diagnostics.
    pub fn segment<'t>(&self, text: &'t str, domain: Domain) -> Segmentation<'t> {
        let ctx = SegmentContext::new(domain, &self.tables);
        self.chain.run(text, &ctx)
    }

    /// Parse one response for one domain. Never fails: unusable input yields an empty result.
    pub fn parse(&self, text: &str, domain: Domain) -> ParseResult {
        let cleaned = clean_response(text, &self.tables.metadata);
        if cleaned.is_empty() {
            trace!(%domain, "empty response");
            return ParseResult::default();
        }

        let segmentation = self.segment(&cleaned, domain);
        let validator = Validator::new(&self.tables);
        let mut aggregator = Aggregator::new();

        match domain {
            Domain::Security => {
                let extractor = VulnerabilityExtractor::new(&self.tables);
                for section in &segmentation.sections {
                    let candidate = extractor.extract(section);
                    match validator.validate_vulnerability(&candidate) {
                        Ok(()) => {
                            debug!(title = %candidate.finding.title, "accepted vulnerability");
                            aggregator.push_vulnerability(candidate.finding);
                        }
                        Err(reason) => {
                            debug!(title = %candidate.finding.title, %reason, "rejected vulnerability");
                        }
                    }
                }
            }
            Domain::GasOptimization => {
                let extractor = GasOptimizationExtractor::new(&self.tables, &self.rules);
                let mut accepted = 0usize;
                for section in &segmentation.sections {
                    let candidate = extractor.extract(section);
                    match validator.validate_gas(&candidate) {
                        Ok(()) => {
                            debug!(title = %candidate.finding.title, "accepted gas optimization");
                            accepted += 1;
                            aggregator.push_gas(candidate.finding);
                        }
                        Err(reason) => {
                            debug!(title = %candidate.finding.title, %reason, "rejected gas optimization");
                        }
                    }
                }
                if accepted == 0 {
                    for hint in extractor.fallback_hints(&cleaned) {
                        aggregator.push_gas(hint);
                    }
                }
            }
        }

        let result = aggregator.finish();
        debug!(
            %domain,
            strategy = segmentation.strategy.as_deref().unwrap_or("none"),
            vulnerabilities = result.vulnerabilities.len(),
            gas_optimizations = result.gas_optimizations.len(),
            "parsed response"
        );
        result
    }

    pub fn parse_security(&self, text: &str) -> ParseResult {
        self.parse(text, Domain::Security)
    }

    pub fn parse_gas(&self, text: &str) -> ParseResult {
        self.parse(text, Domain::GasOptimization)
    }

    /// Both passes of an audit, combined into one result.
    pub fn parse_audit(&self, security_text: &str, gas_text: &str) -> ParseResult {
        let (security, gas) = rayon::join(
            || self.parse_security(security_text),
            || self.parse_gas(gas_text),
        );
        let mut aggregator = Aggregator::new();
        aggregator.extend(security);
        aggregator.extend(gas);
        aggregator.finish()
    }

    /// Parse independent responses in parallel; results are aggregated in input order.
    pub fn parse_batch(&self, inputs: &[(Domain, &str)]) -> ParseResult {
        let results: Vec<ParseResult> = inputs
            .par_iter()
            .map(|(domain, text)| self.parse(text, *domain))
            .collect();
        let mut aggregator = Aggregator::new();
        for result in results {
            aggregator.extend(result);
        }
        aggregator.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_parser_is_send_sync() {
        assert_send_sync::<ResponseParser>();
    }

    #[test]
    fn test_empty_and_metadata_only_input() {
        let parser = ResponseParser::new().unwrap();
        assert!(parser.parse("", Domain::Security).is_empty());
        assert!(parser.parse("   \n\t", Domain::GasOptimization).is_empty());
        assert!(parser
            .parse("conversation_id: abc123\nrequest_id: 42", Domain::Security)
            .is_empty());
    }

    #[test]
    fn test_default_chain_is_complete() {
        let parser = ResponseParser::new().unwrap();
        assert_eq!(parser.chain.len(), 6);
        assert_eq!(parser.chain.list_segmenters()[0], "numbered-header");
    }
}
