use regex::Regex;

use crate::error::ConfigError;

/// Line-shape and field patterns that do not depend on configuration.
#[derive(Debug, Clone)]
pub struct Patterns {
    /// `1. Title`, `### 2) Title`, `**3. Title**`, `Finding 4: Title`
    pub numbered_header: Regex,
    pub markdown_header: Regex,
    pub bullet: Regex,
    /// A line consisting only of a bold span, optionally bulleted, optionally followed by `:`.
    pub bold_line: Regex,
    /// A bold span opening a line: `- **Reentrancy**: ...`
    pub bold_lead: Regex,
    pub enumerated_item: Regex,
    pub line_ref: Regex,
    pub function_ref: Regex,
    pub savings_label: Regex,
    pub savings_range: Regex,
    pub savings_single: Regex,
}

impl Patterns {
    pub fn compile() -> Result<Self, ConfigError> {
        Ok(Self {
            numbered_header: compile(
                r"^[ \t]{0,3}(?P<hash>#{1,6}[ \t]*)?(?P<bold>\*\*|__)?[ \t]*(?:(?i:finding|issue|vulnerability|optimization)[ \t]*#?[ \t]*)?(?P<num>\d{1,3})[.):][ \t]+(?P<title>\S.*?)[ \t]*$",
            )?,
            markdown_header: compile(r"^[ \t]{0,3}(?P<hashes>#{1,6})[ \t]+(?P<title>\S.*?)[ \t#]*$")?,
            bullet: compile(r"^(?P<indent>[ \t]*)(?P<marker>[-*+•])[ \t]+(?P<content>\S.*)$")?,
            bold_line: compile(
                r"^[ \t]*(?:[-*+][ \t]+)?(?:\*\*|__)(?P<title>[^*_\n]+?)(?:\*\*|__)[ \t]*:?[ \t]*$",
            )?,
            bold_lead: compile(r"^[ \t]*(?:[-*+•][ \t]+)?(?:\*\*|__)(?P<title>[^*_\n]+?)(?:\*\*|__)")?,
            enumerated_item: compile(
                r"^[ \t]*(?:\d{1,2}[.)]|[-*+•]|(?i:step)[ \t]*\d{1,2}[:.)]?)[ \t]+(?P<item>\S.*?)[ \t]*$",
            )?,
            line_ref: compile(r"(?i)\blines?[ \t]*[:#]?[ \t]*(?P<range>\d+(?:[ \t]*[-–][ \t]*\d+)?)")?,
            function_ref: compile(
                r"(?i:\bfunction)[ \t]+`?(?P<decl>[A-Za-z_]\w*)|`(?P<call>[A-Za-z_]\w*)\([^`]*\)`",
            )?,
            savings_label: compile(
                r"(?i)\b(?:estimated[ \t]+)?(?:gas[ \t]+)?savings?[ \t]*(?:\*\*|__)?[ \t]*[:=][ \t]*(?:\*\*|__)?[ \t]*(?:~|approx\.?|approximately|about|up to)?[ \t]*(?P<num>\d[\d,_]*(?:\.\d+)?)(?P<k>k)?(?:[ \t]*(?:-|–|to)[ \t]*(?P<hi>\d[\d,_]*(?:\.\d+)?)(?P<hi_k>k)?)?\b",
            )?,
            savings_range: compile(
                r"(?i)\b(?P<lo>\d[\d,]*(?:\.\d+)?)(?P<lo_k>k)?[ \t]*(?:-|–|to)[ \t]*(?P<hi>\d[\d,]*(?:\.\d+)?)(?P<hi_k>k)?[ \t]*(?:gas\b|units[ \t]+of[ \t]+gas)",
            )?,
            savings_single: compile(
                r"(?i)\b(?P<num>\d[\d,]*(?:\.\d+)?)(?P<k>k)?[ \t]*(?:gas\b|units[ \t]+of[ \t]+gas)",
            )?,
        })
    }
}

/// Compile a regex, mapping failure to a [`ConfigError`].
pub fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
