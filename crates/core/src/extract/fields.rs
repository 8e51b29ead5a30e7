use regex::Captures;

use crate::config::{LabelKind, Tables};
use crate::finding::OptimizationKind;
use crate::segment::Section;
use crate::text::{clean_heading, clean_prose, first_sentence, scan_lines, strip_fences, truncate_words};

/// Prose words that follow "function" without naming one.
const NOT_FUNCTION_NAMES: &[&str] = &[
    "a", "an", "and", "allows", "call", "calls", "can", "does", "has", "in", "is", "lacks",
    "may", "must", "of", "or", "should", "that", "the", "to", "uses", "which", "will", "with",
];

/// Field-level extraction shared by both domain extractors.
#[derive(Debug, Clone, Copy)]
pub struct FieldExtractor<'a> {
    tables: &'a Tables,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    /// Raw lines of the first sub-block labelled `kind`, up to the next label,
    /// heading or code fence.
    pub fn labeled_block(&self, text: &str, kind: LabelKind) -> Option<String> {
        let labels = &self.tables.labels;
        let mut lines = scan_lines(text).into_iter();
        let mut block: Vec<&str> = Vec::new();

        for line in lines.by_ref() {
            if line.in_fence {
                continue;
            }
            if let Some(found) = labels.match_line(line.text) {
                if found.kind == kind {
                    if !found.rest.is_empty() {
                        block.push(found.rest);
                    }
                    break;
                }
            }
        }
        // No label found: the iterator is exhausted and `block` is empty.
        for line in lines {
            let trimmed = line.text.trim_start();
            if line.in_fence
                || trimmed.starts_with('#')
                || labels.is_label_line(line.text)
                || self.tables.patterns.bold_line.is_match(line.text)
            {
                break;
            }
            block.push(line.text);
        }

        let joined = block.join("\n");
        let joined = joined.trim();
        (!joined.is_empty()).then(|| joined.to_string())
    }

    /// Title from the header, an explicit `Title:` label, or the first sentence.
    pub fn title(&self, section: &Section<'_>, description: &str) -> Option<String> {
        let max = self.tables.thresholds.max_title_len;
        let from_header = section
            .header
            .as_deref()
            .map(clean_heading)
            .filter(|h| !h.is_empty() && !self.tables.labels.is_label_title(h));
        let candidate = from_header
            .or_else(|| {
                self.labeled_block(section.text, LabelKind::Title)
                    .map(|t| clean_heading(first_line(&t)))
            })
            .or_else(|| {
                let sentence = first_sentence(description).trim_end_matches(['.', '!', '?', ':']);
                Some(sentence.trim().to_string())
            })?;
        let title = truncate_words(candidate.trim(), max);
        (!title.is_empty()).then_some(title)
    }

    /// Labelled description when substantial, else the whole body as clean prose.
    pub fn description(&self, section: &Section<'_>) -> String {
        if let Some(block) = self.labeled_block(section.text, LabelKind::Description) {
            let prose = clean_prose(&block);
            if prose.chars().count() >= 40 {
                return prose;
            }
        }
        let body = clean_prose(&self.without_field_lines(section.body()));
        if body.is_empty() {
            clean_prose(section.text)
        } else {
            body
        }
    }

    /// Drop lines that only carry metadata (`Severity: High`) or introduce a
    /// sub-block (`Before:`), keeping code and everything else.
    fn without_field_lines(&self, text: &str) -> String {
        scan_lines(text)
            .iter()
            .filter(|line| {
                line.in_fence
                    || !self.tables.labels.match_line(line.text).is_some_and(|found| {
                        found.rest.is_empty()
                            || matches!(
                                found.kind,
                                LabelKind::Severity
                                    | LabelKind::Difficulty
                                    | LabelKind::Location
                                    | LabelKind::Title
                            )
                    })
            })
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Location label, else a function and/or line reference (`withdraw(), line 42`).
    pub fn location(&self, section: &Section<'_>) -> Option<String> {
        if let Some(block) = self.labeled_block(section.text, LabelKind::Location) {
            let location = clean_heading(first_line(&block));
            if !location.is_empty() {
                return Some(location);
            }
        }

        let prose = strip_fences(section.text);
        let patterns = &self.tables.patterns;
        let mut hints = Vec::new();

        let function = patterns.function_ref.captures_iter(&prose).find_map(|caps| {
            let name = caps.name("decl").or_else(|| caps.name("call"))?.as_str();
            (!NOT_FUNCTION_NAMES.contains(&name.to_ascii_lowercase().as_str())).then_some(name)
        });
        if let Some(name) = function {
            hints.push(format!("{}()", name));
        }
        if let Some(caps) = patterns.line_ref.captures(&prose) {
            let range: String = caps["range"]
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == '–' { '-' } else { c })
                .collect();
            if range.contains('-') {
                hints.push(format!("lines {}", range));
            } else {
                hints.push(format!("line {}", range));
            }
        }
        (!hints.is_empty()).then(|| hints.join(", "))
    }

    /// Estimated savings in gas units. Tries the labelled form, then `a-b gas`
    /// ranges (upper bound), then `N gas`. Overflowing values are unknown.
    pub fn gas_savings(&self, text: &str) -> Option<u64> {
        let prose = strip_fences(text);
        let patterns = &self.tables.patterns;
        if let Some(caps) = patterns.savings_label.captures(&prose) {
            return match caps.name("hi") {
                Some(_) => quantity(&caps, "hi", "hi_k"),
                None => quantity(&caps, "num", "k"),
            };
        }
        if let Some(caps) = patterns.savings_range.captures(&prose) {
            return quantity(&caps, "hi", "hi_k");
        }
        let caps = patterns.savings_single.captures(&prose)?;
        quantity(&caps, "num", "k")
    }

    /// Optimization type: a catalogue keyword in the header wins, else the type
    /// with the most keyword hits in the text (catalogue order breaks ties).
    pub fn infer_kind(&self, header: Option<&str>, text: &str) -> OptimizationKind {
        let catalogue = &self.tables.catalogue;
        if let Some(header) = header {
            if let Some((kind, _)) = catalogue.iter().find(|(_, set)| set.is_match(header)) {
                return *kind;
            }
        }
        let mut best = (0, OptimizationKind::Generic);
        for (kind, set) in catalogue {
            let hits = set.count(text);
            if hits > best.0 {
                best = (hits, *kind);
            }
        }
        best.1
    }
}

/// A matched number as gas units. A fraction is only exact with a `k` suffix
/// (`1.5k`); `1.5 gas` and `1.2345k` are unknown.
fn quantity(caps: &Captures<'_>, number: &str, thousands: &str) -> Option<u64> {
    let raw = caps.name(number)?.as_str();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    let value: u64 = digits.parse().ok()?;
    if caps.name(thousands).is_none() {
        return fraction.is_empty().then_some(value);
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > 3 {
        return None;
    }
    let thousandths: u64 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<3}", fraction).parse().ok()?
    };
    value.checked_mul(1000)?.checked_add(thousandths)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Items of an enumerated or bulleted list, in order.
pub fn enumerated_items(block: &str, tables: &Tables) -> Vec<String> {
    let pattern = &tables.patterns.enumerated_item;
    let mut items: Vec<String> = Vec::new();
    for line in block.lines() {
        match pattern.captures(line) {
            Some(caps) => {
                let item = clean_prose(&caps["item"]);
                if !item.is_empty() {
                    items.push(item);
                }
            }
            None => {
                // Wrapped continuation of the previous item.
                let extra = line.trim();
                if extra.is_empty() {
                    continue;
                }
                if let Some(last) = items.last_mut() {
                    if last.ends_with('.') {
                        last.pop();
                    }
                    last.push(' ');
                    last.push_str(&clean_prose(extra));
                }
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tables() -> Tables {
        Tables::compile(&Config::default()).unwrap()
    }

    #[test]
    fn test_labeled_block_stops_at_next_label() {
        let tables = tables();
        let fields = FieldExtractor::new(&tables);
        let text = "Intro\n**Remediation:** Apply checks-effects-interactions.\nUpdate balances first.\n**Severity:** High";
        assert_eq!(
            fields.labeled_block(text, LabelKind::Remediation).as_deref(),
            Some("Apply checks-effects-interactions.\nUpdate balances first.")
        );
        assert!(fields.labeled_block(text, LabelKind::AttackScenario).is_none());
    }

    #[test]
    fn test_title_sources() {
        let tables = tables();
        let fields = FieldExtractor::new(&tables);
        let text = "1. **Reentrancy in withdraw**\nThe balance is cleared after the call.";
        let section = Section::with_header(0, text, "**Reentrancy in withdraw**".into(), 30);
        assert_eq!(fields.title(&section, "").as_deref(), Some("Reentrancy in withdraw"));

        let section = Section::new(0, "Unchecked return value of transfer. More text follows.");
        let description = fields.description(&section);
        assert_eq!(
            fields.title(&section, &description).as_deref(),
            Some("Unchecked return value of transfer")
        );
    }

    #[test]
    fn test_description_prefers_substantial_label() {
        let tables = tables();
        let fields = FieldExtractor::new(&tables);
        let text = "## Oracle\n**Description:** The price is read from a single spot pool that can be skewed within one block.\n**Severity:** High";
        let section = Section::with_header(0, text, "Oracle".into(), 10);
        assert_eq!(
            fields.description(&section),
            "The price is read from a single spot pool that can be skewed within one block."
        );

        let text = "## Short\n**Description:** Too short.\nMore body text here.";
        let section = Section::with_header(0, text, "Short".into(), 9);
        assert_eq!(
            fields.description(&section),
            "Description: Too short. More body text here."
        );
    }

    #[test]
    fn test_location_hints() {
        let tables = tables();
        let fields = FieldExtractor::new(&tables);
        let section = Section::new(0, "The `withdraw()` call on line 42 sends ether first.");
        assert_eq!(fields.location(&section).as_deref(), Some("withdraw(), line 42"));

        let section = Section::new(0, "Affected code spans lines 10 - 14 of Vault.sol.");
        assert_eq!(fields.location(&section).as_deref(), Some("lines 10-14"));

        let section = Section::new(0, "**Location:** `Vault.sol`, function `deposit`\nmore");
        assert_eq!(fields.location(&section).as_deref(), Some("Vault.sol, function deposit"));

        let section = Section::new(0, "This function is unsafe.");
        assert!(fields.location(&section).is_none());
    }

    #[test]
    fn test_gas_savings_forms() {
        let tables = tables();
        let fields = FieldExtractor::new(&tables);
        assert_eq!(fields.gas_savings("Saves about 2,100 gas per call."), Some(2100));
        assert_eq!(fields.gas_savings("Roughly 20k gas on deployment."), Some(20_000));
        assert_eq!(fields.gas_savings("Between 500 to 800 gas per iteration."), Some(800));
        assert_eq!(fields.gas_savings("**Gas Savings:** ~2000 per call"), Some(2000));
        assert_eq!(fields.gas_savings("Saves 0 gas at runtime."), Some(0));
        assert_eq!(fields.gas_savings("Noticeably cheaper."), None);
        assert_eq!(fields.gas_savings("Declaring it immutable saves 1.5k gas per read."), Some(1500));
        assert_eq!(fields.gas_savings("Between 1.2k-2.25k gas per call."), Some(2250));
        assert_eq!(fields.gas_savings("Gas savings: ~0.5k"), Some(500));
        assert_eq!(fields.gas_savings("Saves 1.5 gas per call."), None);
        assert_eq!(fields.gas_savings("Saves 1.2345k gas per call."), None);
        assert_eq!(
            fields.gas_savings("Saves 99999999999999999999999 gas."),
            None
        );
        assert_eq!(
            fields.gas_savings("Saves gas.\n```\nuint256 x = 5000; // 5000 gas\n```"),
            None
        );
    }

    #[test]
    fn test_infer_kind() {
        let tables = tables();
        let fields = FieldExtractor::new(&tables);
        assert_eq!(
            fields.infer_kind(Some("Use custom errors"), "external external external"),
            OptimizationKind::CustomError
        );
        assert_eq!(
            fields.infer_kind(None, "Mark the function external; external calls use calldata."),
            OptimizationKind::VisibilityChange
        );
        assert_eq!(
            fields.infer_kind(None, "Reduce gas by caching values in memory."),
            OptimizationKind::Generic
        );
    }

    #[test]
    fn test_enumerated_items() {
        let tables = tables();
        let block = "1. Attacker deposits 1 ETH\n2. Attacker calls withdraw\n   from a fallback\n- Funds are drained";
        assert_eq!(
            enumerated_items(block, &tables),
            vec![
                "Attacker deposits 1 ETH.",
                "Attacker calls withdraw from a fallback.",
                "Funds are drained.",
            ]
        );
    }
}
