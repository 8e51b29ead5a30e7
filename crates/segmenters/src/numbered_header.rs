use solidity_findings::segment::{split_at_marks, HeaderMark, Section, SegmentContext, Segmenter};
use solidity_findings::text::{clean_heading, ends_sentence, scan_lines};

/// Splits on ordinal headers such as `1. Reentrancy` or `### 2) Unchecked call`.
///
/// Decorated headers (`#` or bold) take precedence; when there are none, plain
/// numbered lines count only if they read like a title and do not continue an
/// enumerated sub-list opened by a label such as `Attack Scenario:`.
pub struct NumberedHeaderSplit;

const MAX_TITLE_CHARS: usize = 100;

impl Segmenter for NumberedHeaderSplit {
    fn name(&self) -> &str {
        "numbered-header"
    }

    fn description(&self) -> &str {
        "Splits on numbered headers like `1. Title`"
    }

    fn segment<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Vec<Section<'t>> {
        let patterns = ctx.patterns();
        let labels = &ctx.tables.labels;
        let mut decorated = Vec::new();
        let mut plain = Vec::new();
        // Last item number of the enumerated sub-list being read, if any.
        let mut sublist: Option<u32> = None;

        for line in scan_lines(text) {
            if line.in_fence || line.is_blank() {
                continue;
            }
            if let Some(found) = labels.match_line(line.text) {
                sublist = found.rest.is_empty().then_some(0);
                continue;
            }
            let Some(caps) = patterns.numbered_header.captures(line.text) else {
                if !patterns.enumerated_item.is_match(line.text) {
                    sublist = None;
                }
                continue;
            };
            let Ok(num) = caps["num"].parse::<u32>() else {
                continue;
            };
            let mark = HeaderMark {
                line_start: line.start,
                body_start: (line.start + line.text.len() + 1).min(text.len()),
                title: clean_heading(line.text),
            };

            if caps.name("hash").is_some() || caps.name("bold").is_some() {
                sublist = None;
                decorated.push(mark);
                continue;
            }
            if sublist.is_some_and(|last| num == last + 1) {
                sublist = Some(num);
                continue;
            }
            sublist = None;
            if line.indent() == 0 && is_title_like(&mark.title) {
                plain.push(mark);
            }
        }

        let marks = if decorated.is_empty() { plain } else { decorated };
        split_at_marks(text, &marks)
    }
}

fn is_title_like(title: &str) -> bool {
    !title.is_empty() && title.chars().count() <= MAX_TITLE_CHARS && !ends_sentence(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidity_findings::config::{Config, Tables};
    use solidity_findings::finding::Domain;

    fn split(text: &str) -> Vec<Section<'_>> {
        let tables = Tables::compile(&Config::default()).unwrap();
        let ctx = SegmentContext::new(Domain::Security, &tables);
        NumberedHeaderSplit.segment(text, &ctx)
    }

    #[test]
    fn test_plain_numbered_headers() {
        let text = "Findings below.\n\n1. Reentrancy\nAn external call is made before state update.\n\n2. Integer overflow\nThe counter can wrap.";
        let sections = split(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header.as_deref(), Some("Reentrancy"));
        assert!(sections[0].text.ends_with("before state update."));
        assert_eq!(sections[1].header.as_deref(), Some("Integer overflow"));
        assert_eq!(sections[1].body(), "The counter can wrap.");
    }

    #[test]
    fn test_attack_steps_are_not_headers() {
        let text = "1. Reentrancy in withdraw\n\
Funds are sent before the balance is cleared.\n\
Attack Scenario:\n\
1. Attacker deposits\n\
2. Attacker re-enters withdraw\n\
Remediation: Clear the balance first.\n\
2. Missing access control\n\
Anyone can call setOwner.";
        let sections = split(text);
        let titles: Vec<_> = sections.iter().map(|s| s.header.as_deref()).collect();
        assert_eq!(
            titles,
            vec![Some("Reentrancy in withdraw"), Some("Missing access control")]
        );
    }

    #[test]
    fn test_decorated_headers_take_precedence() {
        let text = "### 1. Reentrancy\nDetails:\n1. The call happens first.\n### 2. Overflow\nMore.";
        let sections = split(text);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].text.contains("The call happens first."));
    }

    #[test]
    fn test_sentences_and_code_are_ignored() {
        let text = "1. This line is a sentence, not a title.\n```\n2. Reentrancy\n```";
        assert!(split(text).is_empty());
    }
}
