use solidity_findings::segment::{Section, SegmentContext, Segmenter};
use solidity_findings::text::{clean_heading, scan_lines};

/// Splits a bulleted list of findings: each top-level bullet, together with its
/// nested lines, is one section.
///
/// Only applies when the list is the response's main structure: there must be at
/// least two top-level items sharing a marker, and no markdown headings that
/// would organise the text instead. Bullets that are field labels
/// (`- Severity: High`) never start a section.
pub struct BulletRunSplit;

const MIN_ITEMS: usize = 2;

struct Item {
    start: usize,
    indent: usize,
    marker: char,
    header: Option<String>,
    body_start: usize,
}

impl Segmenter for BulletRunSplit {
    fn name(&self) -> &str {
        "bullet-runs"
    }

    fn description(&self) -> &str {
        "Groups each top-level bullet and its nested lines"
    }

    fn segment<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Vec<Section<'t>> {
        let patterns = ctx.patterns();
        let labels = &ctx.tables.labels;
        let lines = scan_lines(text);

        let has_headings = lines.iter().any(|line| {
            !line.in_fence
                && patterns
                    .markdown_header
                    .captures(line.text)
                    .is_some_and(|caps| !labels.is_label_title(&caps["title"]))
        });
        if has_headings {
            return Vec::new();
        }

        let mut items = Vec::new();
        // Offsets of lines that end a run: non-indented prose after a blank line.
        let mut run_breaks = Vec::new();
        let mut after_blank = false;
        for line in &lines {
            if line.in_fence {
                after_blank = false;
                continue;
            }
            if line.is_blank() {
                after_blank = true;
                continue;
            }
            match patterns.bullet.captures(line.text) {
                Some(caps) if !labels.is_label_line(line.text) => {
                    let marker = caps["marker"].chars().next().unwrap_or('-');
                    let (header, body_offset) = match patterns.bold_lead.captures(line.text) {
                        Some(lead) => {
                            let end = lead.get(0).map_or(0, |m| m.end());
                            let rest = &line.text[end..];
                            let skipped = rest.len()
                                - rest.trim_start_matches([':', '-', '–', ' ', '\t']).len();
                            (Some(clean_heading(&lead["title"])), end + skipped)
                        }
                        None => (None, caps.name("content").map_or(0, |m| m.start())),
                    };
                    items.push(Item {
                        start: line.start,
                        indent: line.indent(),
                        marker,
                        header,
                        body_start: line.start + body_offset.min(line.text.len()),
                    });
                }
                _ => {
                    if after_blank && line.indent() == 0 {
                        run_breaks.push(line.start);
                    }
                }
            }
            after_blank = false;
        }

        let Some(top_indent) = items.iter().map(|item| item.indent).min() else {
            return Vec::new();
        };
        let top: Vec<&Item> = items.iter().filter(|item| item.indent == top_indent).collect();
        let marker = top[0].marker;
        if top.len() < MIN_ITEMS || top.iter().any(|item| item.marker != marker) {
            return Vec::new();
        }

        let mut sections = Vec::with_capacity(top.len());
        for (i, item) in top.iter().enumerate() {
            let next = top.get(i + 1).map_or(text.len(), |next| next.start);
            let end = run_breaks
                .iter()
                .copied()
                .find(|&b| b > item.start && b < next)
                .unwrap_or(next);
            let span = text[item.start..end].trim_end();
            let body_start = item.body_start - item.start;
            let header = item.header.clone().unwrap_or_default();
            sections.push(Section::with_header(item.start, span, header, body_start));
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidity_findings::config::{Config, Tables};
    use solidity_findings::finding::Domain;

    fn split(text: &str) -> Vec<Section<'_>> {
        let tables = Tables::compile(&Config::default()).unwrap();
        let ctx = SegmentContext::new(Domain::GasOptimization, &tables);
        BulletRunSplit.segment(text, &ctx)
    }

    #[test]
    fn test_top_level_bullets_with_nested_lines() {
        let text = "Optimizations:\n\
- **Cache array length**: Reading `.length` every iteration costs gas.\n  \
- Saves ~100 gas per loop\n\
- **Use custom errors**: Revert strings are expensive.\n\n\
Overall the contract is in good shape.";
        let sections = split(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header.as_deref(), Some("Cache array length"));
        assert!(sections[0].body().starts_with("Reading `.length`"));
        assert!(sections[0].text.contains("Saves ~100 gas"));
        assert_eq!(sections[1].header.as_deref(), Some("Use custom errors"));
        assert!(!sections[1].text.contains("good shape"));
    }

    #[test]
    fn test_plain_bullets_have_no_header() {
        let text = "* Mark deposit as external to save gas on calldata copies.\n* Pack the two uint128 fields into one slot.";
        let sections = split(text);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].header.is_none());
        assert!(sections[0].body().starts_with("Mark deposit"));
    }

    #[test]
    fn test_declines_when_headings_exist() {
        let text = "## Reentrancy\n- Severity: High\n- The call happens first.\n## Overflow\n- Details";
        assert!(split(text).is_empty());
    }

    #[test]
    fn test_single_item_or_label_bullets() {
        assert!(split("- Only one finding in this list, described at length.").is_empty());
        assert!(split("- Severity: High\n- Difficulty: Easy").is_empty());
    }
}
