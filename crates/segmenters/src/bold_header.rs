use solidity_findings::segment::{split_at_marks, HeaderMark, Section, SegmentContext, Segmenter};
use solidity_findings::text::{clean_heading, scan_lines};

/// Splits on lines that open with a bold span; the span is the section title and
/// anything after it on the same line belongs to the body.
pub struct BoldHeaderSplit;

impl Segmenter for BoldHeaderSplit {
    fn name(&self) -> &str {
        "bold-header"
    }

    fn description(&self) -> &str {
        "Splits on lines led by a bold title"
    }

    fn segment<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Vec<Section<'t>> {
        let patterns = ctx.patterns();
        let labels = &ctx.tables.labels;
        let mut marks = Vec::new();

        for line in scan_lines(text) {
            if line.in_fence {
                continue;
            }
            let Some(caps) = patterns.bold_lead.captures(line.text) else {
                continue;
            };
            let title = clean_heading(&caps["title"]);
            if title.is_empty() || labels.is_label_title(&title) {
                continue;
            }
            let lead_end = caps.get(0).map_or(0, |m| m.end());
            let rest = &line.text[lead_end..];
            let skipped = rest.len() - rest.trim_start_matches([':', '-', '–', ' ', '\t']).len();
            let body_start = if lead_end + skipped >= line.text.len() {
                (line.start + line.text.len() + 1).min(text.len())
            } else {
                line.start + lead_end + skipped
            };
            marks.push(HeaderMark {
                line_start: line.start,
                body_start,
                title,
            });
        }

        split_at_marks(text, &marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solidity_findings::config::{Config, Tables};
    use solidity_findings::finding::Domain;

    fn split(text: &str) -> Vec<Section<'_>> {
        let tables = Tables::compile(&Config::default()).unwrap();
        let ctx = SegmentContext::new(Domain::Security, &tables);
        BoldHeaderSplit.segment(text, &ctx)
    }

    #[test]
    fn test_bold_titles_with_inline_body() {
        let text = "Review notes\n**Unprotected selfdestruct**: anyone can destroy the contract.\nMore detail.\n**Severity:** High\n**Weak randomness**\nblockhash is predictable.";
        let sections = split(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header.as_deref(), Some("Unprotected selfdestruct"));
        assert!(sections[0].body().starts_with("anyone can destroy"));
        assert!(sections[0].text.contains("**Severity:** High"));
        assert_eq!(sections[1].header.as_deref(), Some("Weak randomness"));
        assert_eq!(sections[1].body(), "blockhash is predictable.");
    }
}
