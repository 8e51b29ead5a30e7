use solidity_findings::segment::{split_at_marks, HeaderMark, Section, SegmentContext, Segmenter};
use solidity_findings::text::{clean_heading, ends_sentence, scan_lines};

/// Splits on header-shaped lines whose title names a finding, e.g.
/// `Vulnerability: Unprotected initializer` or `**Gas optimization - calldata**`.
///
/// A header-shaped line is a `#` heading, a line opening with a bold span, or a
/// short line that starts a paragraph and does not end like a sentence.
pub struct KeywordHeaderSplit;

const MAX_HEADER_CHARS: usize = 80;

impl Segmenter for KeywordHeaderSplit {
    fn name(&self) -> &str {
        "keyword-header"
    }

    fn description(&self) -> &str {
        "Splits on headers containing finding keywords"
    }

    fn segment<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Vec<Section<'t>> {
        let patterns = ctx.patterns();
        let tables = ctx.tables;
        let mut marks = Vec::new();
        let mut paragraph_start = true;

        for line in scan_lines(text) {
            if line.in_fence {
                paragraph_start = false;
                continue;
            }
            if line.is_blank() {
                paragraph_start = true;
                continue;
            }
            let starts_paragraph = std::mem::replace(&mut paragraph_start, false);
            let trimmed = line.text.trim();

            let shaped = patterns.markdown_header.is_match(line.text)
                || patterns.bold_lead.is_match(line.text)
                || (starts_paragraph
                    && trimmed.chars().count() <= MAX_HEADER_CHARS
                    && !ends_sentence(trimmed)
                    && !trimmed.ends_with(','));
            if !shaped
                || tables.labels.is_label_line(line.text)
                || !tables.finding_headers.is_match(trimmed)
            {
                continue;
            }

            let title = clean_heading(trimmed);
            if title.is_empty() {
                continue;
            }
            marks.push(HeaderMark {
                line_start: line.start,
                body_start: (line.start + line.text.len() + 1).min(text.len()),
                title,
            });
        }
        split_at_marks(text, &marks)
    }
}
