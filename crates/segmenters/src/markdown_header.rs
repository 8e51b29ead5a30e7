use solidity_findings::segment::{split_at_marks, HeaderMark, Section, SegmentContext, Segmenter};
use solidity_findings::text::{clean_heading, scan_lines};

/// Splits on `#` headings, numbered or not.
///
/// The split level is the shallowest one used by at least two headings, so a
/// single document title (`# Audit Report`) does not swallow the findings below
/// it. Headings that are only field labels (`### Remediation`) stay inside their
/// section.
pub struct MarkdownHeaderSplit;

impl Segmenter for MarkdownHeaderSplit {
    fn name(&self) -> &str {
        "markdown-header"
    }

    fn description(&self) -> &str {
        "Splits on markdown headings at the dominant level"
    }

    fn segment<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Vec<Section<'t>> {
        let patterns = ctx.patterns();
        let labels = &ctx.tables.labels;

        let mut headings: Vec<(usize, HeaderMark)> = Vec::new();
        for line in scan_lines(text) {
            if line.in_fence {
                continue;
            }
            let Some(caps) = patterns.markdown_header.captures(line.text) else {
                continue;
            };
            let title = clean_heading(&caps["title"]);
            if title.is_empty() || labels.is_label_title(&title) {
                continue;
            }
            let mark = HeaderMark {
                line_start: line.start,
                body_start: (line.start + line.text.len() + 1).min(text.len()),
                title,
            };
            headings.push((caps["hashes"].len(), mark));
        }

        let Some(level) = split_level(headings.iter().map(|(level, _)| *level)) else {
            return Vec::new();
        };
        let marks: Vec<HeaderMark> = headings
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, mark)| mark)
            .collect();
        split_at_marks(text, &marks)
    }
}

/// Shallowest level with at least two headings, else the shallowest level present.
fn split_level(levels: impl Iterator<Item = usize> + Clone) -> Option<usize> {
    let mut counts = [0usize; 7];
    for level in levels.clone() {
        counts[level.min(6)] += 1;
    }
    (1..=6)
        .find(|&l| counts[l] >= 2)
        .or_else(|| levels.min())
}
