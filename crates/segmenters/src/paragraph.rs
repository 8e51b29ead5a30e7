use solidity_findings::segment::{Section, SegmentContext, Segmenter};
use solidity_findings::text::{is_fence_marker, paragraphs};

/// Last resort: every blank-line paragraph that mentions a domain keyword.
///
/// A paragraph that is only a code block belongs to the paragraph before it.
pub struct ParagraphSplit;

impl Segmenter for ParagraphSplit {
    fn name(&self) -> &str {
        "paragraph"
    }

    fn description(&self) -> &str {
        "Keeps paragraphs that mention a domain keyword"
    }

    fn is_last_resort(&self) -> bool {
        true
    }

    fn segment<'t>(&self, text: &'t str, ctx: &SegmentContext<'_>) -> Vec<Section<'t>> {
        let keywords = ctx.domain_keywords();
        let mut sections: Vec<Section<'t>> = Vec::new();
        // Whether the previous paragraph became (or extended) a section.
        let mut previous_kept = false;

        for (offset, paragraph) in paragraphs(text) {
            if is_fence_marker(paragraph) && previous_kept {
                if let Some(last) = sections.last_mut() {
                    let end = offset + paragraph.len();
                    *last = Section::new(last.offset, &text[last.offset..end]);
                }
                continue;
            }
            previous_kept = keywords.is_match(paragraph);
            if previous_kept {
                sections.push(Section::new(offset, paragraph));
            }
        }
        sections
    }
}
