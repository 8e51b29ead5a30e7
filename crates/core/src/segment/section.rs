/// A contiguous span of a response believed to describe one finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    /// Byte offset of `text` within the cleaned response.
    pub offset: usize,
    /// Cleaned header title, if the section was delimited by one.
    pub header: Option<String>,
    pub text: &'a str,
    body_start: usize,
}

impl<'a> Section<'a> {
    /// A headerless section; the whole span is body.
    pub fn new(offset: usize, text: &'a str) -> Self {
        Self {
            offset,
            header: None,
            text,
            body_start: 0,
        }
    }

    /// A section whose body starts `body_start` bytes into `text`.
    pub fn with_header(offset: usize, text: &'a str, header: String, body_start: usize) -> Self {
        let header = Some(header).filter(|h| !h.is_empty());
        Self {
            offset,
            header,
            text,
            body_start: body_start.min(text.len()),
        }
    }

    /// Text after the header line (the whole section when there is none).
    pub fn body(&self) -> &'a str {
        &self.text[self.body_start..]
    }

    /// Content length in chars, ignoring surrounding whitespace.
    pub fn content_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

/// Where a header line starts a new section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMark {
    pub line_start: usize,
    /// Offset of the first byte after the header line.
    pub body_start: usize,
    pub title: String,
}

/// Cut `text` at each mark; a section runs until the next mark or the end of text.
/// Text before the first mark is preamble and is dropped.
pub fn split_at_marks<'t>(text: &'t str, marks: &[HeaderMark]) -> Vec<Section<'t>> {
    let mut sections = Vec::with_capacity(marks.len());
    for (i, mark) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map_or(text.len(), |next| next.line_start);
        let span = text[mark.line_start..end].trim_end();
        let body_start = mark.body_start.saturating_sub(mark.line_start);
        sections.push(Section::with_header(
            mark.line_start,
            span,
            mark.title.clone(),
            body_start,
        ));
    }
    sections
}
