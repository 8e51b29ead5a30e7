use tracing::trace;

use crate::config::Tables;
use crate::finding::CodeSide;
use crate::text::{is_fence_marker, scan_lines, strip_emphasis, tail_chars};

/// A fenced code block inside a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// Info string after the opening fence (`solidity`), if any.
    pub lang: Option<&'a str>,
    pub code: &'a str,
    /// Offset of the opening fence line.
    pub start: usize,
    /// Offset just past the closing fence (or end of text when unclosed).
    pub end: usize,
}

/// All non-empty fenced blocks in order. An unclosed fence runs to the end of text.
pub fn fenced_blocks(text: &str) -> Vec<CodeBlock<'_>> {
    let mut blocks = Vec::new();
    let mut open: Option<(usize, Option<&str>, usize)> = None;

    for line in scan_lines(text) {
        if !is_fence_marker(line.text) {
            continue;
        }
        match open.take() {
            None => {
                let info = line.text.trim().trim_start_matches(['`', '~']).trim();
                let lang = Some(info).filter(|s| !s.is_empty());
                let code_start = (line.start + line.text.len() + 1).min(text.len());
                open = Some((line.start, lang, code_start));
            }
            Some((start, lang, code_start)) => {
                let code_end = line.start.max(code_start);
                push_block(
                    &mut blocks,
                    text,
                    start,
                    lang,
                    code_start,
                    code_end,
                    line.start + line.text.len(),
                );
            }
        }
    }
    if let Some((start, lang, code_start)) = open {
        push_block(&mut blocks, text, start, lang, code_start, text.len(), text.len());
    }
    blocks
}

fn push_block<'a>(
    blocks: &mut Vec<CodeBlock<'a>>,
    text: &'a str,
    start: usize,
    lang: Option<&'a str>,
    code_start: usize,
    code_end: usize,
    end: usize,
) {
    let code = text[code_start..code_end].trim_matches(['\n', '\r']).trim_end();
    if code.trim().is_empty() {
        return;
    }
    blocks.push(CodeBlock {
        lang,
        code,
        start,
        end,
    });
}

/// How a block's side was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelBasis {
    /// A label line such as `Before:` directly above the block.
    LabelLine,
    /// Disagreeing indicator words in the prose before each of two blocks.
    ContextCue,
    /// The optimization-pattern detector.
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledBlock<'a> {
    pub block: CodeBlock<'a>,
    pub side: CodeSide,
    pub basis: LabelBasis,
}

/// Longest colon-terminated line still read as a label (`Optimized version:`).
const MAX_LABEL_WORDS: usize = 4;

/// Finds the primary before/after blocks of a section. Only the first two fenced
/// blocks are ever considered.
#[derive(Debug, Clone, Copy)]
pub struct CodeBlockExtractor<'a> {
    tables: &'a Tables,
}

impl<'a> CodeBlockExtractor<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    pub fn extract<'t>(&self, text: &'t str) -> Vec<LabeledBlock<'t>> {
        let mut blocks = fenced_blocks(text);
        if blocks.len() > 2 {
            trace!(found = blocks.len(), "ignoring code blocks past the first two");
            blocks.truncate(2);
        }

        match blocks.as_slice() {
            [] => Vec::new(),
            [only] => {
                let (side, basis) = match self.label_cue(&text[..only.start]) {
                    Some(side) => (side, LabelBasis::LabelLine),
                    None if self.tables.optimization.looks_optimized(only.code) => {
                        (CodeSide::After, LabelBasis::Heuristic)
                    }
                    None => (CodeSide::Before, LabelBasis::Heuristic),
                };
                vec![LabeledBlock {
                    block: *only,
                    side,
                    basis,
                }]
            }
            [first, second, ..] => {
                let first_context = &text[..first.start];
                let second_context = &text[first.end..second.start];
                let labels = (self.label_cue(first_context), self.label_cue(second_context));
                let (a, b, basis) = match labels {
                    (Some(a), Some(b)) if a != b => (a, b, LabelBasis::LabelLine),
                    (Some(a), None) => (a, a.opposite(), LabelBasis::LabelLine),
                    (None, Some(b)) => (b.opposite(), b, LabelBasis::LabelLine),
                    _ => match (self.prose_cue(first_context), self.prose_cue(second_context)) {
                        (Some(a), Some(b)) if a != b => (a, b, LabelBasis::ContextCue),
                        _ => self.by_detector(first.code, second.code),
                    },
                };
                vec![
                    LabeledBlock {
                        block: *first,
                        side: a,
                        basis,
                    },
                    LabeledBlock {
                        block: *second,
                        side: b,
                        basis,
                    },
                ]
            }
        }
    }

    fn by_detector(&self, first: &str, second: &str) -> (CodeSide, CodeSide, LabelBasis) {
        let detector = &self.tables.optimization;
        // Equal scores: the later block is the fix.
        if detector.score(first) > detector.score(second) {
            (CodeSide::After, CodeSide::Before, LabelBasis::Heuristic)
        } else {
            (CodeSide::Before, CodeSide::After, LabelBasis::Heuristic)
        }
    }

    /// Side named by the last non-blank line before the block, when that line is a
    /// bare label (`Before:`, `### After`, `**Optimized version:**`) rather than prose.
    fn label_cue(&self, preceding: &str) -> Option<CodeSide> {
        let line = preceding.lines().rev().find(|l| !l.trim().is_empty())?;
        let plain = strip_emphasis(line);
        let plain = plain.trim().trim_start_matches('#').trim();
        let label_shaped =
            plain.ends_with(':') && plain.split_whitespace().count() <= MAX_LABEL_WORDS;
        let bare_label = self
            .tables
            .labels
            .match_line(line)
            .is_some_and(|label| label.rest.is_empty());
        if !label_shaped && !bare_label {
            return None;
        }
        self.cue_in(plain)
    }

    /// Side named by the indicator word closest to the block, looking only at the
    /// last paragraph of the preceding text within the context window.
    fn prose_cue(&self, preceding: &str) -> Option<CodeSide> {
        let preceding = preceding.trim_end();
        let paragraph = preceding
            .rfind("\n\n")
            .map_or(preceding, |pos| &preceding[pos + 2..]);
        self.cue_in(tail_chars(paragraph, self.tables.thresholds.context_window))
    }

    fn cue_in(&self, window: &str) -> Option<CodeSide> {
        let before = self.tables.before_cues.last(window);
        let after = self.tables.after_cues.last(window);
        match (before, after) {
            (Some(b), Some(a)) if a > b => Some(CodeSide::After),
            (Some(_), _) => Some(CodeSide::Before),
            (None, Some(_)) => Some(CodeSide::After),
            (None, None) => None,
        }
    }
}
