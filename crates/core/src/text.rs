//! Line scanning and prose cleanup shared by the segmenters and extractors.

use regex::Regex;

/// One line of a response with its byte offset and fence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub start: usize,
    /// Line content without the trailing newline.
    pub text: &'a str,
    /// True for fence delimiters and everything between them.
    pub in_fence: bool,
}

impl Line<'_> {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_fence_marker(&self) -> bool {
        is_fence_marker(self.text)
    }

    pub fn indent(&self) -> usize {
        self.text.len() - self.text.trim_start().len()
    }
}

pub fn is_fence_marker(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Split `text` into lines, tracking which ones sit inside fenced code blocks.
pub fn scan_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut in_fence = false;
    let mut start = 0;
    for raw in text.split_inclusive('\n') {
        let content = raw.trim_end_matches('\n').trim_end_matches('\r');
        let marker = is_fence_marker(content);
        lines.push(Line {
            start,
            text: content,
            in_fence: in_fence || marker,
        });
        if marker {
            in_fence = !in_fence;
        }
        start += raw.len();
    }
    lines
}

/// Blank-line delimited paragraphs (fenced blocks never split), with their offsets.
pub fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    for line in scan_lines(text) {
        if line.is_blank() && !line.in_fence {
            if let Some((start, end)) = current.take() {
                out.push((start, &text[start..end]));
            }
            continue;
        }
        let end = line.start + line.text.len();
        current = Some(match current {
            Some((start, _)) => (start, end),
            None => (line.start, end),
        });
    }
    if let Some((start, end)) = current {
        out.push((start, &text[start..end]));
    }
    out
}

/// `text` with fenced code blocks removed, line structure kept.
pub fn strip_fences(text: &str) -> String {
    scan_lines(text)
        .iter()
        .filter(|line| !line.in_fence)
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove agent metadata matched by `patterns` and trim.
pub fn clean_response(text: &str, patterns: &[Regex]) -> String {
    let mut cleaned = text.replace("\r\n", "\n");
    for pattern in patterns {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

/// Strip header hashes, bullets, emphasis and ordinal prefixes from a heading.
pub fn clean_heading(raw: &str) -> String {
    let mut s = raw.trim().trim_start_matches('#').trim_start();
    for marker in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = s.strip_prefix(marker) {
            s = rest.trim_start();
        }
    }
    let stripped = strip_emphasis(s);
    let s = strip_ordinal(stripped.trim());
    s.trim().trim_end_matches(':').trim().to_string()
}

/// Drop a leading `3.`, `3)`, `Finding 3:` or `Issue #3 -` from a heading.
fn strip_ordinal(s: &str) -> &str {
    let mut rest = s;
    let lower = s.to_lowercase();
    for word in ["finding", "issue", "vulnerability", "optimization"] {
        if lower.starts_with(word) {
            let after = rest[word.len()..].trim_start().trim_start_matches('#');
            if after.starts_with(|c: char| c.is_ascii_digit()) {
                rest = after;
            }
            break;
        }
    }
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return s;
    }
    let after = &rest[digits..];
    match after.chars().next() {
        Some('.' | ')' | ':' | '-' | '–') => {
            let tail = &after[after.chars().next().map_or(0, char::len_utf8)..];
            if tail.is_empty() || tail.starts_with(char::is_whitespace) {
                tail.trim_start()
            } else {
                s
            }
        }
        _ => s,
    }
}

pub fn strip_emphasis(s: &str) -> String {
    s.replace("**", "").replace("__", "").replace('`', "")
}

pub fn ends_sentence(s: &str) -> bool {
    s.trim_end().ends_with(['.', '!', '?'])
}

/// Turn markdown prose into plain sentences. Code fences are dropped, list items and
/// headings become their own sentences, wrapped paragraph lines are joined.
pub fn clean_prose(text: &str) -> String {
    fn flush(pending: &mut String, out: &mut String) {
        let sentence = pending.trim();
        if !sentence.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(sentence);
            if !sentence.ends_with(['.', '!', '?', ':', ';']) {
                out.push('.');
            }
        }
        pending.clear();
    }

    let mut out = String::new();
    let mut pending = String::new();
    for line in scan_lines(text) {
        if line.in_fence || line.is_blank() {
            flush(&mut pending, &mut out);
            continue;
        }
        let trimmed = line.text.trim();
        let structural = trimmed.starts_with('#') || is_list_item(trimmed);
        let content = strip_list_marker(trimmed.trim_start_matches('#').trim_start());
        let content = strip_emphasis(content);
        let content = content.split_whitespace().collect::<Vec<_>>().join(" ");
        if structural {
            flush(&mut pending, &mut out);
            pending.push_str(&content);
            if trimmed.starts_with('#') {
                flush(&mut pending, &mut out);
            }
        } else {
            if !pending.is_empty() {
                pending.push(' ');
            }
            pending.push_str(&content);
        }
    }
    flush(&mut pending, &mut out);
    out
}

fn is_list_item(line: &str) -> bool {
    strip_list_marker(line).len() != line.len()
}

fn strip_list_marker(line: &str) -> &str {
    for marker in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if (1..=2).contains(&digits) {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    line
}

/// First sentence of already-cleaned prose.
pub fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    let bytes = text.as_bytes();
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let next = bytes.get(idx + 1);
            if next.map_or(true, |b| b.is_ascii_whitespace()) {
                return &text[..=idx];
            }
        }
    }
    text
}

/// Cap `text` at `max` chars on a word boundary.
pub fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => cut[..pos].trim_end().to_string(),
        _ => cut,
    }
}

/// Lowercased alphanumeric words, used to collapse duplicate titles.
pub fn normalize_title(title: &str) -> String {
    clean_heading(title)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last `max` chars of `text`, on a char boundary.
pub fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    let offset = text.char_indices().nth(skip).map_or(0, |(i, _)| i);
    &text[offset..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_lines_tracks_fences() {
        let text = "intro\n```solidity\n# not a header\n```\nafter";
        let lines = scan_lines(text);
        assert_eq!(lines.len(), 5);
        assert!(!lines[0].in_fence);
        assert!(lines[1].in_fence && lines[1].is_fence_marker());
        assert!(lines[2].in_fence);
        assert!(lines[3].in_fence);
        assert!(!lines[4].in_fence);
        assert_eq!(&text[lines[4].start..], "after");
    }

    #[test]
    fn test_paragraphs_keep_code_together() {
        let text = "first para\nstill first\n\n```\na\n\nb\n```\n\nthird";
        let paras = paragraphs(text);
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[0].1, "first para\nstill first");
        assert!(paras[1].1.contains("a\n\nb"));
        assert_eq!(paras[2].1, "third");
        assert_eq!(&text[paras[2].0..], "third");
    }

    #[test]
    fn test_clean_heading() {
        assert_eq!(clean_heading("### 1. Reentrancy Vulnerability"), "Reentrancy Vulnerability");
        assert_eq!(clean_heading("**2) Unchecked call**:"), "Unchecked call");
        assert_eq!(clean_heading("Finding #3: Oracle risk"), "Oracle risk");
        assert_eq!(clean_heading("- **Storage packing**"), "Storage packing");
        assert_eq!(clean_heading("0.8.x compiler"), "0.8.x compiler");
    }

    #[test]
    fn test_clean_prose_preserves_sentences() {
        let text = "An external call is made\nbefore the state update.\n\n- Attacker re-enters\n- Funds drained\n\n```solidity\nfunction f() {}\n```\n**Severity:** High";
        assert_eq!(
            clean_prose(text),
            "An external call is made before the state update. Attacker re-enters. Funds drained. Severity: High."
        );
    }

    #[test]
    fn test_first_sentence_and_truncate() {
        assert_eq!(first_sentence("Use ++i. It is cheaper."), "Use ++i.");
        assert_eq!(first_sentence("Version 0.8.20 is used"), "Version 0.8.20 is used");
        assert_eq!(truncate_words("one two three four", 9), "one two");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("1. **Reentrancy**  in Withdraw!"), "reentrancy in withdraw");
        assert_eq!(normalize_title("Reentrancy in withdraw"), "reentrancy in withdraw");
    }

    #[test]
    fn test_clean_response_strips_metadata() {
        let patterns = vec![Regex::new(r"(?i)request_id[:\s]*[a-zA-Z0-9\-_]+").unwrap()];
        assert_eq!(
            clean_response("request_id: abc-123\n\n1. Reentrancy\r\n", &patterns),
            "1. Reentrancy"
        );
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
    }
}
