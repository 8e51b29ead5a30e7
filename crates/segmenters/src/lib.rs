pub mod bold_header;
pub mod bullet_runs;
pub mod keyword_header;
pub mod markdown_header;
pub mod numbered_header;
pub mod paragraph;

/// Returns all built-in segmentation strategies in priority order
pub fn all_segmenters() -> Vec<Box<dyn solidity_findings::segment::Segmenter>> {
    vec![
        Box::new(numbered_header::NumberedHeaderSplit),
        Box::new(bullet_runs::BulletRunSplit),
        Box::new(markdown_header::MarkdownHeaderSplit),
        Box::new(keyword_header::KeywordHeaderSplit),
        Box::new(bold_header::BoldHeaderSplit),
        Box::new(paragraph::ParagraphSplit),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_and_unique_names() {
        let names: Vec<String> = all_segmenters().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "numbered-header",
                "bullet-runs",
                "markdown-header",
                "keyword-header",
                "bold-header",
                "paragraph",
            ]
        );
        let last_resort: Vec<bool> = all_segmenters().iter().map(|s| s.is_last_resort()).collect();
        assert_eq!(last_resort, vec![false, false, false, false, false, true]);
    }
}
