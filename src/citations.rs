//! Citation post-processing
//!
//! Rewrites numeric citation markers (`[1]`) into markdown links and appends
//! a sources block. Running it again on its own output is a no-op.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Heading appended before the sources list
pub const SOURCES_HEADING: &str = "**Sources:**";

/// Headings that mark a sources block as already present (en, zh)
pub const SOURCES_HEADINGS: &[&str] = &["Sources:", "来源：", "来源:", "参考资料"];

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    // Already-linked markers are matched first so they are left untouched.
    MARKER.get_or_init(|| {
        Regex::new(r"\[\[(\d+)\]\]\([^)\s]*\)|\[(\d+)\]").expect("citation marker regex is valid")
    })
}

fn has_sources_block(content: &str) -> bool {
    SOURCES_HEADINGS.iter().any(|heading| content.contains(heading))
}

/// Linkify citation markers and append a sources block
pub fn process_citations(content: &str, citations: &[String]) -> String {
    if citations.is_empty() {
        return content.to_string();
    }

    let mut processed = marker_regex()
        .replace_all(content, |caps: &Captures| {
            let Some(number) = caps.get(2) else {
                return caps[0].to_string();
            };
            let url = number
                .as_str()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| citations.get(index));
            match url {
                Some(url) => format!("[[{}]]({})", number.as_str(), url),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    if !has_sources_block(&processed) {
        processed.push_str("\n\n");
        processed.push_str(SOURCES_HEADING);
        processed.push('\n');
        for (index, url) in citations.iter().enumerate() {
            processed.push_str(&format!("{}. [{}]({})\n", index + 1, url, url));
        }
    }

    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cites() -> Vec<String> {
        vec!["http://a".to_string(), "http://b".to_string()]
    }

    #[test]
    fn test_markers_linked_and_sources_appended() {
        let out = process_citations("See [1] and [2].", &cites());
        assert!(out.contains("[[1]](http://a)"));
        assert!(out.contains("[[2]](http://b)"));
        assert!(out.contains(SOURCES_HEADING));
        assert_eq!(out.matches("1. [http://a](http://a)").count(), 1);
        assert_eq!(out.matches("2. [http://b](http://b)").count(), 1);
    }

    #[test]
    fn test_idempotent() {
        let once = process_citations("See [1], [2] and [1] again.", &cites());
        let twice = process_citations(&once, &cites());
        assert_eq!(once, twice);
        assert_eq!(twice.matches(SOURCES_HEADING).count(), 1);
    }

    #[test]
    fn test_out_of_range_marker_untouched() {
        let out = process_citations("See [3].", &cites());
        assert!(out.starts_with("See [3]."));
    }

    #[test]
    fn test_no_citations_no_change() {
        assert_eq!(process_citations("See [1].", &[]), "See [1].");
    }

    #[test]
    fn test_existing_chinese_sources_heading() {
        let content = "见 [1]。\n\n来源：\n1. http://a";
        let out = process_citations(content, &cites());
        assert!(out.contains("[[1]](http://a)"));
        assert!(!out.contains(SOURCES_HEADING));
    }

    #[test]
    fn test_zero_marker_untouched() {
        let out = process_citations("Item [0] here.", &cites());
        assert!(out.starts_with("Item [0] here."));
    }
}
