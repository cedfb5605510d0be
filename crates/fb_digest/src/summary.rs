use fb_core::text::{collapse_whitespace, strip_html, truncate_chars};

use crate::locale::Locale;

const SENTENCE_CHARS: usize = 40;
const MAX_SUMMARY_CHARS: usize = 50;

/// One-line teaser for a card entry: the first sentence of the plain text,
/// clipped to 40 characters.
pub fn short_summary(text: &str, locale: Locale) -> String {
    let plain = strip_html(text).replace('\n', " ");
    let first_sentence = plain
        .trim()
        .split(locale.sentence_terminators())
        .next()
        .unwrap_or_default();
    let summary = collapse_whitespace(truncate_chars(first_sentence, SENTENCE_CHARS));

    if summary.is_empty() {
        return locale.summary_placeholder().to_string();
    }
    // Never taken while SENTENCE_CHARS < MAX_SUMMARY_CHARS, since collapsing
    // whitespace only shortens. Kept as the hard cap on entry length.
    if summary.chars().count() > MAX_SUMMARY_CHARS {
        return format!("{}...", truncate_chars(&summary, MAX_SUMMARY_CHARS));
    }
    summary
}

/// Backslash-escapes the characters that would break a `[title](url)` link.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '(' | ')' | '*' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sentence_only() {
        assert_eq!(
            short_summary("<p>Rates hold steady. Markets rally!</p>", Locale::En),
            "Rates hold steady"
        );
        assert_eq!(
            short_summary("央行维持利率不变。市场上涨！", Locale::Zh),
            "央行维持利率不变"
        );
    }

    #[test]
    fn test_newlines_are_flattened_before_splitting() {
        assert_eq!(
            short_summary("Line one\nline two", Locale::En),
            "Line one line two"
        );
    }

    #[test]
    fn test_long_sentence_is_clipped() {
        let text = "word ".repeat(30);
        let summary = short_summary(&text, Locale::En);
        assert!(summary.chars().count() <= SENTENCE_CHARS);
        assert!(summary.starts_with("word word"));
        assert!(!summary.ends_with("..."));

        let cjk = "字".repeat(80);
        assert_eq!(short_summary(&cjk, Locale::Zh).chars().count(), SENTENCE_CHARS);
    }

    #[test]
    fn test_empty_uses_placeholder() {
        assert_eq!(short_summary("", Locale::En), "view for details");
        assert_eq!(short_summary("<img src='x'/>", Locale::Zh), "点击查看详情");
        assert_eq!(short_summary(". trailing", Locale::En), "view for details");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(
            escape_markdown("[Q1] results (draft) *new* my_title"),
            r"\[Q1\] results \(draft\) \*new\* my\_title"
        );
        assert_eq!(escape_markdown("plain"), "plain");
    }
}
