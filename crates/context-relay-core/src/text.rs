//! Query text handling: newline normalization, tier-2 token selection, and
//! parsing of keyword lists returned by a completion model.

use crate::error::{RelayError, Result};

/// Separator the keyword prompt asks the model to use.
pub const KEYWORD_SEPARATOR: &str = ", ";

/// Inclusive bounds on how many keywords an extraction may yield.
pub const MIN_KEYWORDS: usize = 1;
pub const MAX_KEYWORDS: usize = 10;

/// Trim `input` and replace every run of line breaks with a single space.
///
/// `\r\n`, `\n` and `\r` all count as line breaks. Spaces already in the
/// text are left untouched.
///
/// ```rust
/// use context_relay_core::text::normalize_query;
///
/// assert_eq!(normalize_query("  line1\nline2 "), "line1 line2");
/// assert_eq!(normalize_query("a\r\n\r\nb"), "a b");
/// ```
pub fn normalize_query(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_break = false;
    for ch in input.trim().chars() {
        if ch == '\n' || ch == '\r' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out
}

/// The first `limit` space-delimited tokens of an already-normalized query.
///
/// Empty tokens produced by repeated spaces are skipped, so fewer than
/// `limit` tokens come back only when the query itself is shorter.
pub fn query_tokens(query: &str, limit: usize) -> Vec<&str> {
    query
        .split(' ')
        .filter(|t| !t.is_empty())
        .take(limit)
        .collect()
}

/// Number of whitespace-separated words, used as a cheap token estimate.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split a completion response into keywords and validate the count.
///
/// The response is trimmed and split on [`KEYWORD_SEPARATOR`]; blank items
/// are dropped. Fewer than [`MIN_KEYWORDS`] or more than [`MAX_KEYWORDS`]
/// items is a [`RelayError::Validation`].
pub fn parse_keywords(response: &str) -> Result<Vec<String>> {
    let keywords: Vec<String> = response
        .trim()
        .split(KEYWORD_SEPARATOR)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    if !(MIN_KEYWORDS..=MAX_KEYWORDS).contains(&keywords.len()) {
        return Err(RelayError::validation(format!(
            "expected {}..={} keywords, got {}",
            MIN_KEYWORDS,
            MAX_KEYWORDS,
            keywords.len()
        )));
    }

    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_newlines() {
        assert_eq!(normalize_query("line1\nline2"), "line1 line2");
        assert_eq!(normalize_query("line1\n\n\nline2"), "line1 line2");
        assert_eq!(normalize_query("\n  padded \n"), "padded");
    }

    #[test]
    fn test_normalize_keeps_inner_spaces() {
        assert_eq!(normalize_query("a  b"), "a  b");
    }

    #[test]
    fn test_tokens_take_first_three() {
        let tokens = query_tokens("find me a good recipe", 3);
        assert_eq!(tokens, vec!["find", "me", "a"]);
    }

    #[test]
    fn test_tokens_short_query() {
        assert_eq!(query_tokens("pasta", 3), vec!["pasta"]);
        assert!(query_tokens("", 3).is_empty());
    }

    #[test]
    fn test_tokens_skip_empty_segments() {
        assert_eq!(query_tokens("a  b   c d", 3), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_keywords_splits_on_separator() {
        let keywords = parse_keywords("a, b, c").unwrap();
        assert_eq!(keywords, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_keywords_rejects_empty() {
        let err = parse_keywords("").unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        assert!(parse_keywords("   ").is_err());
    }

    #[test]
    fn test_parse_keywords_rejects_eleven() {
        let response = (1..=11)
            .map(|i| format!("k{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        assert!(matches!(
            parse_keywords(&response),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_keywords_accepts_ten() {
        let response = (1..=10)
            .map(|i| format!("k{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        assert_eq!(parse_keywords(&response).unwrap().len(), 10);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count(""), 0);
    }
}
