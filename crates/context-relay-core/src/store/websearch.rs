//! Parser for web-search style full-text queries.
//!
//! Follows the familiar search-box grammar:
//!
//! - bare words must all match (`rust async`)
//! - `"quoted text"` must match as a phrase
//! - `or` (any case) separates alternatives
//! - a leading `-` excludes a word or phrase
//!
//! The parse result is backend-neutral; each store translates it into its
//! own query language.

/// One word or phrase of a web-search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebTerm {
    /// Lowercased word, or space-joined lowercased phrase words.
    pub text: String,
    pub phrase: bool,
    pub negated: bool,
}

/// Alternatives joined by `or`; each alternative is a conjunction of terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebQuery {
    pub clauses: Vec<Vec<WebTerm>>,
}

impl WebQuery {
    /// True when no clause has a positive term to match on.
    pub fn is_empty(&self) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.iter().all(|t| t.negated))
    }
}

/// Lowercased alphanumeric words of `text`.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Parse a web-search query.
///
/// Punctuation inside words is dropped. An unterminated quote runs to the
/// end of the input.
pub fn parse(query: &str) -> WebQuery {
    let mut clauses: Vec<Vec<WebTerm>> = Vec::new();
    let mut current: Vec<WebTerm> = Vec::new();
    let mut chars = query.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let negated = c == '-';
        if negated {
            chars.next();
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            let mut raw = String::new();
            for ch in chars.by_ref() {
                if ch == '"' {
                    break;
                }
                raw.push(ch);
            }
            let phrase_words = words(&raw);
            if !phrase_words.is_empty() {
                current.push(WebTerm {
                    phrase: phrase_words.len() > 1,
                    text: phrase_words.join(" "),
                    negated,
                });
            }
            continue;
        }

        let mut raw = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            raw.push(ch);
            chars.next();
        }

        if !negated && raw.eq_ignore_ascii_case("or") {
            if !current.is_empty() {
                clauses.push(std::mem::take(&mut current));
            }
            continue;
        }

        for word in words(&raw) {
            current.push(WebTerm {
                text: word,
                phrase: false,
                negated,
            });
        }
    }

    if !current.is_empty() {
        clauses.push(current);
    }

    WebQuery { clauses }
}

/// Does a document's lowercased word list satisfy `query`?
pub fn matches(query: &WebQuery, doc_words: &[String]) -> bool {
    let contains = |term: &WebTerm| {
        if term.phrase {
            let needle: Vec<&str> = term.text.split(' ').collect();
            doc_words
                .windows(needle.len())
                .any(|w| w.iter().map(String::as_str).eq(needle.iter().copied()))
        } else {
            doc_words.iter().any(|w| *w == term.text)
        }
    };

    query.clauses.iter().any(|clause| {
        clause.iter().any(|t| !t.negated)
            && clause
                .iter()
                .all(|t| if t.negated { !contains(t) } else { contains(t) })
    })
}
