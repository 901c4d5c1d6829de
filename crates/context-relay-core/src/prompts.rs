//! Prompt templates.
//!
//! Templates use `{name}` placeholders. Rendering substitutes every
//! placeholder it is given a value for and leaves unknown ones untouched.

/// A fixed prompt with `{name}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate(&'static str);

impl PromptTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self(template)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.0.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }
}

/// Asks for the most important keywords of `{text}`, joined by `", "`.
pub const MOST_IMPORTANT_KEYWORDS: PromptTemplate = PromptTemplate::new(
    "Extract the most important keywords from the text below. \
Reply with between 1 and 10 keywords on a single line, separated by a comma \
and a space (\", \"), with no numbering, quotes, or explanation.\n\n\
Text:\n{text}",
);

/// System instructions for answering with retrieved context.
pub const CONTEXTUAL_ANSWER: PromptTemplate = PromptTemplate::new(
    "You are a helpful assistant. Answer the user's question using the \
documents below when they are relevant. If the documents do not contain \
the answer, say so and answer from general knowledge.\n\n\
Documents:\n{documents}",
);

/// Render retrieved documents as a numbered list for [`CONTEXTUAL_ANSWER`].
pub fn format_documents(documents: &[String]) -> String {
    if documents.is_empty() {
        return "(no documents found)".to_string();
    }
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {}", i + 1, doc))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_placeholders() {
        let t = PromptTemplate::new("Hello {name}, see {other}");
        assert_eq!(t.render(&[("name", "Ada")]), "Hello Ada, see {other}");
    }

    #[test]
    fn test_keyword_template_embeds_text() {
        let prompt = MOST_IMPORTANT_KEYWORDS.render(&[("text", "rust async runtimes")]);
        assert!(prompt.ends_with("rust async runtimes"));
        assert!(!prompt.contains("{text}"));
    }

    #[test]
    fn test_format_documents_numbers_entries() {
        let docs = vec!["alpha".to_string(), "beta".to_string()];
        assert_eq!(format_documents(&docs), "[1] alpha\n\n[2] beta");
        assert_eq!(format_documents(&[]), "(no documents found)");
    }
}
