pub mod definitions;
pub mod faq;
pub mod meta;

use scraper::ElementRef;

/// One glossary / FAQ question-answer pair, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub question: String,
    pub answer: String,
}

/// Everything extracted from a single document page. Ephemeral: consumed by
/// the exporter right after extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub title: String,
    pub breadcrumb: String,
    pub trust_text: String,
    pub definitions: Vec<Definition>,
}

/// Collapse all whitespace runs (including newlines and tabs) to single
/// spaces and trim the ends. Applied to every extracted string.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn element_text(el: &ElementRef) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  A\n\tB   C "), "A B C");
        assert_eq!(clean_text("already clean"), "already clean");
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \n\t "), "");
    }

    #[test]
    fn definitions_precede_faq_in_merge_order() {
        let defs_html = r#"
            <h3 class="question">First?</h3><div class="answer">One.</div>
            <h3 class="question">Second?</h3><div class="answer">Two.</div>
        "#;
        let faq_html = r#"
            <li class="faq-container">
              <div class="faq-question-container">Third?</div>
              <div class="faq-answer-container">Three.</div>
            </li>
        "#;
        let mut merged = definitions::parse(defs_html);
        merged.extend(faq::parse(faq_html));
        let questions: Vec<_> = merged.iter().map(|d| d.question.as_str()).collect();
        assert_eq!(questions, vec!["First?", "Second?", "Third?"]);
    }
}
