use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::{element_text, Definition};

static ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.faq-container").unwrap());
static QUESTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.faq-question-container").unwrap());
static ANSWER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.faq-answer-container").unwrap());

/// Parse the FAQ section: each item carries its own question and answer
/// sub-containers, so pairing is by containment rather than position. Items
/// missing either sub-container are skipped.
pub fn parse(html: &str) -> Vec<Definition> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&ITEM_SEL)
        .filter_map(|item| {
            let question = item.select(&QUESTION_SEL).next()?;
            let answer = item.select(&ANSWER_SEL).next()?;
            Some(Definition {
                question: element_text(&question),
                answer: element_text(&answer),
            })
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_by_containment() {
        let html = r#"
            <ul>
              <li class="faq-container">
                <div class="faq-question-container">How long does it last?</div>
                <div class="faq-answer-container">Until
                    terminated.</div>
              </li>
              <li class="faq-container">
                <div class="faq-question-container">Is it binding?</div>
                <div class="faq-answer-container">Yes.</div>
              </li>
            </ul>
        "#;
        let defs = parse(html);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].question, "How long does it last?");
        assert_eq!(defs[0].answer, "Until terminated.");
        assert_eq!(defs[1].answer, "Yes.");
    }

    #[test]
    fn items_missing_a_subcontainer_are_skipped() {
        let html = r#"
            <li class="faq-container">
              <div class="faq-question-container">Orphan question</div>
            </li>
            <li class="faq-container">
              <div class="faq-question-container">Complete?</div>
              <div class="faq-answer-container">Yes.</div>
            </li>
        "#;
        let defs = parse(html);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].question, "Complete?");
    }

    #[test]
    fn absent_section_yields_nothing() {
        assert!(parse("<div>unrelated</div>").is_empty());
    }
}
