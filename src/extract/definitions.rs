use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::{element_text, Definition};

static QUESTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3.question").unwrap());
static ANSWER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.answer").unwrap());

/// Parse the definitions block: question headings paired positionally with
/// answer nodes. Unequal counts truncate to the shorter list.
pub fn parse(html: &str) -> Vec<Definition> {
    let fragment = Html::parse_fragment(html);
    let questions: Vec<String> = fragment.select(&QUESTION_SEL).map(|e| element_text(&e)).collect();
    let answers: Vec<String> = fragment.select(&ANSWER_SEL).map(|e| element_text(&e)).collect();

    questions
        .into_iter()
        .zip(answers)
        .map(|(question, answer)| Definition { question, answer })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_questions_with_answers_positionally() {
        let html = r#"
            <h3 class="question">What is an NDA?</h3>
            <div class="answer">A
                confidentiality   contract.</div>
            <h3 class="question">Who signs it?</h3>
            <div class="answer">Both parties.</div>
        "#;
        let defs = parse(html);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].question, "What is an NDA?");
        assert_eq!(defs[0].answer, "A confidentiality contract.");
        assert_eq!(defs[1].question, "Who signs it?");
    }

    #[test]
    fn unequal_counts_truncate_to_shorter_list() {
        let html = r#"
            <h3 class="question">Q1</h3>
            <h3 class="question">Q2</h3>
            <h3 class="question">Q3</h3>
            <div class="answer">A1</div>
        "#;
        let defs = parse(html);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].question, "Q1");
        assert_eq!(defs[0].answer, "A1");
    }

    #[test]
    fn empty_or_unrelated_html_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("<p>no definitions here</p>").is_empty());
    }
}
