use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::element_text;

static CRUMB_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"li.breadcrumb span[property="name"]"#).unwrap());

/// Join the breadcrumb trail into a single " > "-separated line. `None` when
/// the markup holds no crumbs.
pub fn breadcrumb(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let parts: Vec<String> = fragment
        .select(&CRUMB_SEL)
        .map(|e| element_text(&e))
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" > "))
    }
}

/// Fallback title: the page `<title>`, stripped at the site-name separator.
pub fn title_from_page_title(raw: &str) -> String {
    super::clean_text(raw.split('|').next().unwrap_or(""))
}

/// Pick the document title: the primary heading when it carries any text,
/// otherwise the stripped page `<title>`. A blank heading counts as absent.
pub fn resolve_title(heading: Option<&str>, page_title: &str) -> String {
    match heading.map(super::clean_text) {
        Some(t) if !t.is_empty() => t,
        _ => title_from_page_title(page_title),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumb_joins_crumbs_in_order() {
        let html = r#"
            <li class="breadcrumb"><span property="name">Home</span></li>
            <li class="breadcrumb"><span property="name">Legal
                Documents</span></li>
            <li class="breadcrumb"><span property="name">NDA</span></li>
        "#;
        assert_eq!(breadcrumb(html).unwrap(), "Home > Legal Documents > NDA");
    }

    #[test]
    fn breadcrumb_absent_is_none() {
        assert_eq!(breadcrumb("<ol></ol>"), None);
        assert_eq!(breadcrumb(""), None);
    }

    #[test]
    fn resolve_title_prefers_heading() {
        assert_eq!(
            resolve_title(Some(" Lease   Agreement "), "Lease | Site"),
            "Lease Agreement"
        );
    }

    #[test]
    fn absent_or_blank_heading_falls_back_to_page_title() {
        assert_eq!(
            resolve_title(None, "Non-Disclosure Agreement | Some Site"),
            "Non-Disclosure Agreement"
        );
        assert_eq!(
            resolve_title(Some("  \n\t"), "Non-Disclosure Agreement | Some Site"),
            "Non-Disclosure Agreement"
        );
    }

    #[test]
    fn title_strips_site_suffix() {
        assert_eq!(
            title_from_page_title("Non-Disclosure Agreement | Some Site"),
            "Non-Disclosure Agreement"
        );
        assert_eq!(title_from_page_title("Plain Title"), "Plain Title");
        assert_eq!(title_from_page_title(""), "");
    }
}
