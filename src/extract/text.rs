use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static CONTROL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n\r\t]+").expect("valid regex"));
static MULTI_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Strip HTML tags, collapse whitespace and trim
pub fn sanitize_text(text: &str) -> String {
    let stripped = TAGS.replace_all(text, "");
    let flattened = CONTROL_WS.replace_all(&stripped, " ");
    MULTI_WS.replace_all(&flattened, " ").trim().to_string()
}

/// Parse a selector, logging instead of failing on malformed input
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            log::warn!("Invalid selector '{}': {}", css, e);
            None
        }
    }
}

/// Concatenated text of every descendant text node (DOM `textContent`)
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Trimmed text content, `None` when empty
pub fn trimmed_text(element: ElementRef<'_>) -> Option<String> {
    let text = text_content(element).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

/// First descendant of `scope` matching `css`
pub fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    scope.select(&sel).next()
}

/// All descendants of `scope` matching `css`, in document order
pub fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => scope.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// First element found by the candidates, tried in priority order
pub fn first_match<'a>(scope: ElementRef<'a>, candidates: &[&str]) -> Option<ElementRef<'a>> {
    candidates.iter().find_map(|css| select_first(scope, css))
}

/// Trimmed text of the first candidate element that exists
pub fn first_text(scope: ElementRef<'_>, candidates: &[&str]) -> Option<String> {
    first_match(scope, candidates).and_then(trimmed_text)
}

/// The `<body>` element, or the document root for fragments without one
pub fn body(document: &Html) -> ElementRef<'_> {
    select_first(document.root_element(), "body").unwrap_or_else(|| document.root_element())
}

/// Text content with `<script>`, `<style>` and `<noscript>` bodies left out
pub fn visible_text(scope: ElementRef<'_>) -> String {
    let mut out = String::new();

    for node in scope.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));

        if !hidden {
            out.push_str(text);
        }
    }

    out
}

/// Next sibling that is an element (DOM `nextElementSibling`)
pub fn next_element_sibling<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

/// Length in characters, the unit the length heuristics are written in
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  <b>Hello</b>\n\n  world\t!  "), "Hello world !");
        assert_eq!(sanitize_text(""), "");
        assert_eq!(sanitize_text("a    b"), "a b");
    }

    #[test]
    fn test_first_match_priority() {
        let doc = Html::parse_document(r#"<div><span class="b">second</span><span class="a">first</span></div>"#);
        let root = doc.root_element();

        assert_eq!(first_text(root, &[".a", ".b"]), Some("first".to_string()));
        assert_eq!(first_text(root, &[".missing", ".b"]), Some("second".to_string()));
        assert_eq!(first_text(root, &[".missing"]), None);
    }

    #[test]
    fn test_first_text_empty_element_is_none() {
        let doc = Html::parse_document(r#"<div><span class="a">   </span><span class="b">x</span></div>"#);
        // the first existing candidate wins even if it is blank
        assert_eq!(first_text(doc.root_element(), &[".a", ".b"]), None);
    }

    #[test]
    fn test_invalid_selector_is_total() {
        let doc = Html::parse_document("<p>x</p>");
        assert!(select_first(doc.root_element(), "p[[").is_none());
        assert!(select_all(doc.root_element(), "::nope(").is_empty());
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let doc = Html::parse_document("<body><p>Shown</p><script>var hidden = 1;</script><style>.x{}</style></body>");
        let text = visible_text(body(&doc));
        assert!(text.contains("Shown"));
        assert!(!text.contains("hidden"));
        assert!(!text.contains(".x"));
    }

    #[test]
    fn test_next_element_sibling() {
        let doc = Html::parse_document("<dl><dt>Key</dt> text <dd>Value</dd></dl>");
        let dt = select_first(doc.root_element(), "dt").unwrap();
        let dd = next_element_sibling(dt).unwrap();
        assert_eq!(dd.value().name(), "dd");
    }
}
