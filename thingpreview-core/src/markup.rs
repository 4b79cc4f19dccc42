//! Discovery of declarative preview placeholders in page markup.
//!
//! A placeholder is any element carrying the `lazy-thing-preview` class:
//!
//! ```html
//! <span class="lazy-thing-preview" data-key="/works/OL1W" data-render="renderWorkCard"></span>
//! ```
//!
//! Discovery is deliberately lenient: placeholders with a missing key or
//! render name are still returned, and are skipped later when the coalescer
//! is initialized from them.

use once_cell::sync::Lazy;
use regex::Regex;

/// Class marking an element as a preview placeholder
pub const PLACEHOLDER_CLASS: &str = "lazy-thing-preview";

/// A `(key, render name)` pair read from the page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Placeholder {
    /// Value of `data-key`
    pub key: Option<String>,
    /// Value of `data-render`
    pub render: Option<String>,
}

impl Placeholder {
    pub fn new(key: impl Into<String>, render: impl Into<String>) -> Self {
        Self { key: Some(key.into()), render: Some(render.into()) }
    }

    /// Key and render name, if both are present and non-empty
    pub fn parts(&self) -> Option<(&str, &str)> {
        let key = self.key.as_deref().filter(|k| !k.is_empty())?;
        let render = self.render.as_deref().filter(|r| !r.is_empty())?;
        Some((key, render))
    }
}

static START_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[A-Za-z][A-Za-z0-9-]*(\s[^<>]*)?>").expect("Invalid start tag regex"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("Invalid attribute regex")
});

/// Find all preview placeholders in `html`, in document order
pub fn scan_placeholders(html: &str) -> Vec<Placeholder> {
    START_TAG
        .find_iter(html)
        .filter_map(|tag| parse_placeholder(tag.as_str()))
        .collect()
}

fn parse_placeholder(tag: &str) -> Option<Placeholder> {
    let mut is_placeholder = false;
    let mut placeholder = Placeholder::default();

    for caps in ATTRIBUTE.captures_iter(tag) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| decode_entities(m.as_str()))
            .unwrap_or_default();

        match name.as_str() {
            "class" => {
                is_placeholder = value.split_ascii_whitespace().any(|c| c == PLACEHOLDER_CLASS);
            }
            "data-key" => placeholder.key = Some(value),
            "data-render" => placeholder.render = Some(value),
            _ => {}
        }
    }

    is_placeholder.then_some(placeholder)
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_finds_placeholders_in_order() {
        let html = r#"
            <div class="list">
              <span class="lazy-thing-preview" data-key="/works/OL1W" data-render="workCard"></span>
              <p class="blurb">not a placeholder</p>
              <li data-render='authorChip' data-key='/authors/OL3A' class="chip lazy-thing-preview"></li>
            </div>
        "#;

        let found = scan_placeholders(html);
        assert_eq!(
            found,
            vec![
                Placeholder::new("/works/OL1W", "workCard"),
                Placeholder::new("/authors/OL3A", "authorChip"),
            ]
        );
    }

    #[test]
    fn test_scan_keeps_malformed_placeholders() {
        let html = r#"<span class="lazy-thing-preview" data-render="workCard"></span>
                      <span class="lazy-thing-preview" data-key="/books/OL2M"></span>"#;

        let found = scan_placeholders(html);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].key, None);
        assert!(found[0].parts().is_none());
        assert_eq!(found[1].render, None);
        assert!(found[1].parts().is_none());
    }

    #[test]
    fn test_class_must_match_whole_token() {
        let html = r#"<span class="lazy-thing-preview-old" data-key="/works/OL1W" data-render="x"></span>"#;
        assert!(scan_placeholders(html).is_empty());
    }

    #[test]
    fn test_unquoted_and_escaped_values() {
        let html = r#"<b class=lazy-thing-preview data-key=/works/OL1W data-render="card&amp;more">"#;
        let found = scan_placeholders(html);
        assert_eq!(found, vec![Placeholder::new("/works/OL1W", "card&more")]);
    }

    #[test]
    fn test_empty_values_have_no_parts() {
        let placeholder = Placeholder::new("", "card");
        assert!(placeholder.parts().is_none());
        assert_eq!(Placeholder::new("/works/OL1W", "card").parts(), Some(("/works/OL1W", "card")));
    }
}
