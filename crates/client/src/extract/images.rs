//! Image source harvesting and URL resolution.

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").expect("invalid selector"));

/// An image found on the page, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageSource {
    pub src: String,
}

/// Collect every `img[src]` in document order, resolving against `base_url`.
///
/// Relative and protocol-relative sources are joined onto the base; blank
/// or unparsable sources are skipped. Duplicates are kept.
pub fn extract_images(document: &Html, base_url: &Url) -> Vec<ImageSource> {
    let mut images = Vec::new();

    for element in document.select(&IMG) {
        let src = match element.value().attr("src").map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };

        match base_url.join(src) {
            Ok(u) => images.push(ImageSource { src: u.to_string() }),
            Err(e) => tracing::trace!(src, error = %e, "skipping malformed image source"),
        }
    }

    images
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srcs(html: &str, base: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let base = Url::parse(base).unwrap();
        extract_images(&document, &base).into_iter().map(|i| i.src).collect()
    }

    #[test]
    fn test_relative_src_resolves_against_page() {
        assert_eq!(srcs(r#"<img src="/img/a.png">"#, "http://ex.com/p"), vec!["http://ex.com/img/a.png"]);
    }

    #[test]
    fn test_path_relative_src() {
        assert_eq!(
            srcs(r#"<img src="thumb.jpg">"#, "https://example.com/gallery/index.html"),
            vec!["https://example.com/gallery/thumb.jpg"]
        );
    }

    #[test]
    fn test_protocol_relative_src() {
        assert_eq!(
            srcs(r#"<img src="//cdn.example.com/x.png">"#, "https://example.com/"),
            vec!["https://cdn.example.com/x.png"]
        );
    }

    #[test]
    fn test_absolute_src_kept() {
        assert_eq!(
            srcs(r#"<img src="https://other.example.org/y.gif">"#, "https://example.com/"),
            vec!["https://other.example.org/y.gif"]
        );
    }

    #[test]
    fn test_malformed_and_blank_sources_skipped() {
        let html = r#"
            <img src="http://[broken">
            <img src="   ">
            <img>
            <img src="/ok.png">
        "#;
        assert_eq!(srcs(html, "https://example.com/"), vec!["https://example.com/ok.png"]);
    }

    #[test]
    fn test_document_order_and_duplicates() {
        let html = r#"<img src="/a.png"><img src="/b.png"><img src="/a.png">"#;
        assert_eq!(
            srcs(html, "https://example.com/"),
            vec!["https://example.com/a.png", "https://example.com/b.png", "https://example.com/a.png"]
        );
    }
}
