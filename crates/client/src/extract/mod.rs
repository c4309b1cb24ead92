//! Preview metadata extraction from HTML documents.
//!
//! The same rules run over the static response body and over the DOM
//! serialized by the headless browser:
//!
//! - `meta.title` from the first `<title>`, `meta.description` from
//!   `meta[name="description"]`
//! - `og.*` from any `<meta>` whose `property` or `name` is one of
//!   [`OG_TAGS`], keyed without the `og:` prefix
//! - every `img[src]`, resolved against the page URL

pub mod images;
pub mod normalize;

pub use images::{ImageSource, extract_images};
pub use normalize::normalize;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// Open Graph tags picked up by the extractor.
pub const OG_TAGS: &[&str] = &["og:title", "og:description", "og:image", "og:site_name", "og:type", "og:url"];

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("invalid selector"));
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("invalid selector"));
static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").expect("invalid selector"));

/// Fields pulled from one fetch attempt. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub meta: BTreeMap<String, String>,
    pub og: BTreeMap<String, String>,
    pub images: Vec<ImageSource>,
}

impl RawExtraction {
    /// A static pass counts as usable only when it found `<title>` or a meta description.
    pub fn is_usable(&self) -> bool {
        !self.meta.is_empty()
    }

    /// Nothing at all was found.
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.og.is_empty() && self.images.is_empty()
    }
}

/// Return `content` if `element` declares tag `name` via `property` or `name`.
pub fn read_meta_tag<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    let el = element.value();
    if el.attr("property") == Some(name) || el.attr("name") == Some(name) { el.attr("content") } else { None }
}

/// Extract preview fields from an HTML document.
///
/// `base_url` should be the URL the document was actually served from
/// (after redirects) so relative image sources resolve correctly.
pub fn extract_metadata(html: &str, base_url: &Url) -> RawExtraction {
    let document = Html::parse_document(html);
    let mut raw = RawExtraction::default();

    if let Some(title) = document.select(&TITLE).next() {
        let text = title.text().collect::<String>();
        raw.meta.insert("title".to_string(), text.trim().to_string());
    }

    if let Some(description) = document.select(&DESCRIPTION).next() {
        let content = description.value().attr("content").unwrap_or_default();
        raw.meta.insert("description".to_string(), content.to_string());
    }

    for element in document.select(&META) {
        for tag in OG_TAGS {
            if let Some(value) = read_meta_tag(&element, tag)
                && !value.is_empty()
            {
                let key = tag.trim_start_matches("og:");
                raw.og.insert(key.to_string(), value.to_string());
            }
        }
    }

    raw.images = extract_images(&document, base_url);

    raw
}
