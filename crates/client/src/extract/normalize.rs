//! Collapse a raw extraction into the stable [`LinkPreview`] shape.

use super::RawExtraction;
use linkpeek_core::LinkPreview;

fn field<'a>(map: &'a std::collections::BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Normalize `raw` for the page at `hostname`.
///
/// Precedence:
/// - image: `og:image`, then the first `<img>`, else none
/// - description: `og:description`, then the meta description, else none
/// - title: `og:title`, then `<title>`, else empty
/// - site name: `og:site_name`, else empty
///
/// Empty strings are treated as missing at every step.
pub fn normalize(raw: &RawExtraction, hostname: &str) -> LinkPreview {
    let image = field(&raw.og, "image")
        .map(str::to_string)
        .or_else(|| raw.images.first().map(|i| i.src.clone()));

    let description = field(&raw.og, "description")
        .or_else(|| field(&raw.meta, "description"))
        .map(str::to_string);

    let title = field(&raw.og, "title")
        .or_else(|| field(&raw.meta, "title"))
        .unwrap_or_default()
        .to_string();

    let site_name = field(&raw.og, "site_name").unwrap_or_default().to_string();

    LinkPreview { title, description, image, site_name, hostname: hostname.to_string() }
}
