//! Syntactic URL validation for incoming preview requests.
//!
//! This is a sanity check on the shape of the string only; it says nothing
//! about whether the host is reachable.

use regex::Regex;
use std::sync::LazyLock;

/// Scheme, optional `www.`, host ending in a 2-6 letter suffix, optional path/query.
static URL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[a-z][a-z0-9+.-]*://(www\.)?[-a-z0-9@:%._+~#=]{1,256}\.[a-z]{2,6}\b([-a-z0-9@:%_+.~#?&/=]*)",
    )
    .expect("valid URL shape pattern")
});

/// Error type for URL validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("malformed URL: {0}")]
    Malformed(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Prepend `http://` when the input carries no scheme delimiter.
pub fn with_default_scheme(input: &str) -> String {
    if input.contains("://") { input.to_string() } else { format!("http://{input}") }
}

/// Validate a raw `url` query value.
///
/// Steps:
/// 1. Trim leading/trailing whitespace; reject if empty
/// 2. Prepend `http://` if there is no `://`
/// 3. Match the permissive URL shape pattern
/// 4. Parse, and accept only `http`/`https`
pub fn validate_url(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = with_default_scheme(trimmed);

    if !URL_SHAPE.is_match(&url_str) {
        return Err(UrlError::Malformed(url_str));
    }

    let parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none() {
        return Err(UrlError::InvalidUrl(format!("no host in {url_str}")));
    }

    Ok(parsed)
}

/// Host of a validated URL, without port.
pub fn hostname(url: &url::Url) -> String {
    url.host_str().unwrap_or_default().to_string()
}
