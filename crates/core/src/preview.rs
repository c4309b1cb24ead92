//! The normalized link preview returned to callers.

use serde::{Deserialize, Serialize};

/// Normalized page metadata for a link-preview widget.
///
/// `title` is never absent (empty when unknown) and `hostname` always comes
/// from the requested URL, never from page content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreview {
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: String,
    pub hostname: String,
}
