//! The two extraction stages.
//!
//! Each stage absorbs its own failures and reports a [`StageOutcome`]; the
//! pipeline decides from the tag alone whether to try the next stage.

use std::sync::Arc;

use url::Url;

use crate::extract::{RawExtraction, extract_metadata};
use crate::fetch::FetchClient;
use crate::render::{RenderOptions, Renderer};

/// What one stage produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Metadata worth normalizing.
    Usable(RawExtraction),
    /// Nothing usable; try the next stage or report not found.
    Empty,
}

impl StageOutcome {
    pub fn is_usable(&self) -> bool {
        matches!(self, StageOutcome::Usable(_))
    }
}

/// One way of turning a URL into raw metadata.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch and extract. Must not fail; failures become [`StageOutcome::Empty`].
    async fn extract(&self, url: &Url) -> StageOutcome;
}

/// Plain HTTP GET plus HTML parsing, no script execution.
///
/// Usable only when `<title>` or a meta description was found; Open Graph
/// tags and images alone still send the request to the rendered stage.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: FetchClient,
}

impl StaticFetcher {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl MetadataSource for StaticFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn extract(&self, url: &Url) -> StageOutcome {
        let response = match self.client.fetch(url).await {
            Ok(response) => response,
            Err(e) if e.is_transient_fetch() => {
                tracing::info!(%url, error = %e, "static fetch failed");
                return StageOutcome::Empty;
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "static fetch failed unexpectedly");
                return StageOutcome::Empty;
            }
        };

        let raw = extract_metadata(&response.text(), &response.final_url);
        if raw.is_usable() {
            StageOutcome::Usable(raw)
        } else {
            tracing::debug!(
                %url,
                status = response.status.as_u16(),
                content_type = response.content_type.as_deref().unwrap_or("-"),
                fetch_ms = response.fetch_ms,
                og = raw.og.len(),
                images = raw.images.len(),
                "static pass found no meta tags"
            );
            StageOutcome::Empty
        }
    }
}

/// Headless browser load, extraction from the script-executed DOM.
///
/// Last resort: anything it finds is used, and any failure degrades to
/// [`StageOutcome::Empty`].
#[derive(Clone)]
pub struct RenderedFetcher {
    renderer: Arc<dyn Renderer>,
    opts: RenderOptions,
}

impl RenderedFetcher {
    pub fn new(renderer: Arc<dyn Renderer>, opts: RenderOptions) -> Self {
        Self { renderer, opts }
    }
}

#[async_trait::async_trait]
impl MetadataSource for RenderedFetcher {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn extract(&self, url: &Url) -> StageOutcome {
        let page = match self.renderer.render(url, &self.opts).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(%url, error = %e, "rendered fetch failed");
                return StageOutcome::Empty;
            }
        };

        let raw = extract_metadata(&page.html, &page.final_url);
        if raw.is_empty() { StageOutcome::Empty } else { StageOutcome::Usable(raw) }
    }
}
