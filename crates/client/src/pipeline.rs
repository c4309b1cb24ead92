//! Extraction orchestrator.
//!
//! validate → cache lookup → static stage → (if empty) rendered stage →
//! normalize → cache write. Only [`Error::InvalidUrl`] and
//! [`Error::NoMetadataFound`] leave this module on the expected paths.

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use linkpeek_core::{AppConfig, CacheRecord, Error, LinkPreview, MetadataCache};

use crate::extract::{RawExtraction, normalize};
use crate::fetch::{FetchClient, FetchConfig, hostname, validate_url};
use crate::render::{RenderOptions, renderer_from_config};
use crate::stage::{MetadataSource, RenderedFetcher, StageOutcome, StaticFetcher};

/// Where a preview came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Static,
    Rendered,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Static => "static",
            Source::Rendered => "rendered",
        }
    }
}

/// A preview together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub metadata: LinkPreview,
    pub source: Source,
}

/// Runs the two-stage extraction pipeline behind a cache.
#[derive(Clone)]
pub struct PreviewService {
    cache: Arc<dyn MetadataCache>,
    static_stage: Arc<dyn MetadataSource>,
    rendered_stage: Arc<dyn MetadataSource>,
}

impl PreviewService {
    /// Assemble a service from explicit parts.
    pub fn new(
        cache: Arc<dyn MetadataCache>, static_stage: Arc<dyn MetadataSource>, rendered_stage: Arc<dyn MetadataSource>,
    ) -> Self {
        Self { cache, static_stage, rendered_stage }
    }

    /// Build the production stages described by `config`.
    pub fn from_config(config: &AppConfig, cache: Arc<dyn MetadataCache>) -> Result<Self, Error> {
        let client = FetchClient::new(FetchConfig::from(config))?;
        let static_stage = Arc::new(StaticFetcher::new(client));
        let rendered_stage = Arc::new(RenderedFetcher::new(renderer_from_config(config), RenderOptions::from(config)));
        Ok(Self::new(cache, static_stage, rendered_stage))
    }

    /// Produce a normalized preview for a raw `url` query value.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUrl` if the input fails validation (nothing is fetched)
    /// - `Error::NoMetadataFound` if neither stage found anything
    pub async fn preview(&self, raw_url: &str) -> Result<Preview, Error> {
        let url = validate_url(raw_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let key = url.as_str();

        match self.cache.lookup(key).await {
            Ok(Some(record)) => {
                tracing::debug!(url = key, "cache hit");
                return Ok(Preview { metadata: record.into(), source: Source::Cache });
            }
            Ok(None) => {}
            Err(e) => log_cache_failure(key, &e, "cache lookup failed; continuing uncached"),
        }

        let (raw, source) = self.run_stages(&url).await?;
        let metadata = normalize(&raw, &hostname(&url));

        let record = CacheRecord::new(key, Utc::now(), &metadata);
        if let Err(e) = self.cache.store(&record).await {
            log_cache_failure(key, &e, "cache write failed");
        }

        tracing::info!(url = key, source = source.as_str(), "preview extracted");

        Ok(Preview { metadata, source })
    }

    /// Run the stages without cache or normalization.
    pub async fn extract_raw(&self, raw_url: &str) -> Result<RawExtraction, Error> {
        let url = validate_url(raw_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.run_stages(&url).await.map(|(raw, _)| raw)
    }

    async fn run_stages(&self, url: &Url) -> Result<(RawExtraction, Source), Error> {
        if let StageOutcome::Usable(raw) = self.static_stage.extract(url).await {
            return Ok((raw, Source::Static));
        }

        tracing::debug!(%url, stage = self.rendered_stage.name(), "falling back");

        match self.rendered_stage.extract(url).await {
            StageOutcome::Usable(raw) => Ok((raw, Source::Rendered)),
            StageOutcome::Empty => Err(Error::NoMetadataFound(url.to_string())),
        }
    }
}

/// Storage faults are expected and only warned about; anything else a cache
/// implementation returns is logged as an error.
fn log_cache_failure(url: &str, e: &Error, message: &str) {
    if e.is_cache_error() {
        tracing::warn!(url, error = %e, "{message}");
    } else {
        tracing::error!(url, error = %e, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ImageSource;
    use linkpeek_core::{CacheDb, CacheGateway};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStage {
        outcome: StageOutcome,
        calls: AtomicUsize,
    }

    impl CountingStage {
        fn new(outcome: StageOutcome) -> Arc<Self> {
            Arc::new(Self { outcome, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MetadataSource for CountingStage {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn extract(&self, _url: &Url) -> StageOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    struct BrokenCache;

    #[async_trait::async_trait]
    impl MetadataCache for BrokenCache {
        async fn lookup(&self, _url: &str) -> Result<Option<CacheRecord>, Error> {
            Err(Error::MigrationFailed("cache unavailable".into()))
        }

        async fn store(&self, _record: &CacheRecord) -> Result<(), Error> {
            Err(Error::InvalidRecord("read-only".into()))
        }
    }

    struct MisbehavingCache;

    #[async_trait::async_trait]
    impl MetadataCache for MisbehavingCache {
        async fn lookup(&self, _url: &str) -> Result<Option<CacheRecord>, Error> {
            Err(Error::InvalidInput("unexpected lookup failure".into()))
        }

        async fn store(&self, _record: &CacheRecord) -> Result<(), Error> {
            Err(Error::InvalidInput("unexpected store failure".into()))
        }
    }

    fn raw_with_meta(title: &str) -> RawExtraction {
        RawExtraction {
            meta: [("title".to_string(), title.to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    async fn cache() -> Arc<CacheGateway> {
        Arc::new(CacheGateway::new(CacheDb::open_in_memory().await.unwrap(), &AppConfig::default()))
    }

    #[tokio::test]
    async fn test_empty_url_fetches_nothing() {
        let static_stage = CountingStage::new(StageOutcome::Usable(raw_with_meta("x")));
        let rendered_stage = CountingStage::new(StageOutcome::Empty);
        let service = PreviewService::new(cache().await, static_stage.clone(), rendered_stage.clone());

        for input in ["", "   ", "\t\n"] {
            assert!(matches!(service.preview(input).await, Err(Error::InvalidUrl(_))));
        }
        assert!(matches!(service.preview("not a url").await, Err(Error::InvalidUrl(_))));

        assert_eq!(static_stage.calls(), 0);
        assert_eq!(rendered_stage.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_usable_skips_render() {
        let static_stage = CountingStage::new(StageOutcome::Usable(raw_with_meta("Static Title")));
        let rendered_stage = CountingStage::new(StageOutcome::Usable(raw_with_meta("Rendered Title")));
        let service = PreviewService::new(cache().await, static_stage.clone(), rendered_stage.clone());

        let preview = service.preview("example.com").await.unwrap();
        assert_eq!(preview.source, Source::Static);
        assert_eq!(preview.metadata.title, "Static Title");
        assert_eq!(preview.metadata.hostname, "example.com");
        assert_eq!(rendered_stage.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_empty_falls_back_to_rendered() {
        let static_stage = CountingStage::new(StageOutcome::Empty);
        let rendered_stage = CountingStage::new(StageOutcome::Usable(raw_with_meta("Rendered Title")));
        let service = PreviewService::new(cache().await, static_stage.clone(), rendered_stage.clone());

        let preview = service.preview("https://spa.example.com/app").await.unwrap();
        assert_eq!(preview.source, Source::Rendered);
        assert_eq!(preview.metadata.title, "Rendered Title");
        assert_eq!(static_stage.calls(), 1);
        assert_eq!(rendered_stage.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_empty_is_not_found() {
        let static_stage = CountingStage::new(StageOutcome::Empty);
        let rendered_stage = CountingStage::new(StageOutcome::Empty);
        let cache = cache().await;
        let service = PreviewService::new(cache.clone(), static_stage, rendered_stage);

        let result = service.preview("http://ex.com/p").await;
        assert!(matches!(result, Err(Error::NoMetadataFound(_))));
        assert!(cache.db().get_record("http://ex.com/p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let raw = RawExtraction {
            og: [("title".to_string(), "T".to_string())].into_iter().collect(),
            meta: [("description".to_string(), "D".to_string())].into_iter().collect(),
            images: vec![ImageSource { src: "http://ex.com/img/a.png".into() }],
        };
        let static_stage = CountingStage::new(StageOutcome::Usable(raw));
        let rendered_stage = CountingStage::new(StageOutcome::Empty);
        let service = PreviewService::new(cache().await, static_stage.clone(), rendered_stage.clone());

        let first = service.preview("ex.com/p").await.unwrap();
        let second = service.preview("http://ex.com/p").await.unwrap();

        assert_eq!(first.source, Source::Static);
        assert_eq!(second.source, Source::Cache);
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(second.metadata.title, "T");
        assert_eq!(second.metadata.site_name, "");
        assert_eq!(second.metadata.description.as_deref(), Some("D"));
        assert_eq!(second.metadata.image.as_deref(), Some("http://ex.com/img/a.png"));
        assert_eq!(static_stage.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_failures_are_absorbed() {
        let static_stage = CountingStage::new(StageOutcome::Usable(raw_with_meta("Still Works")));
        let rendered_stage = CountingStage::new(StageOutcome::Empty);
        let service = PreviewService::new(Arc::new(BrokenCache), static_stage.clone(), rendered_stage);

        let preview = service.preview("example.com").await.unwrap();
        assert_eq!(preview.metadata.title, "Still Works");
        assert_eq!(static_stage.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_storage_cache_errors_are_absorbed() {
        let static_stage = CountingStage::new(StageOutcome::Usable(raw_with_meta("Uncached")));
        let rendered_stage = CountingStage::new(StageOutcome::Empty);
        let service = PreviewService::new(Arc::new(MisbehavingCache), static_stage.clone(), rendered_stage);

        assert!(!Error::InvalidInput("x".into()).is_cache_error());
        let preview = service.preview("example.com").await.unwrap();
        assert_eq!(preview.source, Source::Static);
        assert_eq!(preview.metadata.title, "Uncached");
    }

    #[tokio::test]
    async fn test_extract_raw_bypasses_cache() {
        let static_stage = CountingStage::new(StageOutcome::Usable(raw_with_meta("Raw")));
        let rendered_stage = CountingStage::new(StageOutcome::Empty);
        let cache = cache().await;
        let service = PreviewService::new(cache.clone(), static_stage.clone(), rendered_stage);

        let raw = service.extract_raw("example.com").await.unwrap();
        assert_eq!(raw.meta.get("title").map(String::as_str), Some("Raw"));
        service.extract_raw("example.com").await.unwrap();

        assert_eq!(static_stage.calls(), 2);
        assert!(cache.db().get_record("http://example.com/").await.unwrap().is_none());
    }
}
