//! Fetching and extraction for linkpeek.
//!
//! This crate turns a URL into preview metadata: the static HTTP fetch,
//! headless rendering, HTML extraction, and the orchestrator that runs
//! them behind the metadata cache.

pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod render;
pub mod stage;

pub use extract::{ImageSource, RawExtraction, extract_metadata, normalize};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, UrlError, hostname, validate_url};
pub use pipeline::{Preview, PreviewService, Source};
pub use render::{DisabledRenderer, RenderError, RenderOptions, RenderedPage, Renderer, renderer_from_config};
pub use stage::{MetadataSource, RenderedFetcher, StageOutcome, StaticFetcher};

#[cfg(feature = "render")]
pub use render::{HeadlessRenderer, LaunchOptions};
