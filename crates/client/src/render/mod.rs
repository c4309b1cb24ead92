//! Headless browser rendering for JS-heavy pages.
//!
//! This module provides a renderer trait and a feature-gated implementation
//! using chromiumoxide for headless Chrome/Chromium browser control. Each
//! render launches its own browser in a throwaway profile; the session guard
//! in `session` tears it down on every exit path.

#[cfg(feature = "render")]
mod session;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use linkpeek_core::AppConfig;

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to get page content.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// Timeout waiting for page to load.
    #[error("render timeout after {0}ms")]
    Timeout(u64),

    /// Browser closed unexpectedly.
    #[error("browser closed unexpectedly")]
    BrowserClosed,

    /// Rendering is not compiled in or switched off.
    #[error("rendering disabled")]
    Disabled,
}

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Budget for the whole render, including browser launch (default: 30000).
    pub timeout_ms: u64,

    /// Quiet period with no new network resources that counts as idle (default: 500).
    pub network_idle_ms: u64,

    /// How often the resource count is sampled (default: 100).
    pub poll_interval_ms: u64,

    /// Viewport dimensions (default: 1280x720).
    pub viewport: (u32, u32),
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { timeout_ms: 30000, network_idle_ms: 500, poll_interval_ms: 100, viewport: (1280, 720) }
    }
}

impl From<&AppConfig> for RenderOptions {
    fn from(config: &AppConfig) -> Self {
        Self { timeout_ms: config.render_timeout_ms, network_idle_ms: config.network_idle_ms, ..Default::default() }
    }
}

impl RenderOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Longest time spent waiting for network idle before extracting anyway.
    pub fn idle_cap(&self) -> Duration {
        self.timeout() / 2
    }
}

/// How the browser process is started.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Explicit Chrome/Chromium binary; auto-detected when `None`.
    pub chrome_executable: Option<PathBuf>,

    /// Pass `--no-sandbox`.
    pub no_sandbox: bool,
}

impl From<&AppConfig> for LaunchOptions {
    fn from(config: &AppConfig) -> Self {
        Self { chrome_executable: config.chrome_executable.clone(), no_sandbox: config.render_no_sandbox }
    }
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Serialized DOM after script execution.
    pub html: String,

    /// Final URL after redirects.
    pub final_url: Url,

    /// Time taken to render in milliseconds.
    pub render_time_ms: u64,
}

/// Renderer trait for headless browser page rendering.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Render a URL to HTML via headless browser.
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError>;
}

/// Renderer used when rendering is switched off; always fails with [`RenderError::Disabled`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

#[async_trait::async_trait]
impl Renderer for DisabledRenderer {
    async fn render(&self, _url: &Url, _opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Disabled)
    }
}

/// Headless Chrome/Chromium renderer using chromiumoxide.
///
/// Holds only launch settings and a pool of browser slots; every
/// [`Renderer::render`] call takes a slot, gets a fresh browser process and
/// shuts it down before the call returns. Waiting for a slot counts against
/// the render timeout.
#[cfg(feature = "render")]
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    launch: LaunchOptions,
    slots: std::sync::Arc<tokio::sync::Semaphore>,
}

#[cfg(feature = "render")]
impl HeadlessRenderer {
    /// Allow at most `max_concurrent` browsers at once (minimum 1).
    pub fn new(launch: LaunchOptions, max_concurrent: usize) -> Self {
        Self { launch, slots: std::sync::Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1))) }
    }
}

#[cfg(feature = "render")]
#[async_trait::async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        let start = std::time::Instant::now();
        let deadline = tokio::time::Instant::now() + opts.timeout();
        let timed_out = |_| RenderError::Timeout(opts.timeout_ms);

        let _slot = tokio::time::timeout_at(deadline, self.slots.acquire())
            .await
            .map_err(timed_out)?
            .map_err(|_| RenderError::BrowserClosed)?;

        let session = tokio::time::timeout_at(deadline, session::BrowserSession::launch(&self.launch, opts))
            .await
            .map_err(timed_out)??;

        let loaded = tokio::time::timeout_at(deadline, session.load(url, opts)).await;
        session.close().await;

        let (html, final_url) = loaded.map_err(timed_out)??;
        let render_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("rendered {} -> {} in {}ms ({} bytes)", url, final_url, render_time_ms, html.len());

        Ok(RenderedPage { html, final_url, render_time_ms })
    }
}

/// Build the renderer selected by `config`.
pub fn renderer_from_config(config: &AppConfig) -> std::sync::Arc<dyn Renderer> {
    #[cfg(feature = "render")]
    {
        if config.render_enabled {
            return std::sync::Arc::new(HeadlessRenderer::new(LaunchOptions::from(config), config.render_max_concurrent));
        }
    }

    if config.render_enabled {
        tracing::warn!("render_enabled is set but linkpeek was built without the `render` feature");
    }
    std::sync::Arc::new(DisabledRenderer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_from_config() {
        let config = AppConfig { render_timeout_ms: 8000, network_idle_ms: 750, ..Default::default() };
        let opts = RenderOptions::from(&config);
        assert_eq!(opts.timeout(), Duration::from_millis(8000));
        assert_eq!(opts.network_idle(), Duration::from_millis(750));
        assert_eq!(opts.idle_cap(), Duration::from_millis(4000));
        assert_eq!(opts.viewport, (1280, 720));
    }

    #[test]
    fn test_launch_options_from_config() {
        let config = AppConfig { render_no_sandbox: true, chrome_executable: Some("/usr/bin/chromium".into()), ..Default::default() };
        let launch = LaunchOptions::from(&config);
        assert!(launch.no_sandbox);
        assert_eq!(launch.chrome_executable, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[tokio::test]
    async fn test_disabled_renderer() {
        let url = Url::parse("https://example.com").unwrap();
        let result = DisabledRenderer.render(&url, &RenderOptions::default()).await;
        assert!(matches!(result, Err(RenderError::Disabled)));
    }

    #[tokio::test]
    #[cfg(feature = "render")]
    async fn test_waiting_for_a_slot_times_out() {
        let renderer = HeadlessRenderer::new(LaunchOptions::default(), 1);
        let _held = renderer.slots.clone().acquire_owned().await.unwrap();

        let url = Url::parse("https://example.com").unwrap();
        let opts = RenderOptions { timeout_ms: 50, ..Default::default() };
        let result = renderer.render(&url, &opts).await;

        assert!(matches!(result, Err(RenderError::Timeout(50))));
        assert_eq!(renderer.slots.available_permits(), 0);
    }

    #[test]
    #[cfg(feature = "render")]
    fn test_slot_count_has_a_floor() {
        let renderer = HeadlessRenderer::new(LaunchOptions::default(), 0);
        assert_eq!(renderer.slots.available_permits(), 1);

        let config = AppConfig { render_max_concurrent: 3, ..Default::default() };
        let renderer = HeadlessRenderer::new(LaunchOptions::from(&config), config.render_max_concurrent);
        assert_eq!(renderer.slots.available_permits(), 3);
    }

    #[tokio::test]
    #[cfg(feature = "render")]
    #[ignore = "requires network and Chrome/Chromium"]
    async fn test_render_simple_page() {
        let renderer = HeadlessRenderer::new(LaunchOptions { no_sandbox: true, ..Default::default() }, 1);
        let url = Url::parse("https://example.com").unwrap();

        let page = renderer.render(&url, &RenderOptions::default()).await.unwrap();
        assert!(page.html.contains("Example Domain"));
        assert_eq!(page.final_url.as_str(), "https://example.com/");
    }
}
