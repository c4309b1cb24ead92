//! Scoped browser session.
//!
//! A [`BrowserSession`] owns one Chrome process, its CDP handler task and a
//! private profile directory. [`BrowserSession::close`] shuts it down
//! gracefully; if the session is dropped instead (timeout, error, request
//! cancelled), `Drop` aborts the handler and kills the process. The profile
//! directory is held by a [`ProfileDir`] guard from before launch, so it is
//! removed even when the launch itself is abandoned.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use url::Url;

use super::{LaunchOptions, RenderError, RenderOptions};

/// Upper bound for a graceful browser shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of network resources loaded so far, or -1 while the document is still loading.
const RESOURCE_COUNT_JS: &str =
    "document.readyState === 'complete' ? performance.getEntriesByType('resource').length : -1";

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Temporary browser profile, removed on drop.
#[derive(Debug)]
pub(crate) struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    /// Create a fresh, uniquely named profile directory under the temp dir.
    pub(crate) fn create() -> Result<Self, RenderError> {
        let path = std::env::temp_dir().join(format!(
            "linkpeek-render-{}-{}",
            std::process::id(),
            SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path)
            .map_err(|e| RenderError::BrowserLaunch(format!("profile dir {}: {e}", path.display())))?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!("failed to remove browser profile {}: {}", self.path.display(), e);
        }
    }
}

/// Field order matters: the browser is killed before the profile is removed.
pub(crate) struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    profile: ProfileDir,
}

impl BrowserSession {
    /// Launch a headless browser with a fresh profile directory.
    pub(crate) async fn launch(launch: &LaunchOptions, opts: &RenderOptions) -> Result<Self, RenderError> {
        let profile = ProfileDir::create()?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .window_size(opts.viewport.0, opts.viewport.1)
            .request_timeout(opts.timeout());
        if launch.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &launch.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        tracing::debug!(profile = %profile.path().display(), "browser session launched");

        Ok(Self { browser: Some(browser), handler, profile })
    }

    /// Navigate to `url`, wait for the network to settle and return the live DOM.
    pub(crate) async fn load(&self, url: &Url, opts: &RenderOptions) -> Result<(String, Url), RenderError> {
        let browser = self.browser.as_ref().ok_or(RenderError::BrowserClosed)?;

        let page = browser
            .new_page(url.as_str())
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        if tokio::time::timeout(opts.idle_cap(), wait_for_network_idle(&page, opts))
            .await
            .is_err()
        {
            tracing::debug!(%url, "network never went idle; extracting current DOM");
        }

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;

        let page_url = page
            .url()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;

        let final_url = Url::parse(page_url.as_deref().unwrap_or(url.as_str()))
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        page.close().await.ok();
        Ok((html, final_url))
    }

    /// Shut the browser down; the profile goes when `self` is dropped.
    pub(crate) async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            let shutdown = async move {
                if let Err(e) = browser.close().await {
                    tracing::debug!("browser close failed: {e}");
                }
                if let Err(e) = browser.wait().await {
                    tracing::debug!("browser wait failed: {e}");
                }
            };
            if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
                tracing::warn!("browser did not exit within {:?}; killed", CLOSE_TIMEOUT);
            }
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        if self.browser.take().is_some() {
            tracing::debug!("browser session dropped before close; killing browser");
        }
    }
}

/// Resolve once the resource count has been stable for `opts.network_idle()`.
///
/// Unbounded on its own; callers wrap it in a timeout.
async fn wait_for_network_idle(page: &Page, opts: &RenderOptions) {
    let mut last = resource_count(page).await;
    let mut stable_since = Instant::now();

    loop {
        tokio::time::sleep(opts.poll_interval()).await;
        let count = resource_count(page).await;

        if count != last || count < 0 {
            last = count;
            stable_since = Instant::now();
        } else if stable_since.elapsed() >= opts.network_idle() {
            return;
        }
    }
}

async fn resource_count(page: &Page) -> i64 {
    match page.evaluate(RESOURCE_COUNT_JS).await {
        Ok(result) => result.into_value::<i64>().unwrap_or(-1),
        Err(e) => {
            tracing::trace!("resource count query failed: {e}");
            -1
        }
    }
}
