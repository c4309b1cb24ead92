//! Fixed-window request limiter keyed by client IP.
//!
//! Each address gets `limit` requests per window; the window starts with the
//! first request and resets once it has fully elapsed. Counts live in memory
//! only and are lost on restart.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::RwLock;
use tokio::time::Instant;

use linkpeek_core::AppConfig;

use crate::error::ApiError;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: RwLock<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, windows: RwLock::new(HashMap::new()) }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.rate_limit_total, config.rate_limit_window())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a request from `ip` at `now`.
    pub async fn check_at(&self, ip: IpAddr, now: Instant) -> Decision {
        let mut windows = self.windows.write().await;
        let entry = windows.entry(ip).or_insert(Window { started: now, count: 0 });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.limit {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return Decision::Limited { retry_after };
        }

        entry.count += 1;
        Decision::Allowed { remaining: self.limit - entry.count }
    }

    pub async fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, Instant::now()).await
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub async fn prune_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < self.window);
        before - windows.len()
    }

    /// Prune once per window until the task is aborted.
    pub fn spawn_pruner(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.window);
            loop {
                ticker.tick().await;
                let removed = limiter.prune_at(Instant::now()).await;
                if removed > 0 {
                    tracing::debug!(removed, "pruned rate limit windows");
                }
            }
        })
    }
}

/// Client address from the connection; unspecified when the server was not
/// started with connect info (as in router tests).
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware enforcing the limiter on the routes it is layered onto.
pub async fn enforce(State(limiter): State<Arc<RateLimiter>>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request);
    let limit = HeaderValue::from(limiter.limit());

    match limiter.check(ip).await {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(LIMIT_HEADER, limit);
            headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            tracing::info!(%ip, "rate limit exceeded");
            let mut response = ApiError::RateLimited.into_response();
            let headers = response.headers_mut();
            headers.insert(LIMIT_HEADER, limit);
            headers.insert(REMAINING_HEADER, HeaderValue::from(0u32));
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs().max(1)));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test]
    async fn test_limit_is_exact() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        assert_eq!(limiter.check_at(ip(1), now).await, Decision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at(ip(1), now).await, Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at(ip(1), now).await, Decision::Allowed { remaining: 0 });
        assert!(matches!(limiter.check_at(ip(1), now).await, Decision::Limited { .. }));
    }

    #[tokio::test]
    async fn test_clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(matches!(limiter.check_at(ip(1), now).await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at(ip(2), now).await, Decision::Allowed { .. }));
        assert!(matches!(limiter.check_at(ip(1), now).await, Decision::Limited { .. }));
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at(ip(1), start).await;
        let Decision::Limited { retry_after } = limiter.check_at(ip(1), start + Duration::from_secs(20)).await else {
            panic!("expected limited");
        };
        assert_eq!(retry_after, Duration::from_secs(40));

        let later = start + Duration::from_secs(60);
        assert_eq!(limiter.check_at(ip(1), later).await, Decision::Allowed { remaining: 0 });
    }

    #[tokio::test]
    async fn test_prune_drops_elapsed_windows() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at(ip(1), start).await;
        limiter.check_at(ip(2), start + Duration::from_secs(30)).await;

        assert_eq!(limiter.prune_at(start + Duration::from_secs(61)).await, 1);
        assert_eq!(limiter.prune_at(start + Duration::from_secs(61)).await, 0);
    }
}
