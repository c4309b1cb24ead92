//! Router assembly for the linkpeek HTTP server.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/v2?url=` | Normalized preview, cached, rate limited |
//! | `GET`  | `/?url=` | Raw extraction, uncached (legacy) |
//! | `GET`  | anything else | Static files from `static_dir`, when configured |
//!
//! Every response carries `Cache-Control: public`. A panicking handler is
//! answered with the generic JSON 500.

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header, request};
use axum::routing::get;
use axum::{Router, middleware};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use linkpeek_client::PreviewService;
use linkpeek_core::AppConfig;

use crate::error::panic_response;
use crate::rate_limit::{self, RateLimiter};
use crate::routes;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub service: PreviewService,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(service: PreviewService, config: &AppConfig) -> Self {
        Self { service, limiter: Arc::new(RateLimiter::from_config(config)) }
    }
}

/// Build the full application router.
pub fn router(state: AppState, config: &AppConfig) -> Router {
    let limited = Router::new()
        .route("/v2", get(routes::preview))
        .route_layer(middleware::from_fn_with_state(state.limiter.clone(), rate_limit::enforce));

    let mut app = Router::new().route("/", get(routes::raw_metadata)).merge(limited);

    if let Some(dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static("public")))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allow the configured origins. Requests without an `Origin` header are
/// not cross-origin and pass untouched.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _: &request::Parts| {
            allowed.contains(origin)
        }))
        .allow_methods([Method::GET, Method::OPTIONS])
}
