#![doc = include_str!("../README.md")]

//! ## Environment Variables
//!
//! - `HOST`: Server host (default: 127.0.0.1)
//! - `PORT`: Server port (default: 3001)
//! - `SITE_ROOT`: Directory served as the static site (default: .)
//! - `DATA_FILE`: Data file written by `/api/save` (default: website-data.json)
//! - `IMAGES_DIR`: Upload directory below the site root (default: assets/images)
//! - `CORS_ORIGINS`: Comma-separated list of allowed origins (default: *)
//! - `BACKEND_TIMEOUT_SECS`: Timeout for hosted backend calls (default: 5)
//! - `BLOB_API_URL`, `BLOB_TOKEN`, `BLOB_PATHNAME`, `BLOB_PUBLIC_URL`: blob store
//! - `KV_REST_API_URL`, `KV_REST_API_TOKEN`, `KV_KEY`: key-value entry
//! - `GITHUB_TOKEN`, `GITHUB_REPO`, `GITHUB_BRANCH`, `GITHUB_PATH`, `GITHUB_API_URL`: repository

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::Config;
pub use state::AppState;

use axum::{
    Router,
    handler::HandlerWithoutStateExt,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Build the full application: API routes, static site and layers.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let site = ServeDir::new(&state.config.site_root)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(handlers::not_found.into_service());

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", handlers::api_routes(state))
        .fallback_service(site)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if config.allows_any_origin() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}
