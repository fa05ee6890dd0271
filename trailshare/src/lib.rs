//! Trailshare: a peer-to-peer outdoor gear rental marketplace API.
//!
//! Owners list equipment with photos, renters request bookings, and owners
//! approve or reject them. Listings can be searched with relevance ranking,
//! favorited and synced from browser storage. A small blog carries guides.
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let db = database::connect_and_migrate(&config.database_url).await?;
//! let app = trailshare::build_router(AppState::new(db, config));
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod core;
pub mod database;
pub mod entities;
pub mod errors;
pub mod filtering;
pub mod geo;
pub mod media;
pub mod migration;
pub mod resources;
pub mod services;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod validation;

use axum::{Router, extract::DefaultBodyLimit, http::HeaderValue};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use errors::ApiError;
pub use state::AppState;

/// Room for multipart framing around the largest accepted image
const BODY_LIMIT_SLACK: usize = 64 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::header::CONTENT_RANGE])
}

/// The complete application: API routes, `/docs`, stored files and middleware
pub fn build_router(state: AppState) -> Router {
    let (api, openapi) = api::router().split_for_parts();

    // Oversized images are rejected by the upload handler with a clear
    // message; only bodies well past that are cut off here.
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_mul(2)
        .saturating_add(BODY_LIMIT_SLACK);

    let mut router = api.merge(Scalar::with_url("/docs", openapi));

    let files_prefix = state.config.storage_public_url.as_str();
    if files_prefix.starts_with('/') && files_prefix.len() > 1 {
        router = router.nest_service(files_prefix, ServeDir::new(&state.config.storage_root));
    }

    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
