//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Layers (outermost → innermost): CORS → request tracing → body limit.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

pub fn api_router(ctx: ApiContext) -> Router {
    let cors = cors_layer(&ctx.config.cors_origin);
    let body_limit = ctx.config.max_upload_bytes;

    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/process", post(endpoints::process::process))
        .route("/summarize", post(endpoints::summarize::summarize))
        .route("/validate", post(endpoints::validate::validate))
        .route("/detect", post(endpoints::detect::detect))
        .route("/upload", post(endpoints::upload::upload))
        .route(
            "/upload-transactions",
            post(endpoints::transactions::upload_transactions),
        )
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// A single configured origin gets credentialed CORS. `*` allows any origin,
/// which browsers only accept without credentials.
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origin.trim() == "*" {
        return layer.allow_origin(AllowOrigin::any());
    }

    let layer = layer.allow_credentials(true);
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}
