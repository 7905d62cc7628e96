//! sitefeed-server library - facility review ingestion service
//!
//! Accepts geotagged reviews with optional photos, resolves each to a
//! canonical site by exact coordinates, and serves listing, radius and
//! statistics queries over the stored reviews.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use sitefeed_common::config::TomlConfig;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod services;
pub mod utils;
pub mod validators;

use services::image_store::{ImageStore, URL_PREFIX};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bootstrap configuration (image limits, paging bounds)
    pub settings: Arc<TomlConfig>,
    /// Content-addressed store for review attachments
    pub image_store: ImageStore,
    /// Service startup time, for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, settings: TomlConfig, image_store: ImageStore) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            image_store,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let body_limit = state.settings.images.request_body_limit();
    let uploads = ServeDir::new(state.image_store.root());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = Router::new()
        .route(
            "/api/reviews",
            get(api::list_reviews).post(api::create_review),
        )
        .route("/api/reviews/location", get(api::reviews_by_location))
        .route("/api/reviews/statistics", get(api::review_statistics))
        .route(
            "/api/reviews/:id",
            get(api::get_review)
                .put(api::update_review)
                .delete(api::delete_review),
        )
        .route("/api/sites/:id", get(api::get_site))
        .route(
            "/api/upload/review-with-images",
            post(api::upload_review_with_images),
        )
        .route("/api/upload/images", post(api::process_images));

    Router::new()
        .merge(routes)
        .merge(api::health_routes())
        .nest_service(URL_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
