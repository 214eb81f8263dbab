//! ccx-cache library - Country Currency & Exchange cache
//!
//! Pulls country metadata and USD exchange rates from two upstream sources,
//! reconciles them into one record per country, persists the batch in
//! SQLite and renders a PNG summary after every successful refresh.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;
pub mod reconcile;
pub mod refresh;
pub mod render;
pub mod sources;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use refresh::{RefreshResult, RefreshService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Refresh pipeline (owns the artifact path and the single-flight guard)
    pub refresher: RefreshService,
}

impl AppState {
    pub fn new(db: SqlitePool, refresher: RefreshService) -> Self {
        Self { db, refresher }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    // `/countries/image` is registered before `/countries/:name`; axum
    // prefers the static segment either way.
    let countries = Router::new()
        .route("/countries", get(api::list_countries))
        .route("/countries/refresh", post(api::refresh_countries))
        .route("/countries/image", get(api::get_image))
        .route(
            "/countries/:name",
            get(api::get_country).delete(api::delete_country),
        )
        .route("/status", get(api::get_status));

    Router::new()
        .route("/", get(api::root))
        .merge(countries)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
