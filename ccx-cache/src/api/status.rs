//! Aggregate status endpoint

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CacheResult;
use crate::store::load_status;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub total_countries: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub cache_status: &'static str,
    pub version: i64,
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> CacheResult<Json<StatusResponse>> {
    let status = load_status(&state.db).await?;
    Ok(Json(StatusResponse {
        total_countries: status.total_countries,
        last_refreshed_at: status.last_refreshed_at,
        cache_status: status.cache_status(),
        version: status.version,
    }))
}
