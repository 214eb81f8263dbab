//! Country endpoints
//!
//! - `POST /countries/refresh`
//! - `GET /countries` (filters, sorting, pagination)
//! - `GET /countries/image`
//! - `GET /countries/:name`
//! - `DELETE /countries/:name`

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use ccx_common::db::StoredCountry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::render::load_artifact;
use crate::store::{self, CountryFilter, CountrySort};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub total_countries: i64,
    pub last_refreshed_at: DateTime<Utc>,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// POST /countries/refresh
pub async fn refresh_countries(State(state): State<AppState>) -> CacheResult<Json<RefreshResponse>> {
    let result = state.refresher.refresh().await?;
    Ok(Json(RefreshResponse {
        message: "Country data refreshed and cached. Summary image generated.".to_string(),
        total_countries: result.total_records,
        last_refreshed_at: result.timestamp,
        inserted: result.inserted,
        updated: result.updated,
        skipped: result.skipped,
    }))
}

/// Query parameters for country listing
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub region: Option<String>,
    pub currency: Option<String>,
    /// Sort key, e.g. "estimated_gdp"
    pub sort: Option<String>,
    /// "asc" or "desc"
    pub order: Option<String>,
    /// Page number (1-indexed)
    pub page: Option<i64>,
    /// Rows per page
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CountryListResponse {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub countries: Vec<StoredCountry>,
}

/// GET /countries
pub async fn list_countries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> CacheResult<Json<CountryListResponse>> {
    let sort = CountrySort::from_params(query.sort.as_deref(), query.order.as_deref())?;
    let filter = CountryFilter {
        region: query.region,
        currency: query.currency,
    };

    let page = store::list_countries(
        &state.db,
        &filter,
        sort,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    )
    .await?;

    Ok(Json(CountryListResponse {
        total: page.total,
        page: page.pagination.page,
        page_size: page.page_size,
        total_pages: page.pagination.total_pages,
        countries: page.countries,
    }))
}

/// GET /countries/:name
pub async fn get_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> CacheResult<Json<StoredCountry>> {
    Ok(Json(store::get_country(&state.db, &name).await?))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted_count: u64,
    pub remaining_countries: i64,
}

/// DELETE /countries/:name
pub async fn delete_country(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> CacheResult<Json<DeleteResponse>> {
    let outcome = store::delete_country(&state.db, &name).await?;
    Ok(Json(DeleteResponse {
        message: format!("Country '{}' deleted", name),
        deleted_count: outcome.deleted_count,
        remaining_countries: outcome.remaining_countries,
    }))
}

/// GET /countries/image
pub async fn get_image(State(state): State<AppState>) -> CacheResult<Response> {
    let bytes = load_artifact(state.refresher.artifact_path().clone()).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}
