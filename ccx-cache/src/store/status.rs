//! Status & Ranking Accessor
//!
//! Reads only. Functions are generic over the executor so the upserter can
//! run the same queries inside its transaction.

use ccx_common::db::{AggregateStatus, RankedCountry, STATUS_ROW_ID};
use sqlx::{Executor, Row, Sqlite};

/// Number of countries shown in the summary ranking
pub const TOP_RANK_LIMIT: i64 = 5;

/// Load the singleton status row
///
/// A missing row reads as an empty cache.
pub async fn load_status<'e, E>(executor: E) -> Result<AggregateStatus, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT total_countries, last_refreshed_at, updated_at, version FROM refresh_status WHERE id = ?",
    )
    .bind(STATUS_ROW_ID)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => Ok(AggregateStatus {
            total_countries: row.try_get("total_countries")?,
            last_refreshed_at: row.try_get("last_refreshed_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        }),
        None => Ok(AggregateStatus {
            total_countries: 0,
            last_refreshed_at: None,
            updated_at: None,
            version: 0,
        }),
    }
}

/// Top `limit` countries by estimated GDP, descending
///
/// Ties are broken by case-insensitive name; countries without an estimate sort last.
pub async fn top_by_gdp<'e, E>(executor: E, limit: i64) -> Result<Vec<RankedCountry>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT name, estimated_gdp FROM countries \
         ORDER BY estimated_gdp DESC NULLS LAST, name_key ASC \
         LIMIT ?",
    )
    .bind(limit.max(0))
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(RankedCountry {
                name: row.try_get("name")?,
                estimated_gdp: row.try_get("estimated_gdp")?,
            })
        })
        .collect()
}
