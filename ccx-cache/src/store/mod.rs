//! Persistence layer
//!
//! - [`upsert`]: transactional batch upsert and deletion, each of which
//!   rewrites the singleton status row in the same transaction
//! - [`status`]: aggregate status and GDP ranking reads
//! - [`query`]: filtered, sorted, paginated country reads

pub mod query;
pub mod status;
pub mod upsert;

pub use query::{get_country, list_countries, CountryFilter, CountryPage, CountrySort, SortKey, SortOrder};
pub use status::{load_status, top_by_gdp, TOP_RANK_LIMIT};
pub use upsert::{delete_country, upsert_batch, DeleteOutcome, UpsertOutcome};

use ccx_common::db::{CountryRecord, StoredCountry};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Column list matching [`country_from_row`]
pub(crate) const COUNTRY_COLUMNS: &str = "id, name, capital, region, population, currency_code, \
     exchange_rate, estimated_gdp, flag_url, last_refreshed_at";

pub(crate) fn country_from_row(row: &SqliteRow) -> Result<StoredCountry, sqlx::Error> {
    Ok(StoredCountry {
        id: row.try_get("id")?,
        record: CountryRecord {
            name: row.try_get("name")?,
            capital: row.try_get("capital")?,
            region: row.try_get("region")?,
            population: row.try_get("population")?,
            currency_code: row.try_get("currency_code")?,
            exchange_rate: row.try_get("exchange_rate")?,
            estimated_gdp: row.try_get("estimated_gdp")?,
            flag_url: row.try_get("flag_url")?,
            last_refreshed_at: row.try_get("last_refreshed_at")?,
        },
    })
}
