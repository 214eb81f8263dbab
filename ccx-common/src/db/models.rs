//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currency code stored when a country has no resolvable currency
pub const NO_CURRENCY: &str = "N/A";

/// Fixed key of the singleton status row
pub const STATUS_ROW_ID: i64 = 1;

/// Canonical lookup key for a country name (case-insensitive match)
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Cached country row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    /// Resolved primary currency, or [`NO_CURRENCY`]
    pub currency_code: String,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

impl CountryRecord {
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

/// Country row together with its surrogate id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCountry {
    pub id: i64,
    #[serde(flatten)]
    pub record: CountryRecord,
}

/// Singleton summary of the cache
///
/// `version` increases by one with every committed refresh or deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatus {
    pub total_countries: i64,
    /// Time of the most recent successful refresh
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Time of the most recent mutation (refresh or deletion)
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl AggregateStatus {
    /// "READY" once at least one country is cached, "EMPTY" otherwise
    pub fn cache_status(&self) -> &'static str {
        if self.total_countries > 0 {
            "READY"
        } else {
            "EMPTY"
        }
    }
}

/// Name and estimate of one ranked country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCountry {
    pub name: String,
    pub estimated_gdp: Option<f64>,
}
