//! Filtered and paginated country reads

use super::{country_from_row, COUNTRY_COLUMNS};
use crate::error::{CacheError, CacheResult};
use crate::pagination::{calculate_pagination, Pagination};
use ccx_common::db::{name_key, StoredCountry};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Optional equality filters; both compare case-insensitively
#[derive(Debug, Clone, Default)]
pub struct CountryFilter {
    pub region: Option<String>,
    pub currency: Option<String>,
}

/// Sortable columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Population,
    EstimatedGdp,
    ExchangeRate,
    Region,
    CurrencyCode,
    Capital,
    LastRefreshedAt,
}

impl SortKey {
    /// Parse a query parameter value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Some(SortKey::Name),
            "population" => Some(SortKey::Population),
            "estimated_gdp" | "gdp" => Some(SortKey::EstimatedGdp),
            "exchange_rate" => Some(SortKey::ExchangeRate),
            "region" => Some(SortKey::Region),
            "currency_code" | "currency" => Some(SortKey::CurrencyCode),
            "capital" => Some(SortKey::Capital),
            "last_refreshed_at" => Some(SortKey::LastRefreshedAt),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortKey::Name => "name COLLATE NOCASE",
            SortKey::Population => "population",
            SortKey::EstimatedGdp => "estimated_gdp",
            SortKey::ExchangeRate => "exchange_rate",
            SortKey::Region => "region COLLATE NOCASE",
            SortKey::CurrencyCode => "currency_code",
            SortKey::Capital => "capital COLLATE NOCASE",
            SortKey::LastRefreshedAt => "last_refreshed_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than "desc" sorts ascending
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountrySort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for CountrySort {
    fn default() -> Self {
        Self {
            key: SortKey::Name,
            order: SortOrder::Asc,
        }
    }
}

impl CountrySort {
    /// Build from raw query values; an unknown key is a bad request
    pub fn from_params(sort: Option<&str>, order: Option<&str>) -> CacheResult<Self> {
        let key = match sort {
            Some(value) => SortKey::parse(value)
                .ok_or_else(|| CacheError::BadRequest(format!("Unknown sort key: {}", value)))?,
            None => SortKey::Name,
        };
        let order = order.map(SortOrder::parse).unwrap_or(SortOrder::Asc);
        Ok(Self { key, order })
    }
}

/// One page of countries plus the matching total
#[derive(Debug, Clone)]
pub struct CountryPage {
    pub countries: Vec<StoredCountry>,
    pub total: i64,
    pub page_size: i64,
    pub pagination: Pagination,
}

/// List countries matching `filter`, ordered by `sort`
pub async fn list_countries(
    pool: &SqlitePool,
    filter: &CountryFilter,
    sort: CountrySort,
    page: i64,
    page_size: i64,
) -> CacheResult<CountryPage> {
    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM countries");
    push_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let pagination = calculate_pagination(total, page, page_size);

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM countries", COUNTRY_COLUMNS));
    push_filters(&mut qb, filter);
    // Nulls last in both directions, then name for a stable order
    qb.push(format!(
        " ORDER BY {col} IS NULL, {col} {dir}, name_key ASC",
        col = sort.key.column(),
        dir = sort.order.sql()
    ));
    qb.push(" LIMIT ")
        .push_bind(pagination.page_size)
        .push(" OFFSET ")
        .push_bind(pagination.offset);

    let rows = qb.build().fetch_all(pool).await?;
    let countries = rows
        .iter()
        .map(country_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CountryPage {
        countries,
        total,
        page_size: pagination.page_size,
        pagination,
    })
}

/// Fetch one country by name (case-insensitive)
pub async fn get_country(pool: &SqlitePool, name: &str) -> CacheResult<StoredCountry> {
    let sql = format!("SELECT {} FROM countries WHERE name_key = ?", COUNTRY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(name_key(name))
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(country_from_row(&row)?),
        None => Err(CacheError::NotFound(format!("Country '{}'", name))),
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &CountryFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(region) = filter.region.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        qb.push(" AND region = ")
            .push_bind(region.to_string())
            .push(" COLLATE NOCASE");
    }
    if let Some(currency) = filter.currency.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        qb.push(" AND currency_code = ").push_bind(currency.to_uppercase());
    }
}
