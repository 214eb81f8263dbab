//! Persistence Upserter
//!
//! Each public function runs in one transaction. Returning early with an
//! error drops the transaction, which rolls it back.

use super::status::{load_status, top_by_gdp, TOP_RANK_LIMIT};
use crate::error::{CacheError, CacheResult};
use ccx_common::db::{name_key, AggregateStatus, CountryRecord, RankedCountry, STATUS_ROW_ID};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Rows per multi-row statement, well under SQLite's bind parameter limit
const CHUNK_SIZE: usize = 500;

/// Result of a committed batch upsert
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub total_countries: i64,
    pub top: Vec<RankedCountry>,
    pub status: AggregateStatus,
}

/// Result of a committed deletion
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
    pub remaining_countries: i64,
}

/// Merge a reconciled batch into the store
///
/// Names are matched case-insensitively through `name_key`. When a batch
/// holds the same name more than once, the last occurrence wins. Every row
/// written carries `refreshed_at`, which also becomes the status row's
/// `last_refreshed_at`.
pub async fn upsert_batch(
    pool: &SqlitePool,
    records: &[CountryRecord],
    refreshed_at: DateTime<Utc>,
) -> CacheResult<UpsertOutcome> {
    let batch = dedupe_by_key(records);

    let mut tx = pool.begin().await?;

    // 1. Existing keys that intersect the batch
    let keys: Vec<&str> = batch.iter().map(|(key, _)| key.as_str()).collect();
    let existing = existing_keys(&mut tx, &keys).await?;

    // 2. Partition into new and existing
    let (to_update, to_insert): (Vec<_>, Vec<_>) = batch
        .iter()
        .partition(|(key, _)| existing.contains(key.as_str()));

    // 3. Bulk insert, then per-row overwrite
    for chunk in to_insert.chunks(CHUNK_SIZE) {
        insert_chunk(&mut tx, chunk, refreshed_at).await?;
    }
    for (key, record) in &to_update {
        update_row(&mut tx, key, record, refreshed_at).await?;
    }

    // 4. Live count
    let total_countries = count_countries(&mut tx).await?;

    // 5. Ranking as seen by this transaction
    let top = top_by_gdp(&mut *tx, TOP_RANK_LIMIT).await?;

    // 6. Status row
    write_status(&mut tx, total_countries, Some(refreshed_at), refreshed_at).await?;
    let status = load_status(&mut *tx).await?;

    tx.commit().await?;

    info!(
        inserted = to_insert.len(),
        updated = to_update.len(),
        total = total_countries,
        version = status.version,
        "Upsert committed"
    );

    Ok(UpsertOutcome {
        inserted: to_insert.len(),
        updated: to_update.len(),
        total_countries,
        top,
        status,
    })
}

/// Delete one country by name (case-insensitive)
///
/// Updates the status count in the same transaction. `last_refreshed_at` is
/// left alone since a deletion is not a refresh; `updated_at` and `version`
/// still move.
pub async fn delete_country(pool: &SqlitePool, name: &str) -> CacheResult<DeleteOutcome> {
    let key = name_key(name);
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM countries WHERE name_key = ?")
        .bind(&key)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(CacheError::NotFound(format!("Country '{}'", name)));
    }

    let remaining = count_countries(&mut tx).await?;
    let previous = load_status(&mut *tx).await?;
    write_status(&mut tx, remaining, previous.last_refreshed_at, ccx_common::time::now()).await?;

    tx.commit().await?;

    info!(country = %name, remaining, "Country deleted");
    Ok(DeleteOutcome {
        deleted_count: deleted,
        remaining_countries: remaining,
    })
}

/// Collapse case-variant duplicates, keeping first-seen order and last-seen values
fn dedupe_by_key(records: &[CountryRecord]) -> Vec<(String, &CountryRecord)> {
    let mut order: Vec<String> = Vec::with_capacity(records.len());
    let mut latest: HashMap<String, &CountryRecord> = HashMap::with_capacity(records.len());

    for record in records {
        let key = record.name_key();
        if latest.insert(key.clone(), record).is_none() {
            order.push(key);
        }
    }

    if order.len() < records.len() {
        debug!(
            duplicates = records.len() - order.len(),
            "Collapsed case-variant duplicate names in batch"
        );
    }

    order
        .into_iter()
        .filter_map(|key| latest.get(&key).copied().map(|record| (key, record)))
        .collect()
}

async fn existing_keys(conn: &mut SqliteConnection, keys: &[&str]) -> CacheResult<HashSet<String>> {
    let mut existing = HashSet::new();

    for chunk in keys.chunks(CHUNK_SIZE) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT name_key FROM countries WHERE name_key IN (");
        let mut separated = qb.separated(", ");
        for key in chunk {
            separated.push_bind(*key);
        }
        separated.push_unseparated(")");

        let found: Vec<String> = qb.build_query_scalar().fetch_all(&mut *conn).await?;
        existing.extend(found);
    }

    Ok(existing)
}

async fn insert_chunk(
    conn: &mut SqliteConnection,
    chunk: &[&(String, &CountryRecord)],
    refreshed_at: DateTime<Utc>,
) -> CacheResult<()> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO countries (name, name_key, capital, region, population, currency_code, \
         exchange_rate, estimated_gdp, flag_url, last_refreshed_at) ",
    );
    qb.push_values(chunk.iter(), |mut row, (key, record)| {
        row.push_bind(record.name.clone())
            .push_bind(key.clone())
            .push_bind(record.capital.clone())
            .push_bind(record.region.clone())
            .push_bind(record.population)
            .push_bind(record.currency_code.clone())
            .push_bind(record.exchange_rate)
            .push_bind(record.estimated_gdp)
            .push_bind(record.flag_url.clone())
            .push_bind(refreshed_at);
    });
    qb.build().execute(&mut *conn).await?;
    Ok(())
}

async fn update_row(
    conn: &mut SqliteConnection,
    key: &str,
    record: &CountryRecord,
    refreshed_at: DateTime<Utc>,
) -> CacheResult<()> {
    sqlx::query(
        r#"
        UPDATE countries SET
            name = ?,
            capital = ?,
            region = ?,
            population = ?,
            currency_code = ?,
            exchange_rate = ?,
            estimated_gdp = ?,
            flag_url = ?,
            last_refreshed_at = ?
        WHERE name_key = ?
        "#,
    )
    .bind(&record.name)
    .bind(&record.capital)
    .bind(&record.region)
    .bind(record.population)
    .bind(&record.currency_code)
    .bind(record.exchange_rate)
    .bind(record.estimated_gdp)
    .bind(&record.flag_url)
    .bind(refreshed_at)
    .bind(key)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn count_countries(conn: &mut SqliteConnection) -> CacheResult<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
        .fetch_one(&mut *conn)
        .await?;
    Ok(total)
}

async fn write_status(
    conn: &mut SqliteConnection,
    total_countries: i64,
    last_refreshed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
) -> CacheResult<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_status (id, total_countries, last_refreshed_at, updated_at, version)
        VALUES (?, ?, ?, ?, 1)
        ON CONFLICT(id) DO UPDATE SET
            total_countries = excluded.total_countries,
            last_refreshed_at = excluded.last_refreshed_at,
            updated_at = excluded.updated_at,
            version = refresh_status.version + 1
        "#,
    )
    .bind(STATUS_ROW_ID)
    .bind(total_countries)
    .bind(last_refreshed_at)
    .bind(updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
