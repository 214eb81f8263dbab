//! Refresh pipeline
//!
//! fetch (both sources, concurrently) → reconcile → upsert → render.
//! A failure at any stage before the commit leaves the cache untouched.

use crate::error::{CacheError, CacheResult};
use crate::reconcile::{reconcile_batch, MultiplierSource};
use crate::render::{save_artifact, Summary};
use crate::sources::SourceGateway;
use crate::store::upsert_batch;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Value returned to the caller of a successful refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshResult {
    pub total_records: i64,
    pub timestamp: DateTime<Utc>,
    pub inserted: usize,
    pub updated: usize,
    /// Undecodable descriptors plus those rejected during reconciliation
    pub skipped: usize,
}

/// Runs refreshes against one store and one artifact path
///
/// Only one refresh runs at a time per service; a second caller gets
/// [`CacheError::RefreshInProgress`] instead of waiting.
#[derive(Clone)]
pub struct RefreshService {
    db: SqlitePool,
    sources: Arc<dyn SourceGateway>,
    multiplier: Arc<dyn MultiplierSource>,
    artifact_path: PathBuf,
    in_progress: Arc<Mutex<()>>,
}

impl RefreshService {
    pub fn new(
        db: SqlitePool,
        sources: Arc<dyn SourceGateway>,
        multiplier: Arc<dyn MultiplierSource>,
        artifact_path: PathBuf,
    ) -> Self {
        Self {
            db,
            sources,
            multiplier,
            artifact_path,
            in_progress: Arc::new(Mutex::new(())),
        }
    }

    pub fn artifact_path(&self) -> &PathBuf {
        &self.artifact_path
    }

    /// Run one refresh end to end
    pub async fn refresh(&self) -> CacheResult<RefreshResult> {
        let _guard = self.in_progress.try_lock().map_err(|_| {
            warn!("Refresh rejected: another refresh is in progress");
            CacheError::RefreshInProgress
        })?;

        // Both sources must succeed before anything else happens
        let (descriptors, rates) = tokio::try_join!(
            self.sources.fetch_countries(),
            self.sources.fetch_exchange_rates()
        )?;
        info!(
            countries = descriptors.countries.len(),
            undecodable = descriptors.undecodable,
            rates = rates.len(),
            "Fetched source data"
        );

        let refreshed_at = ccx_common::time::batch_timestamp();
        let batch = reconcile_batch(
            descriptors.countries,
            &rates,
            self.multiplier.as_ref(),
            refreshed_at,
        );
        let skipped = batch.skipped + descriptors.undecodable;

        let outcome = upsert_batch(&self.db, &batch.records, refreshed_at).await?;

        let summary = Summary {
            total_countries: outcome.total_countries,
            refreshed_at,
            top: outcome.top.clone(),
        };
        save_artifact(self.artifact_path.clone(), summary).await?;

        info!(
            total = outcome.total_countries,
            inserted = outcome.inserted,
            updated = outcome.updated,
            skipped,
            "Refresh complete"
        );

        Ok(RefreshResult {
            total_records: outcome.total_countries,
            timestamp: refreshed_at,
            inserted: outcome.inserted,
            updated: outcome.updated,
            skipped,
        })
    }
}
