//! Shared fixtures for ccx-cache integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use ccx_cache::error::{CacheResult, SourceFailure};
use ccx_cache::reconcile::FixedMultiplier;
use ccx_cache::sources::{
    CountryDescriptors, ExchangeRates, RawCountry, RawCurrency, SourceGateway, COUNTRIES_SOURCE,
    RATES_SOURCE,
};
use ccx_cache::{CacheError, RefreshService};
use ccx_common::db::init_database;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// In-memory stand-in for both upstream sources
///
/// `None` for either payload makes that fetch fail with a 500 status.
#[derive(Default)]
pub struct StubSources {
    countries: Mutex<Option<Vec<RawCountry>>>,
    rates: Mutex<Option<ExchangeRates>>,
    undecodable: usize,
    delay: Option<Duration>,
}

impl StubSources {
    pub fn new(countries: Vec<RawCountry>, rates: ExchangeRates) -> Self {
        Self {
            countries: Mutex::new(Some(countries)),
            rates: Mutex::new(Some(rates)),
            undecodable: 0,
            delay: None,
        }
    }

    /// Report `count` payload elements that failed to decode
    pub fn with_undecodable(mut self, count: usize) -> Self {
        self.undecodable = count;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_countries(&self, countries: Option<Vec<RawCountry>>) {
        *self.countries.lock().unwrap() = countries;
    }

    pub fn set_rates(&self, rates: Option<ExchangeRates>) {
        *self.rates.lock().unwrap() = rates;
    }
}

#[async_trait]
impl SourceGateway for StubSources {
    async fn fetch_countries(&self) -> CacheResult<CountryDescriptors> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let countries = self.countries.lock().unwrap().clone();
        countries
            .map(|countries| CountryDescriptors {
                countries,
                undecodable: self.undecodable,
            })
            .ok_or_else(|| {
                CacheError::source_unavailable(COUNTRIES_SOURCE, SourceFailure::Status(500))
            })
    }

    async fn fetch_exchange_rates(&self) -> CacheResult<ExchangeRates> {
        let rates = self.rates.lock().unwrap().clone();
        rates.ok_or_else(|| CacheError::source_unavailable(RATES_SOURCE, SourceFailure::Status(500)))
    }
}

/// Country descriptor with one currency
pub fn country(name: &str, population: i64, currency: Option<&str>) -> RawCountry {
    RawCountry {
        name: Some(name.to_string()),
        capital: Some(format!("{} City", name)),
        region: Some("Europe".to_string()),
        population: Some(population),
        flag: Some(format!("https://flags.example/{}.svg", name.to_lowercase())),
        currencies: currency.map(|code| {
            vec![RawCurrency {
                code: Some(code.to_string()),
            }]
        }),
    }
}

pub fn country_in(name: &str, region: &str, population: i64, currency: &str) -> RawCountry {
    RawCountry {
        region: Some(region.to_string()),
        ..country(name, population, Some(currency))
    }
}

pub fn rates(pairs: &[(&str, f64)]) -> ExchangeRates {
    let map: HashMap<String, f64> = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    ExchangeRates::new(map)
}

/// Temp-dir backed store plus a refresh service using a fixed multiplier
pub struct TestEnv {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub sources: Arc<StubSources>,
    pub refresher: RefreshService,
}

impl TestEnv {
    pub fn artifact_path(&self) -> PathBuf {
        self.dir.path().join("cache").join("summary.png")
    }
}

pub async fn setup(sources: StubSources, multiplier: u32) -> TestEnv {
    let dir = TempDir::new().expect("create temp dir");
    let pool = init_database(&dir.path().join("ccx.db"))
        .await
        .expect("init database");
    let sources = Arc::new(sources);
    let refresher = RefreshService::new(
        pool.clone(),
        sources.clone(),
        Arc::new(FixedMultiplier(multiplier)),
        dir.path().join("cache").join("summary.png"),
    );
    TestEnv {
        dir,
        pool,
        sources,
        refresher,
    }
}
