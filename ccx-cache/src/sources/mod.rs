//! Source Gateway
//!
//! Fetches raw country descriptors and exchange rates from the two external
//! providers. Both fetches are timeout-bounded and never retried; any
//! failure surfaces as [`CacheError::SourceUnavailable`](crate::CacheError).

pub mod http;

pub use http::HttpSourceGateway;

use crate::error::CacheResult;
use serde::Deserialize;
use std::collections::HashMap;

/// Name used for the country directory in errors and logs
pub const COUNTRIES_SOURCE: &str = "Countries API";

/// Name used for the exchange rate provider in errors and logs
pub const RATES_SOURCE: &str = "Exchange Rate API";

/// One currency entry of a country descriptor
///
/// Only the code is read; names and symbols are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCurrency {
    #[serde(default)]
    pub code: Option<String>,
}

/// Country descriptor as delivered by the directory source
///
/// Every field is optional here; the reconciler decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCountry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<i64>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub currencies: Option<Vec<RawCurrency>>,
}

/// Decoded directory payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryDescriptors {
    pub countries: Vec<RawCountry>,
    /// Elements of the payload that could not be decoded at all
    pub undecodable: usize,
}

/// Rates relative to a common base currency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRates {
    /// Currency code (uppercase) to rate
    pub rates: HashMap<String, f64>,
}

impl ExchangeRates {
    pub fn new(rates: HashMap<String, f64>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(code, rate)| (code.to_uppercase(), rate))
            .collect();
        Self { rates }
    }

    /// Rate for an uppercase currency code
    pub fn rate_for(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Access to the two external providers
///
/// The HTTP implementation is [`HttpSourceGateway`]; tests substitute
/// in-memory gateways.
#[async_trait::async_trait]
pub trait SourceGateway: Send + Sync {
    /// Fetch the ordered list of country descriptors
    async fn fetch_countries(&self) -> CacheResult<CountryDescriptors>;

    /// Fetch the currency code to rate mapping
    async fn fetch_exchange_rates(&self) -> CacheResult<ExchangeRates>;
}
