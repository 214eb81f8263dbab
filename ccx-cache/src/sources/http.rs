//! HTTP implementation of the Source Gateway

use super::{
    CountryDescriptors, ExchangeRates, RawCountry, SourceGateway, COUNTRIES_SOURCE, RATES_SOURCE,
};
use crate::error::{CacheError, CacheResult, SourceFailure};
use ccx_common::config::CacheConfig;
use reqwest::{header, Client};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// User-Agent sent to both providers
const USER_AGENT: &str = concat!("ccx-cache/", env!("CARGO_PKG_VERSION"));

/// Fetches both sources over HTTP with a shared per-request timeout
pub struct HttpSourceGateway {
    http_client: Client,
    countries_url: String,
    rates_url: String,
    timeout: Duration,
}

impl HttpSourceGateway {
    pub fn new(
        countries_url: impl Into<String>,
        rates_url: impl Into<String>,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let http_client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ccx_common::Error::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            countries_url: countries_url.into(),
            rates_url: rates_url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        Self::new(
            config.countries_url.clone(),
            config.rates_url.clone(),
            config.fetch_timeout(),
        )
    }

    /// GET `url` and parse the body as JSON
    async fn get_json(&self, url: &str, source_name: &str) -> CacheResult<Value> {
        info!(source = source_name, "Fetching data from {}", source_name);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_failure(source_name, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(source = source_name, status = status.as_u16(), "Source returned non-success status");
            return Err(CacheError::source_unavailable(
                source_name,
                SourceFailure::Status(status.as_u16()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_failure(source_name, e))?;

        serde_json::from_slice(&body).map_err(|e| {
            warn!(source = source_name, error = %e, "Source returned invalid JSON");
            CacheError::source_unavailable(source_name, SourceFailure::Malformed(e.to_string()))
        })
    }

    fn request_failure(&self, source_name: &str, err: reqwest::Error) -> CacheError {
        let cause = if err.is_timeout() {
            warn!(
                source = source_name,
                timeout_ms = self.timeout.as_millis() as u64,
                "Source timed out"
            );
            SourceFailure::Timeout
        } else {
            warn!(source = source_name, error = %err, "Source request failed");
            SourceFailure::Transport(err.to_string())
        };
        CacheError::source_unavailable(source_name, cause)
    }
}

#[async_trait::async_trait]
impl SourceGateway for HttpSourceGateway {
    async fn fetch_countries(&self) -> CacheResult<CountryDescriptors> {
        let payload = self.get_json(&self.countries_url, COUNTRIES_SOURCE).await?;
        parse_countries(payload)
    }

    async fn fetch_exchange_rates(&self) -> CacheResult<ExchangeRates> {
        let payload = self.get_json(&self.rates_url, RATES_SOURCE).await?;
        parse_exchange_rates(payload)
    }
}

/// Decode the directory payload element by element
///
/// A top-level value that is not an array is malformed. Individual elements
/// that cannot be decoded are skipped, logged and counted.
pub fn parse_countries(payload: Value) -> CacheResult<CountryDescriptors> {
    let items = match payload {
        Value::Array(items) => items,
        other => {
            return Err(CacheError::source_unavailable(
                COUNTRIES_SOURCE,
                SourceFailure::Malformed(format!(
                    "expected an array of countries, got {}",
                    json_kind(&other)
                )),
            ))
        }
    };

    let total = items.len();
    let mut countries = Vec::with_capacity(total);
    let mut undecodable = 0;
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawCountry>(item) {
            Ok(country) => countries.push(country),
            Err(e) => {
                undecodable += 1;
                warn!(index, error = %e, "Skipping undecodable country descriptor");
            }
        }
    }

    debug!(total, decoded = countries.len(), undecodable, "Decoded country descriptors");
    Ok(CountryDescriptors {
        countries,
        undecodable,
    })
}

/// Extract the `rates` mapping from an exchange rate payload
pub fn parse_exchange_rates(payload: Value) -> CacheResult<ExchangeRates> {
    let rates_obj = payload
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            CacheError::source_unavailable(
                RATES_SOURCE,
                SourceFailure::Malformed("missing rates object".to_string()),
            )
        })?;

    let mut rates = HashMap::with_capacity(rates_obj.len());
    for (code, value) in rates_obj {
        match value.as_f64() {
            Some(rate) => {
                rates.insert(code.clone(), rate);
            }
            None => debug!(code = %code, "Ignoring non-numeric rate"),
        }
    }

    Ok(ExchangeRates::new(rates))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
