//! Reconciliation Engine
//!
//! Turns raw descriptors into canonical [`CountryRecord`]s: validates the
//! required fields, resolves the primary currency and its rate, and computes
//! the estimated GDP.
//!
//! Unresolved rate policy: when a country has a currency code but the rate
//! table has no entry for it, both `exchange_rate` and `estimated_gdp` are
//! left empty. Only a country with no currency at all gets an estimate of 0.

use crate::sources::{ExchangeRates, RawCountry, RawCurrency};
use ccx_common::db::{CountryRecord, NO_CURRENCY};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;
use tracing::{debug, warn};

/// Lower bound of the GDP multiplier (inclusive)
pub const MULTIPLIER_MIN: u32 = 1000;

/// Upper bound of the GDP multiplier (inclusive)
pub const MULTIPLIER_MAX: u32 = 2000;

/// Supplies one multiplier per estimated record
pub trait MultiplierSource: Send + Sync {
    fn next_multiplier(&self) -> u32;
}

/// Uniform draw from `[MULTIPLIER_MIN, MULTIPLIER_MAX]`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMultiplier;

impl MultiplierSource for RandomMultiplier {
    fn next_multiplier(&self) -> u32 {
        rand::thread_rng().gen_range(MULTIPLIER_MIN..=MULTIPLIER_MAX)
    }
}

/// Always returns the same multiplier
#[derive(Debug, Clone, Copy)]
pub struct FixedMultiplier(pub u32);

impl MultiplierSource for FixedMultiplier {
    fn next_multiplier(&self) -> u32 {
        self.0
    }
}

/// Why a descriptor was left out of the batch
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingName,
    MissingPopulation,
    NegativePopulation(i64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingName => write!(f, "missing name"),
            SkipReason::MissingPopulation => write!(f, "missing population"),
            SkipReason::NegativePopulation(p) => write!(f, "negative population {}", p),
        }
    }
}

/// Canonical records produced from one fetch
#[derive(Debug, Clone)]
pub struct ReconciledBatch {
    pub records: Vec<CountryRecord>,
    pub skipped: usize,
    pub refreshed_at: DateTime<Utc>,
}

/// Reconcile every descriptor, stamping all records with `refreshed_at`
pub fn reconcile_batch(
    countries: Vec<RawCountry>,
    rates: &ExchangeRates,
    multiplier: &dyn MultiplierSource,
    refreshed_at: DateTime<Utc>,
) -> ReconciledBatch {
    let mut records = Vec::with_capacity(countries.len());
    let mut skipped = 0;

    for raw in countries {
        let label = raw.name.clone().unwrap_or_default();
        match reconcile_country(raw, rates, multiplier, refreshed_at) {
            Ok(record) => records.push(record),
            Err(reason) => {
                skipped += 1;
                warn!(country = %label, %reason, "Skipping country descriptor");
            }
        }
    }

    debug!(accepted = records.len(), skipped, "Reconciled batch");
    ReconciledBatch {
        records,
        skipped,
        refreshed_at,
    }
}

/// Build the canonical record for a single descriptor
pub fn reconcile_country(
    raw: RawCountry,
    rates: &ExchangeRates,
    multiplier: &dyn MultiplierSource,
    refreshed_at: DateTime<Utc>,
) -> Result<CountryRecord, SkipReason> {
    let name = non_empty(raw.name).ok_or(SkipReason::MissingName)?;
    let population = raw.population.ok_or(SkipReason::MissingPopulation)?;
    if population < 0 {
        return Err(SkipReason::NegativePopulation(population));
    }

    let currency_code = resolve_currency(raw.currencies.as_deref());

    let (currency_code, exchange_rate, estimated_gdp) = match currency_code {
        None => (NO_CURRENCY.to_string(), None, Some(0.0)),
        Some(code) => {
            let rate = rates.rate_for(&code);
            let gdp = rate.and_then(|rate| {
                if population > 0 && rate.is_finite() && rate > 0.0 {
                    Some(estimate_gdp(population, rate, multiplier.next_multiplier()))
                } else {
                    None
                }
            });
            (code, rate, gdp)
        }
    };

    Ok(CountryRecord {
        name,
        capital: non_empty(raw.capital),
        region: non_empty(raw.region),
        population,
        currency_code,
        exchange_rate,
        estimated_gdp,
        flag_url: non_empty(raw.flag),
        last_refreshed_at: refreshed_at,
    })
}

/// Uppercased code of the first currency entry, if it has one
pub fn resolve_currency(currencies: Option<&[RawCurrency]>) -> Option<String> {
    currencies
        .and_then(|list| list.first())
        .and_then(|currency| currency.code.as_deref())
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_uppercase)
}

/// `population × multiplier ÷ rate`
pub fn estimate_gdp(population: i64, rate: f64, multiplier: u32) -> f64 {
    population as f64 * f64::from(multiplier) / rate
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 28, 12, 0, 0).unwrap()
    }

    fn rates(entries: &[(&str, f64)]) -> ExchangeRates {
        let map: HashMap<String, f64> = entries
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        ExchangeRates::new(map)
    }

    fn country(name: &str, population: i64, codes: &[&str]) -> RawCountry {
        RawCountry {
            name: Some(name.to_string()),
            population: Some(population),
            currencies: Some(
                codes
                    .iter()
                    .map(|code| RawCurrency {
                        code: Some(code.to_string()),
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_estimate_with_fixed_multiplier() {
        let record = reconcile_country(
            country("Nigeria", 206_139_589, &["NGN"]),
            &rates(&[("NGN", 1600.0)]),
            &FixedMultiplier(1500),
            stamp(),
        )
        .unwrap();

        assert_eq!(record.currency_code, "NGN");
        assert_eq!(record.exchange_rate, Some(1600.0));
        assert_eq!(record.estimated_gdp, Some(206_139_589.0 * 1500.0 / 1600.0));
    }

    #[test]
    fn test_first_currency_wins_and_is_uppercased() {
        let record = reconcile_country(
            country("Zimbabwe", 14_862_927, &["usd", "ZWL"]),
            &rates(&[("USD", 1.0)]),
            &FixedMultiplier(1000),
            stamp(),
        )
        .unwrap();

        assert_eq!(record.currency_code, "USD");
        assert_eq!(record.estimated_gdp, Some(14_862_927_000.0));
    }

    #[test]
    fn test_no_currency_gets_sentinel_and_zero_estimate() {
        let mut raw = country("Antarctica", 1000, &[]);
        let record = reconcile_country(raw.clone(), &rates(&[]), &FixedMultiplier(1500), stamp())
            .unwrap();
        assert_eq!(record.currency_code, NO_CURRENCY);
        assert_eq!(record.exchange_rate, None);
        assert_eq!(record.estimated_gdp, Some(0.0));

        raw.currencies = None;
        let record = reconcile_country(raw, &rates(&[]), &FixedMultiplier(1500), stamp()).unwrap();
        assert_eq!(record.currency_code, NO_CURRENCY);
        assert_eq!(record.estimated_gdp, Some(0.0));
    }

    #[test]
    fn test_currency_entry_without_code_is_unresolved() {
        let raw = RawCountry {
            currencies: Some(vec![RawCurrency { code: None }]),
            ..country("Somewhere", 10, &[])
        };
        let record = reconcile_country(raw, &rates(&[]), &FixedMultiplier(1500), stamp()).unwrap();
        assert_eq!(record.currency_code, NO_CURRENCY);
        assert_eq!(record.estimated_gdp, Some(0.0));
    }

    #[test]
    fn test_unresolved_rate_leaves_rate_and_estimate_empty() {
        let record = reconcile_country(
            country("Testland", 1_000_000, &["abc"]),
            &rates(&[("USD", 1.0)]),
            &FixedMultiplier(1500),
            stamp(),
        )
        .unwrap();

        assert_eq!(record.currency_code, "ABC");
        assert_eq!((record.exchange_rate, record.estimated_gdp), (None, None));
    }

    #[test]
    fn test_zero_population_has_no_estimate() {
        let record = reconcile_country(
            country("Empty Isle", 0, &["EUR"]),
            &rates(&[("EUR", 0.9)]),
            &FixedMultiplier(1500),
            stamp(),
        )
        .unwrap();
        assert_eq!(record.exchange_rate, Some(0.9));
        assert_eq!(record.estimated_gdp, None);
    }

    #[test]
    fn test_missing_required_fields_are_skipped() {
        let no_name = RawCountry {
            name: None,
            ..country("x", 1, &["EUR"])
        };
        let blank_name = RawCountry {
            name: Some("   ".to_string()),
            ..country("x", 1, &["EUR"])
        };
        let no_population = RawCountry {
            population: None,
            ..country("Nowhere", 1, &["EUR"])
        };

        let batch = reconcile_batch(
            vec![no_name, blank_name, no_population, country("Malta", 514_564, &["EUR"])],
            &rates(&[("EUR", 0.92)]),
            &FixedMultiplier(1500),
            stamp(),
        );

        assert_eq!(batch.skipped, 3);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].name, "Malta");
    }

    #[test]
    fn test_negative_population_is_skipped() {
        let result = reconcile_country(
            country("Backwards", -5, &["EUR"]),
            &rates(&[]),
            &FixedMultiplier(1500),
            stamp(),
        );
        assert_eq!(result.unwrap_err(), SkipReason::NegativePopulation(-5));
    }

    #[test]
    fn test_batch_shares_one_timestamp() {
        let batch = reconcile_batch(
            vec![country("A", 1, &["EUR"]), country("B", 2, &[])],
            &rates(&[("EUR", 1.0)]),
            &RandomMultiplier,
            stamp(),
        );
        assert!(batch.records.iter().all(|r| r.last_refreshed_at == stamp()));
    }

    #[test]
    fn test_random_multiplier_stays_in_range() {
        let source = RandomMultiplier;
        for _ in 0..1000 {
            let m = source.next_multiplier();
            assert!((MULTIPLIER_MIN..=MULTIPLIER_MAX).contains(&m));
        }
    }

    #[test]
    fn test_blank_optional_fields_become_none() {
        let raw = RawCountry {
            capital: Some("".to_string()),
            region: Some(" Europe ".to_string()),
            flag: Some("https://flagcdn.com/mt.svg".to_string()),
            ..country("Malta", 514_564, &["EUR"])
        };
        let record = reconcile_country(raw, &rates(&[]), &FixedMultiplier(1500), stamp()).unwrap();
        assert_eq!(record.capital, None);
        assert_eq!(record.region.as_deref(), Some("Europe"));
        assert_eq!(record.flag_url.as_deref(), Some("https://flagcdn.com/mt.svg"));
    }
}
