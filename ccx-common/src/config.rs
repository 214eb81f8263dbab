//! Configuration loading and resolution
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CCX_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default country directory endpoint
pub const DEFAULT_COUNTRIES_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";

/// Default exchange rate endpoint (USD base)
pub const DEFAULT_RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";

/// Default timeout applied to each external fetch
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 8000;

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Runtime configuration for the cache service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Country directory source URL
    pub countries_url: String,
    /// Exchange rate source URL
    pub rates_url: String,
    /// Timeout for each external fetch, in milliseconds
    pub fetch_timeout_ms: u64,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Fixed location of the summary image
    pub artifact_path: PathBuf,
    /// HTTP listen address
    pub bind_addr: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            countries_url: DEFAULT_COUNTRIES_URL.to_string(),
            rates_url: DEFAULT_RATES_URL.to_string(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            database_path: data_dir.join("countries.db"),
            artifact_path: data_dir.join("cache").join("summary.png"),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl CacheConfig {
    /// Fetch timeout as a [`std::time::Duration`]
    pub fn fetch_timeout(&self) -> std::time::Duration {
        crate::time::millis_to_duration(self.fetch_timeout_ms)
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind_addr '{}': {}", self.bind_addr, e)))
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            return Err(Error::Config("fetch_timeout_ms must be greater than zero".to_string()));
        }
        if self.countries_url.trim().is_empty() {
            return Err(Error::Config("countries_url must not be empty".to_string()));
        }
        if self.rates_url.trim().is_empty() {
            return Err(Error::Config("rates_url must not be empty".to_string()));
        }
        self.socket_addr()?;
        Ok(())
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit TOML file; an explicit file that cannot be read is an error
    pub config_file: Option<PathBuf>,
    pub countries_url: Option<String>,
    pub rates_url: Option<String>,
    pub fetch_timeout_ms: Option<u64>,
    pub database_path: Option<PathBuf>,
    pub artifact_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
}

/// Resolve the effective configuration
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<CacheConfig> {
    // Priority 3 and 4: TOML file over compiled defaults
    let mut config = match &overrides.config_file {
        Some(path) => load_toml_config(path)?,
        None => match default_config_file() {
            Some(path) if path.exists() => load_toml_config(&path)?,
            _ => {
                info!("No config file found, using compiled defaults");
                CacheConfig::default()
            }
        },
    };

    // Priority 2: Environment variables
    apply_env(&mut config)?;

    // Priority 1: Command-line arguments
    apply_overrides(&mut config, overrides);

    config.validate()?;
    Ok(config)
}

/// Load a TOML config file; missing keys fall back to defaults
pub fn load_toml_config(path: &Path) -> Result<CacheConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: CacheConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn apply_env(config: &mut CacheConfig) -> Result<()> {
    if let Some(v) = env_value("CCX_COUNTRIES_URL") {
        config.countries_url = v;
    }
    if let Some(v) = env_value("CCX_RATES_URL") {
        config.rates_url = v;
    }
    if let Some(v) = env_value("CCX_FETCH_TIMEOUT_MS") {
        config.fetch_timeout_ms = v.parse().map_err(|_| {
            Error::Config(format!("CCX_FETCH_TIMEOUT_MS is not a valid integer: {}", v))
        })?;
    }
    if let Some(v) = env_value("CCX_DATABASE_PATH") {
        config.database_path = PathBuf::from(v);
    }
    if let Some(v) = env_value("CCX_ARTIFACT_PATH") {
        config.artifact_path = PathBuf::from(v);
    }
    if let Some(v) = env_value("CCX_BIND_ADDR") {
        config.bind_addr = v;
    }
    Ok(())
}

fn apply_overrides(config: &mut CacheConfig, overrides: &ConfigOverrides) {
    if let Some(v) = &overrides.countries_url {
        config.countries_url = v.clone();
    }
    if let Some(v) = &overrides.rates_url {
        config.rates_url = v.clone();
    }
    if let Some(v) = overrides.fetch_timeout_ms {
        config.fetch_timeout_ms = v;
    }
    if let Some(v) = &overrides.database_path {
        config.database_path = v.clone();
    }
    if let Some(v) = &overrides.artifact_path {
        config.artifact_path = v.clone();
    }
    if let Some(v) = &overrides.bind_addr {
        config.bind_addr = v.clone();
    }
}

fn env_value(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        Ok(_) => {
            warn!("{} is set but empty, ignoring", name);
            None
        }
        Err(_) => None,
    }
}

/// `~/.config/ccx/config.toml` on platforms with a config directory
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ccx").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ccx"))
        .unwrap_or_else(|| PathBuf::from("./ccx_data"))
}
