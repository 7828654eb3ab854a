//! Runtime configuration
//!
//! Defaults come from `constants`. `from_env()` lets a host override them
//! without code changes.

use crate::{
    constants::{
        CHUNK_SIZE, COINGECKO_API_URL, DEFAULT_VS_CURRENCY, MAX_CONCURRENT_CHUNKS,
        MAX_RECENT_WINDOW_MINS, RECENT_WINDOW_MINS, REQUEST_TIMEOUT_SECS,
    },
    error::ConfigError,
};
use std::time::Duration;

/// Settings for one synchronization engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum ids per provider call
    pub chunk_size: usize,
    /// Maximum chunks in flight
    pub max_concurrent_chunks: usize,
    /// Boundary between stale and fresh price points
    pub recent_window: chrono::Duration,
    /// Quote currency
    pub vs_currency: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            max_concurrent_chunks: MAX_CONCURRENT_CHUNKS,
            recent_window: chrono::Duration::minutes(RECENT_WINDOW_MINS),
            vs_currency: DEFAULT_VS_CURRENCY.to_string(),
        }
    }
}

impl SyncConfig {
    /// Loads the configuration, overriding defaults from `PRICE_SYNC_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("PRICE_SYNC_CHUNK_SIZE") {
            config.chunk_size = parse_positive("PRICE_SYNC_CHUNK_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("PRICE_SYNC_MAX_CONCURRENT_CHUNKS") {
            config.max_concurrent_chunks =
                parse_positive("PRICE_SYNC_MAX_CONCURRENT_CHUNKS", &raw)?;
        }
        if let Some(raw) = lookup("PRICE_SYNC_RECENT_WINDOW_MINS") {
            config.recent_window = parse_window("PRICE_SYNC_RECENT_WINDOW_MINS", &raw)?;
        }
        if let Some(raw) = lookup("PRICE_SYNC_VS_CURRENCY") {
            let currency = raw.trim().to_lowercase();
            if currency.is_empty() {
                return Err(ConfigError::invalid("PRICE_SYNC_VS_CURRENCY", raw));
            }
            config.vs_currency = currency;
        }

        Ok(config)
    }
}

/// Settings for the CoinGecko HTTP source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    /// Demo API key; the market endpoint is rate limited harder without one
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl CoinGeckoConfig {
    /// Loads the configuration from `COINGECKO_API_URL` and `COINGECKO_API_KEY`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("COINGECKO_API_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        config.api_key = std::env::var("COINGECKO_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        config
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::invalid(key, raw)),
    }
}

/// Parses a window in minutes, bounded by `MAX_RECENT_WINDOW_MINS`
fn parse_window(key: &'static str, raw: &str) -> Result<chrono::Duration, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|mins| (1..=MAX_RECENT_WINDOW_MINS).contains(mins))
        .and_then(chrono::Duration::try_minutes)
        .ok_or_else(|| ConfigError::invalid(key, raw))
}
