//! Source abstraction for fetching catalog and market data from external APIs

use crate::types::{CoinListing, CoinMarketData};
use async_trait::async_trait;

/// Trait for market-data sources
///
/// Implementations own their transport. A failed or non-success call is
/// reported as an empty result; the implementation logs the diagnostic.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches the provider's full coin catalog
    async fn list_coins(&self) -> Vec<CoinListing>;

    /// Fetches current market data for the given provider ids
    ///
    /// # Arguments
    /// * `ids` - Provider ids to quote; an empty slice yields an empty result
    /// * `vs_currency` - Quote currency, e.g. `usd`
    async fn get_market(&self, ids: &[String], vs_currency: &str) -> Vec<CoinMarketData>;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;
}
