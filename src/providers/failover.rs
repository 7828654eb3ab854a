//! Failover market-data source implementation

use crate::{
    provider::MarketDataSource,
    types::{CoinListing, CoinMarketData},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Source that asks several sources in order until one returns data
pub struct FailoverSource {
    sources: Vec<Arc<dyn MarketDataSource>>,
}

impl FailoverSource {
    /// Creates a new failover source
    ///
    /// The sources are tried in the order they are provided.
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl MarketDataSource for FailoverSource {
    async fn list_coins(&self) -> Vec<CoinListing> {
        for source in &self.sources {
            let coins = source.list_coins().await;
            if !coins.is_empty() {
                return coins;
            }
            tracing::warn!(source = source.source_name(), "Source returned no coin list");
        }
        Vec::new()
    }

    async fn get_market(&self, ids: &[String], vs_currency: &str) -> Vec<CoinMarketData> {
        if ids.is_empty() {
            return Vec::new();
        }

        for source in &self.sources {
            let market = source.get_market(ids, vs_currency).await;
            if !market.is_empty() {
                return market;
            }
            tracing::warn!(
                source = source.source_name(),
                ids = ids.len(),
                "Source returned no market data"
            );
        }
        Vec::new()
    }

    fn source_name(&self) -> &'static str {
        "failover"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockSource;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_falls_through_to_second_source() {
        let empty = Arc::new(MockSource::new());
        let backup = Arc::new(MockSource::new());
        backup.add_coin("bitcoin", "btc", "Bitcoin");
        backup.set_price("bitcoin", dec!(60000), None);

        let failover = FailoverSource::new(vec![empty.clone(), backup.clone()]);

        assert_eq!(failover.list_coins().await.len(), 1);
        let market = failover.get_market(&["bitcoin".to_string()], "usd").await;
        assert_eq!(market[0].price(), dec!(60000));
        assert_eq!(empty.market_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_no_sources() {
        let failover = FailoverSource::new(vec![]);
        assert!(failover.list_coins().await.is_empty());
    }
}
