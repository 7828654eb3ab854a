//! Per-chunk price diffing and persistence
//!
//! Compares freshly quoted prices with the last recorded ones, appends a
//! price point only when the price moved, and backfills missing icons.

use crate::{
    catalog::AssetCatalog,
    dispatcher::Chunk,
    error::SyncError,
    metrics::MetricsCollector,
    provider::MarketDataSource,
    reconciler::CatalogIndex,
    types::{change_percentage, Asset, AssetInfo, CoinMarketData, PricePoint, PriceSnapshot},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Writes and snapshots derived from one chunk of market data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkPlan {
    pub snapshots: Vec<PriceSnapshot>,
    pub price_points: Vec<PricePoint>,
    pub icon_updates: Vec<Asset>,
}

/// True if `current` should be appended after `last`
pub fn should_record(current: Decimal, last: Option<Decimal>) -> bool {
    current > Decimal::ZERO && last != Some(current)
}

/// Diffs market data against last-known asset state
///
/// Rows whose id is not in `known` are skipped. Snapshots carry the icon as
/// it was before any update queued here.
pub fn plan_chunk(
    market: &[CoinMarketData],
    known: &HashMap<String, AssetInfo>,
    observed_at: DateTime<Utc>,
) -> ChunkPlan {
    let mut plan = ChunkPlan::default();

    for data in market {
        let Some(info) = known.get(&data.id) else {
            continue;
        };

        if info.lacks_icon() {
            if let Some(icon) = data.icon_url.as_deref().filter(|icon| !icon.is_empty()) {
                plan.icon_updates.push(info.to_asset_with_icon(icon.to_string()));
            }
        }

        let current_price = data.price();

        if should_record(current_price, info.last_price) {
            plan.price_points.push(PricePoint {
                asset_id: info.id,
                price: current_price,
                observed_at,
            });
        }

        plan.snapshots.push(PriceSnapshot {
            id: info.external_id.clone(),
            name: info.name.clone(),
            symbol: info.symbol.clone(),
            icon_url: info.icon_url.clone().unwrap_or_default(),
            current_price,
            change_percentage: change_percentage(current_price, info.last_price),
            last_updated: observed_at,
        });
    }

    plan
}

/// Everything a chunk worker needs, shared read-only across workers
pub struct ChunkContext {
    pub source: Arc<dyn MarketDataSource>,
    pub catalog: Arc<dyn AssetCatalog>,
    pub index: Arc<CatalogIndex>,
    pub vs_currency: String,
    pub metrics: Arc<MetricsCollector>,
}

impl ChunkContext {
    /// Fetches, diffs and persists one chunk in its own catalog session
    pub async fn record_chunk(&self, chunk: Chunk) -> Result<Vec<PriceSnapshot>, SyncError> {
        let start = Instant::now();
        let market = self.source.get_market(&chunk.ids, &self.vs_currency).await;
        self.metrics
            .record_request(start.elapsed(), !market.is_empty())
            .await;

        let requested: HashSet<&str> = chunk.ids.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let market: Vec<CoinMarketData> = market
            .into_iter()
            .filter(|data| requested.contains(data.id.as_str()) && self.index.contains(&data.id))
            .filter(|data| seen.insert(data.id.clone()))
            .collect();

        if market.is_empty() {
            tracing::debug!(
                chunk = chunk.index,
                ids = chunk.ids.len(),
                "Chunk returned no market data"
            );
            return Ok(Vec::new());
        }

        let mut session = self.catalog.open_session().await?;

        let external_ids: Vec<String> = market.iter().map(|data| data.id.clone()).collect();
        let known: HashMap<String, AssetInfo> = session
            .assets_info(&external_ids)
            .await?
            .into_iter()
            .map(|info| (info.external_id.clone(), info))
            .collect();

        let plan = plan_chunk(&market, &known, Utc::now());
        let points = plan.price_points.len();
        let icons = plan.icon_updates.len();

        if !plan.price_points.is_empty() {
            session.add_price_points(plan.price_points);
        }
        if !plan.icon_updates.is_empty() {
            session.update_assets(plan.icon_updates);
        }
        let affected = session.commit().await?;

        tracing::info!(
            chunk = chunk.index,
            quoted = plan.snapshots.len(),
            price_points = points,
            icon_updates = icons,
            affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chunk recorded"
        );

        Ok(plan.snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::provider::mock::MockSource;
    use crate::reconciler::reconcile;
    use crate::types::{AssetId, CoinListing};
    use rust_decimal_macros::dec;

    fn info(id: i64, external_id: &str, icon: Option<&str>, last: Option<Decimal>) -> AssetInfo {
        AssetInfo {
            id: AssetId(id),
            external_id: external_id.to_string(),
            name: external_id.to_string(),
            symbol: external_id.to_string(),
            icon_url: icon.map(str::to_string),
            last_price: last,
        }
    }

    fn quote(id: &str, price: Decimal, icon: Option<&str>) -> CoinMarketData {
        CoinMarketData {
            id: id.to_string(),
            symbol: id.to_string(),
            name: id.to_string(),
            icon_url: icon.map(str::to_string),
            current_price: Some(price),
        }
    }

    fn known(infos: Vec<AssetInfo>) -> HashMap<String, AssetInfo> {
        infos
            .into_iter()
            .map(|info| (info.external_id.clone(), info))
            .collect()
    }

    #[test]
    fn test_should_record() {
        assert!(should_record(dec!(10), None));
        assert!(should_record(dec!(10), Some(dec!(9))));
        assert!(!should_record(dec!(10), Some(dec!(10.00))));
        assert!(!should_record(Decimal::ZERO, None));
        assert!(!should_record(dec!(-1), Some(dec!(2))));
    }

    #[test]
    fn test_plan_diffs_and_change() {
        let now = Utc::now();
        let known = known(vec![
            info(1, "bitcoin", Some("btc.png"), Some(dec!(50000))),
            info(2, "ethereum", Some("eth.png"), Some(dec!(3000))),
        ]);
        let market = vec![
            quote("bitcoin", dec!(55000), Some("new.png")),
            quote("ethereum", dec!(3000), None),
            quote("unknown", dec!(1), None),
        ];

        let plan = plan_chunk(&market, &known, now);

        assert_eq!(plan.snapshots.len(), 2);
        assert_eq!(plan.snapshots[0].change_percentage, dec!(10));
        assert_eq!(plan.snapshots[1].change_percentage, Decimal::ZERO);
        assert_eq!(plan.price_points.len(), 1);
        assert_eq!(plan.price_points[0].asset_id, AssetId(1));
        assert!(plan.icon_updates.is_empty());
    }

    #[test]
    fn test_plan_backfills_icon_with_pre_update_snapshot() {
        let known = known(vec![info(1, "bitcoin", Some(""), None)]);
        let market = vec![quote("bitcoin", dec!(60000), Some("https://img/btc.png"))];

        let plan = plan_chunk(&market, &known, Utc::now());

        assert_eq!(plan.icon_updates.len(), 1);
        assert_eq!(plan.icon_updates[0].icon_url.as_deref(), Some("https://img/btc.png"));
        assert_eq!(plan.snapshots[0].icon_url, "");
        assert_eq!(plan.snapshots[0].change_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_plan_ignores_missing_or_zero_quote() {
        let known = known(vec![info(1, "dead", None, Some(dec!(2)))]);
        let mut row = quote("dead", Decimal::ZERO, Some(""));
        row.current_price = None;

        let plan = plan_chunk(&[row], &known, Utc::now());

        assert!(plan.price_points.is_empty());
        assert!(plan.icon_updates.is_empty());
        assert_eq!(plan.snapshots[0].change_percentage, dec!(-100));
    }

    #[test]
    fn test_plan_survives_extreme_price_jump() {
        let known = known(vec![
            info(1, "dust", Some("d.png"), Some(dec!(0.00000000000000000001))),
            info(2, "bitcoin", Some("b.png"), Some(dec!(50000))),
        ]);
        let market = vec![
            quote("dust", dec!(1000000000), None),
            quote("bitcoin", dec!(55000), None),
        ];

        let plan = plan_chunk(&market, &known, Utc::now());

        assert_eq!(plan.price_points.len(), 2);
        assert_eq!(plan.snapshots[0].change_percentage, Decimal::ZERO);
        assert_eq!(plan.snapshots[1].change_percentage, dec!(10));
    }

    async fn context(source: Arc<MockSource>, catalog: Arc<MemoryCatalog>) -> ChunkContext {
        let coins: Vec<CoinListing> = source.list_coins().await;
        let mut session = catalog.open_session().await.unwrap();
        let reconciliation = reconcile(session.as_mut(), &coins).await.unwrap();
        ChunkContext {
            source,
            catalog,
            index: Arc::new(reconciliation.index),
            vs_currency: "usd".to_string(),
            metrics: Arc::new(MetricsCollector::new("mock")),
        }
    }

    #[tokio::test]
    async fn test_unchanged_price_appends_once() {
        let source = Arc::new(MockSource::new());
        source.add_coin("bitcoin", "btc", "Bitcoin");
        source.set_price("bitcoin", dec!(64000), Some("https://img/btc.png"));
        let catalog = Arc::new(MemoryCatalog::new());
        let ctx = context(source.clone(), catalog.clone()).await;

        let chunk = Chunk {
            index: 0,
            ids: vec!["bitcoin".to_string()],
        };
        ctx.record_chunk(chunk.clone()).await.unwrap();
        let second = ctx.record_chunk(chunk).await.unwrap();

        let asset = catalog.find_by_external_id("bitcoin").await.unwrap();
        assert_eq!(catalog.price_history(asset.id).await.len(), 1);
        assert_eq!(asset.icon_url.as_deref(), Some("https://img/btc.png"));
        assert_eq!(second[0].icon_url, "https://img/btc.png");
        assert_eq!(second[0].change_percentage, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_unrequested_rows_skipped() {
        let source = Arc::new(MockSource::new());
        source.add_coin("bitcoin", "btc", "Bitcoin");
        source.set_price("bitcoin", dec!(64000), None);
        let catalog = Arc::new(MemoryCatalog::new());
        let ctx = context(source.clone(), catalog.clone()).await;

        let snapshots = ctx
            .record_chunk(Chunk {
                index: 0,
                ids: vec!["ethereum".to_string()],
            })
            .await
            .unwrap();

        assert!(snapshots.is_empty());
        assert_eq!(catalog.sessions_opened(), 1);
    }
}
