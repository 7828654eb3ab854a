//! Crypto price tracker service
//!
//! Ties the engine together: reconcile the catalog, prioritize, fan out
//! chunk workers, and serve the ranked listing.

use crate::{
    catalog::AssetCatalog,
    config::{CoinGeckoConfig, SyncConfig},
    constants::DEFAULT_PAGE_SIZE,
    dispatcher::BatchDispatcher,
    error::{ProviderError, SyncError},
    metrics::{MetricsCollector, SourceMetrics},
    provider::MarketDataSource,
    providers::CoinGeckoSource,
    read_model::build_page,
    reconciler::reconcile,
    recorder::ChunkContext,
    scheduler::prioritize,
    types::{ComponentHealth, HealthStatus, PageResult, PriceSnapshot, SyncReport, SyncStatus},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

/// Outcome of the most recent synchronization, kept for health reporting
#[derive(Debug, Clone)]
struct LastSync {
    status: Option<SyncStatus>,
    error: Option<String>,
    finished_at: DateTime<Utc>,
}

/// Crypto price tracker
///
/// Keeps the local asset catalog in sync with a market-data source and
/// serves ranked price snapshots.
///
/// # Example
/// ```no_run
/// use crypto_price_sync::{CryptoPriceTracker, MemoryCatalog};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = Arc::new(MemoryCatalog::new());
/// let tracker = CryptoPriceTracker::with_coingecko(catalog, Default::default())?;
/// let report = tracker.try_update_prices().await?;
/// println!("{} prices refreshed ({:?})", report.snapshots.len(), report.status());
///
/// let page = tracker.latest_prices(1, 10).await?;
/// for snapshot in page.items {
///     println!(
///         "{}: ${} ({}%)",
///         snapshot.symbol, snapshot.current_price, snapshot.change_percentage
///     );
/// }
/// # Ok(())
/// # }
/// ```
pub struct CryptoPriceTracker {
    source: Arc<dyn MarketDataSource>,
    catalog: Arc<dyn AssetCatalog>,
    config: SyncConfig,
    metrics: Arc<MetricsCollector>,
    last_sync: RwLock<Option<LastSync>>,
}

impl CryptoPriceTracker {
    /// Creates a tracker with the default configuration
    pub fn new(source: Arc<dyn MarketDataSource>, catalog: Arc<dyn AssetCatalog>) -> Self {
        Self::with_config(source, catalog, SyncConfig::default())
    }

    /// Creates a tracker with a custom configuration
    pub fn with_config(
        source: Arc<dyn MarketDataSource>,
        catalog: Arc<dyn AssetCatalog>,
        config: SyncConfig,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new(source.source_name()));
        Self {
            source,
            catalog,
            config,
            metrics,
            last_sync: RwLock::new(None),
        }
    }

    /// Creates a tracker backed by CoinGecko
    pub fn with_coingecko(
        catalog: Arc<dyn AssetCatalog>,
        config: CoinGeckoConfig,
    ) -> Result<Self, ProviderError> {
        let source = Arc::new(CoinGeckoSource::new(config)?);
        Ok(Self::new(source, catalog))
    }

    /// Returns the name of the current source
    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Synchronizes the catalog and refreshes prices
    ///
    /// Failures before the fan-out (catalog unreachable, reconciliation
    /// rejected) are returned as errors. A failing chunk only shows up in
    /// the report's `failures`.
    pub async fn try_update_prices(&self) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("price_sync", run_id = %run_id);

        let result = self.run_sync(run_id).instrument(span).await;

        let last = match &result {
            Ok(report) => LastSync {
                status: Some(report.status()),
                error: None,
                finished_at: report.finished_at,
            },
            Err(e) => LastSync {
                status: None,
                error: Some(e.to_string()),
                finished_at: Utc::now(),
            },
        };
        *self.last_sync.write().await = Some(last);

        result
    }

    /// Synchronizes and returns the refreshed snapshots, never failing
    ///
    /// Errors are logged and yield an empty list. Use `try_update_prices`
    /// to tell "nothing to update" from "update failed".
    pub async fn update_prices(&self) -> Vec<PriceSnapshot> {
        match self.try_update_prices().await {
            Ok(report) => report.snapshots,
            Err(e) => {
                tracing::error!(error = %e, "Price synchronization failed");
                Vec::new()
            }
        }
    }

    /// Synchronizes under a caller-level deadline
    ///
    /// On expiry every chunk task is aborted and releases its permit.
    pub async fn update_prices_within(&self, deadline: Duration) -> Result<SyncReport, SyncError> {
        match tokio::time::timeout(deadline, self.try_update_prices()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Price synchronization timed out"
                );
                let e = SyncError::DeadlineExceeded(deadline);
                *self.last_sync.write().await = Some(LastSync {
                    status: None,
                    error: Some(e.to_string()),
                    finished_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run_sync(&self, run_id: Uuid) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now();
        let coins = self.source.list_coins().await;

        let mut session = self.catalog.open_session().await?;
        let reconciliation = reconcile(session.as_mut(), &coins).await?;
        let index = Arc::new(reconciliation.index);
        let last_points = session.last_price_points(&index.asset_ids()).await?;
        drop(session);

        let ordered = prioritize(
            index.assets(),
            &last_points,
            Utc::now(),
            self.config.recent_window,
        );

        tracing::info!(
            listed = coins.len(),
            known = index.len(),
            created = reconciliation.created,
            never_priced = index.len() - last_points.len(),
            "Catalog reconciled"
        );

        let context = Arc::new(ChunkContext {
            source: self.source.clone(),
            catalog: self.catalog.clone(),
            index,
            vs_currency: self.config.vs_currency.clone(),
            metrics: self.metrics.clone(),
        });

        let dispatcher =
            BatchDispatcher::new(self.config.chunk_size, self.config.max_concurrent_chunks);
        let outcome = dispatcher
            .dispatch(&ordered, move |chunk| {
                let context = context.clone();
                async move { context.record_chunk(chunk).await }
            })
            .await;

        let report = SyncReport {
            run_id,
            snapshots: outcome.results.into_iter().flatten().collect(),
            assets_created: reconciliation.created,
            chunks_total: outcome.chunks_total,
            failures: outcome.failures,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            status = ?report.status(),
            snapshots = report.snapshots.len(),
            chunks = report.chunks_total,
            failed_chunks = report.failures.len(),
            elapsed_ms = (report.finished_at - started_at).num_milliseconds(),
            "Price synchronization finished"
        );

        Ok(report)
    }

    /// Gets one page of the latest prices, ranked by price
    ///
    /// # Arguments
    /// * `page_number` - 1-based page index
    /// * `page_size` - Items per page
    pub async fn latest_prices(
        &self,
        page_number: usize,
        page_size: usize,
    ) -> Result<PageResult<PriceSnapshot>, SyncError> {
        let session = self.catalog.open_session().await?;
        let assets = session.all_assets().await?;
        let ids: Vec<_> = assets.iter().map(|asset| asset.id).collect();
        let recent = session.two_latest_price_points(&ids).await?;

        Ok(build_page(&assets, &recent, page_number, page_size))
    }

    /// Gets the first page with the default page size
    pub async fn latest_prices_default(&self) -> Result<PageResult<PriceSnapshot>, SyncError> {
        self.latest_prices(1, DEFAULT_PAGE_SIZE).await
    }

    /// Starts synchronizing every `interval` on a background task
    ///
    /// The first run starts immediately. Abort the handle to stop.
    pub fn spawn_periodic_sync(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                source = self.source_name(),
                "Starting periodic price synchronization"
            );

            loop {
                if let Err(e) = self.update_prices_within(interval).await {
                    tracing::warn!(error = %e, "Periodic synchronization failed");
                }
                tokio::time::sleep(interval).await;
            }
        })
    }

    /// Gets source call metrics including latency percentiles and success rate
    pub async fn source_metrics(&self) -> SourceMetrics {
        self.metrics.get_metrics().await
    }

    /// Perform a health check on the tracker
    pub async fn health_check(&self) -> ComponentHealth {
        let mut details = HashMap::new();
        details.insert(
            "source_name".to_string(),
            serde_json::json!(self.source_name()),
        );

        let catalog_size = match self.catalog.open_session().await {
            Ok(session) => session.all_assets().await.map(|assets| assets.len()).ok(),
            Err(_) => None,
        };
        details.insert("catalog_size".to_string(), serde_json::json!(catalog_size));

        let metrics = self.source_metrics().await;
        details.insert(
            "source_success_rate".to_string(),
            serde_json::json!(metrics.success_rate),
        );
        details.insert(
            "source_latency_p50_ms".to_string(),
            serde_json::json!(metrics.latency_p50_ms),
        );

        let last_sync = self.last_sync.read().await.clone();
        if let Some(last) = &last_sync {
            details.insert(
                "last_sync_at".to_string(),
                serde_json::json!(last.finished_at.to_rfc3339()),
            );
            details.insert("last_sync_status".to_string(), serde_json::json!(last.status));
        }

        let (status, message) = match (catalog_size, &last_sync) {
            (None, _) => (HealthStatus::Unhealthy, "Asset catalog is unreachable".to_string()),
            (Some(0), _) => (HealthStatus::Unhealthy, "Asset catalog is empty".to_string()),
            (_, Some(LastSync { error: Some(e), .. })) => {
                (HealthStatus::Unhealthy, format!("Last synchronization failed: {}", e))
            }
            (_, Some(LastSync { status: Some(SyncStatus::Partial), .. })) => (
                HealthStatus::Degraded,
                "Last synchronization completed partially".to_string(),
            ),
            (_, None) => (HealthStatus::Degraded, "No synchronization has run yet".to_string()),
            (Some(size), _) => (
                HealthStatus::Healthy,
                format!("Tracking {} assets", size),
            ),
        };

        ComponentHealth {
            name: "crypto_price_tracker".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSession, MemoryCatalog};
    use crate::error::CatalogError;
    use crate::provider::mock::MockSource;
    use crate::types::{NewAsset, PricePoint};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tracker(source: Arc<MockSource>, catalog: Arc<MemoryCatalog>) -> CryptoPriceTracker {
        CryptoPriceTracker::new(source, catalog)
    }

    fn many_coins(source: &MockSource, n: usize) {
        for i in 0..n {
            let id = format!("coin-{i}");
            source.add_coin(&id, &format!("c{i}"), &format!("Coin {i}"));
            source.set_price(&id, Decimal::from(i as i64 + 1), None);
        }
    }

    struct UnavailableCatalog;

    #[async_trait]
    impl AssetCatalog for UnavailableCatalog {
        async fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sync_registers_and_prices() {
        let source = Arc::new(MockSource::new());
        source.add_coin("bitcoin", "btc", "Bitcoin");
        source.add_coin("ethereum", "eth", "Ethereum");
        source.add_coin("ripple", "xrp", "XRP");
        source.set_price("bitcoin", dec!(64000), Some("https://img/btc.png"));
        source.set_price("ethereum", dec!(3000), None);
        let catalog = Arc::new(MemoryCatalog::new());
        let tracker = tracker(source.clone(), catalog.clone());

        let report = tracker.try_update_prices().await.unwrap();

        assert_eq!(report.assets_created, 3);
        assert_eq!(report.chunks_total, 1);
        assert_eq!(report.snapshots.len(), 2);
        assert_eq!(report.status(), SyncStatus::Complete);
        assert_eq!(catalog.asset_count().await, 3);

        let again = tracker.try_update_prices().await.unwrap();
        assert_eq!(again.assets_created, 0);
        let btc = catalog.find_by_external_id("bitcoin").await.unwrap();
        assert_eq!(catalog.price_history(btc.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_stalest_assets_requested_first() {
        let source = Arc::new(MockSource::new());
        let catalog = Arc::new(MemoryCatalog::new());

        let mut session = catalog.open_session().await.unwrap();
        let assets = session
            .add_assets(
                [("bitcoin", "btc"), ("ethereum", "eth"), ("ripple", "xrp")]
                    .iter()
                    .map(|(id, symbol)| NewAsset {
                        external_id: id.to_string(),
                        name: id.to_string(),
                        symbol: symbol.to_string(),
                        icon_url: None,
                    })
                    .collect(),
            )
            .await
            .unwrap();
        let now = Utc::now();
        session.add_price_points(vec![
            PricePoint {
                asset_id: assets[0].id,
                price: dec!(1),
                observed_at: now - chrono::Duration::minutes(10),
            },
            PricePoint {
                asset_id: assets[1].id,
                price: dec!(1),
                observed_at: now - chrono::Duration::minutes(60),
            },
        ]);
        session.commit().await.unwrap();

        tracker(source.clone(), catalog).try_update_prices().await.unwrap();

        assert_eq!(source.market_calls()[0], vec!["ripple", "ethereum", "bitcoin"]);
    }

    #[tokio::test]
    async fn test_chunks_bounded_and_isolated_sessions() {
        let source = Arc::new(MockSource::with_delay(Duration::from_millis(20)));
        many_coins(&source, 1000);
        let catalog = Arc::new(MemoryCatalog::new());

        let report = tracker(source.clone(), catalog.clone())
            .try_update_prices()
            .await
            .unwrap();

        let calls = source.market_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|ids| ids.len() <= 400));
        assert_eq!(source.max_in_flight(), 2);
        assert_eq!(report.chunks_total, 3);
        assert_eq!(report.snapshots.len(), 1000);
        // one top-level session plus one per chunk
        assert_eq!(catalog.sessions_opened(), 4);
    }

    #[tokio::test]
    async fn test_failing_chunk_yields_partial_report() {
        let source = Arc::new(MockSource::new());
        many_coins(&source, 800);
        source.panic_on("coin-0");
        let catalog = Arc::new(MemoryCatalog::new());
        let tracker = tracker(source, catalog);

        let report = tracker.try_update_prices().await.unwrap();

        assert_eq!(report.status(), SyncStatus::Partial);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].chunk_index, 0);
        assert_eq!(report.snapshots.len(), 400);
        assert_eq!(tracker.health_check().await.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_unavailable_catalog() {
        let source = Arc::new(MockSource::new());
        source.add_coin("bitcoin", "btc", "Bitcoin");
        let tracker = CryptoPriceTracker::new(source, Arc::new(UnavailableCatalog));

        assert!(matches!(
            tracker.try_update_prices().await,
            Err(SyncError::Catalog(CatalogError::Unavailable(_)))
        ));
        assert!(tracker.update_prices().await.is_empty());
        assert_eq!(tracker.health_check().await.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_empty_source_is_empty_report() {
        let tracker = tracker(Arc::new(MockSource::new()), Arc::new(MemoryCatalog::new()));
        let report = tracker.try_update_prices().await.unwrap();
        assert_eq!(report.status(), SyncStatus::Empty);
        assert_eq!(report.chunks_total, 0);
    }

    #[tokio::test]
    async fn test_deadline() {
        let source = Arc::new(MockSource::with_delay(Duration::from_secs(5)));
        source.add_coin("bitcoin", "btc", "Bitcoin");
        source.set_price("bitcoin", dec!(64000), None);
        let catalog = Arc::new(MemoryCatalog::new());
        let tracker = tracker(source.clone(), catalog.clone());

        let err = tracker
            .update_prices_within(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::DeadlineExceeded(_)));
        assert_eq!(tracker.health_check().await.status, HealthStatus::Unhealthy);

        source.set_delay(Duration::ZERO);
        let report = tracker.try_update_prices().await.unwrap();

        assert_eq!(report.status(), SyncStatus::Complete);
        assert_eq!(report.assets_created, 0);
        assert_eq!(report.snapshots.len(), 1);
        let asset = catalog.find_by_external_id("bitcoin").await.unwrap();
        assert_eq!(catalog.price_history(asset.id).await.len(), 1);
        assert_eq!(tracker.health_check().await.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_latest_prices_after_two_syncs() {
        let source = Arc::new(MockSource::new());
        source.add_coin("bitcoin", "btc", "Bitcoin");
        source.add_coin("ethereum", "eth", "Ethereum");
        source.add_coin("unpriced", "unp", "Unpriced");
        source.set_price("bitcoin", dec!(50000), None);
        source.set_price("ethereum", dec!(3000), None);
        let tracker = tracker(source.clone(), Arc::new(MemoryCatalog::new()));

        tracker.update_prices().await;
        source.set_price("bitcoin", dec!(55000), None);
        let refreshed = tracker.update_prices().await;
        let btc = refreshed.iter().find(|s| s.id == "bitcoin").unwrap();
        assert_eq!(btc.change_percentage, dec!(10));

        let page = tracker.latest_prices(1, 1).await.unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "bitcoin");
        assert_eq!(page.items[0].change_percentage, dec!(10));

        let second = tracker.latest_prices(2, 1).await.unwrap();
        assert_eq!(second.items[0].id, "ethereum");
        assert_eq!(second.items[0].change_percentage, Decimal::ZERO);

        assert_eq!(tracker.health_check().await.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_latest_prices_empty_catalog() {
        let tracker = tracker(Arc::new(MockSource::new()), Arc::new(MemoryCatalog::new()));
        let page = tracker.latest_prices_default().await.unwrap();
        assert_eq!(page.total_count, 0);
        assert!(page.items.is_empty());
        assert_eq!(page.page_size, 10);
    }
}
