//! # Crypto Price Sync
//!
//! Keeps a local catalog of tradable crypto assets in sync with an external
//! market-data provider (CoinGecko by default) and serves ranked, paginated
//! price snapshots.
//!
//! ## Usage
//!
//! ```no_run
//! use crypto_price_sync::{CryptoPriceTracker, MemoryCatalog};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = CryptoPriceTracker::with_coingecko(
//!     Arc::new(MemoryCatalog::new()),
//!     crypto_price_sync::config::CoinGeckoConfig::from_env(),
//! )?;
//!
//! // Register new coins and refresh the stalest prices first
//! let report = tracker.try_update_prices().await?;
//! println!("{:?}: {} snapshots", report.status(), report.snapshots.len());
//!
//! // Ranked listing, highest price first
//! let page = tracker.latest_prices(1, 10).await?;
//! for snapshot in page.items {
//!     println!("{}: ${}", snapshot.symbol, snapshot.current_price);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! CryptoPriceTracker::try_update_prices()
//!     ↓
//! MarketDataSource::list_coins  →  reconciler (register unseen coins)
//!     ↓
//! scheduler (never priced, then stale, then fresh)
//!     ↓
//! dispatcher (chunks of 400, 2 in flight)
//!     ↓  per chunk, own catalog session
//! MarketDataSource::get_market  →  recorder (diff, append, icon backfill)
//!     ↓
//! SyncReport (snapshots in chunk completion order)
//! ```
//!
//! The read path (`latest_prices`) loads the two most recent price points
//! per asset and hands them to `read_model::build_page`.
//!
//! ## Error Handling
//!
//! `try_update_prices` distinguishes a complete, partial or empty run via
//! `SyncReport::status` and returns `SyncError` when the catalog cannot be
//! used. `update_prices` keeps the lenient contract and always returns a
//! list.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod read_model;
pub mod reconciler;
pub mod recorder;
pub mod scheduler;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use catalog::{AssetCatalog, CatalogSession, MemoryCatalog};
pub use config::{CoinGeckoConfig, SyncConfig};
pub use error::{CatalogError, ConfigError, ProviderError, SyncError};
pub use metrics::SourceMetrics;
pub use provider::MarketDataSource;
pub use tracker::CryptoPriceTracker;
pub use types::{
    Asset, AssetId, ComponentHealth, HealthStatus, PageResult, PricePoint, PriceSnapshot,
    SyncReport, SyncStatus,
};
