//! Types for the price synchronization engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Local, stable identity of an asset, assigned by the catalog on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub i64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked crypto asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Local id
    pub id: AssetId,
    /// Provider key, unique across the catalog
    pub external_id: String,
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Display icon, empty until the provider supplies one
    pub icon_url: Option<String>,
}

/// An asset that has not been written to the catalog yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    pub external_id: String,
    pub name: String,
    pub symbol: String,
    pub icon_url: Option<String>,
}

impl NewAsset {
    /// Assigns a local id, producing the stored form
    pub fn with_id(self, id: AssetId) -> Asset {
        Asset {
            id,
            external_id: self.external_id,
            name: self.name,
            symbol: self.symbol,
            icon_url: self.icon_url,
        }
    }
}

/// One timestamped price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub asset_id: AssetId,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Last-known state of an asset, read in one batch per chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub id: AssetId,
    pub external_id: String,
    pub name: String,
    pub symbol: String,
    pub icon_url: Option<String>,
    /// Most recent recorded price, if any
    pub last_price: Option<Decimal>,
}

impl AssetInfo {
    /// True if the asset still has no display icon
    pub fn lacks_icon(&self) -> bool {
        self.icon_url.as_deref().map_or(true, str::is_empty)
    }

    /// Rebuilds the stored asset with a new icon
    pub fn to_asset_with_icon(&self, icon_url: String) -> Asset {
        Asset {
            id: self.id,
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            icon_url: Some(icon_url),
        }
    }
}

/// Provider catalog entry (`/coins/list`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinListing {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// Provider market-data entry (`/coins/markets`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinMarketData {
    pub id: String,
    pub symbol: String,
    pub name: String,
    /// Icon URL
    #[serde(default, rename = "image")]
    pub icon_url: Option<String>,
    /// Quote in the requested currency; the provider sends null for unpriced coins
    #[serde(default)]
    pub current_price: Option<Decimal>,
}

impl CoinMarketData {
    /// Current price, with a missing quote read as zero
    pub fn price(&self) -> Decimal {
        self.current_price.unwrap_or(Decimal::ZERO)
    }
}

/// Externally visible price snapshot of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    /// Provider key of the asset
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub icon_url: String,
    pub current_price: Decimal,
    pub change_percentage: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// Percentage change from `previous` to `current`
///
/// Zero when there is no usable base or the result does not fit a `Decimal`.
pub fn change_percentage(current: Decimal, previous: Option<Decimal>) -> Decimal {
    match previous {
        Some(previous) if previous > Decimal::ZERO => current
            .checked_sub(previous)
            .and_then(|delta| delta.checked_div(previous))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// One page of a ranked listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub items: Vec<T>,
    /// Size of the whole catalog, not of the filtered listing
    pub total_count: usize,
    /// 1-based
    pub page_number: usize,
    pub page_size: usize,
}

impl<T> PageResult<T> {
    /// Number of pages needed to cover `total_count`
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }
}

/// A chunk that did not produce results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// Position of the chunk in submission order
    pub chunk_index: usize,
    /// Number of ids the chunk carried
    pub id_count: usize,
    pub reason: String,
}

/// Overall outcome of a synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every chunk finished
    Complete,
    /// At least one chunk failed, the rest were aggregated
    Partial,
    /// Nothing to update: empty catalog or no chunk returned data
    Empty,
}

/// Result of one synchronization call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    /// Snapshots in chunk completion order
    pub snapshots: Vec<PriceSnapshot>,
    /// Assets registered during reconciliation
    pub assets_created: usize,
    /// Number of chunks dispatched
    pub chunks_total: usize,
    pub failures: Vec<ChunkFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Classifies the report
    pub fn status(&self) -> SyncStatus {
        if !self.failures.is_empty() {
            SyncStatus::Partial
        } else if self.snapshots.is_empty() {
            SyncStatus::Empty
        } else {
            SyncStatus::Complete
        }
    }
}

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// System is healthy and all components are operational
    Healthy,
    /// System is degraded but still functional
    Degraded,
    /// System is unhealthy and requires attention
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
