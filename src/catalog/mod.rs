//! Asset catalog abstraction
//!
//! The catalog owns durability of assets and their price history. Work is
//! done through sessions: reads see committed state, writes are staged on
//! the session and become visible on `commit`. Dropping a session without
//! committing discards its staged writes.

mod memory;

pub use memory::MemoryCatalog;

use crate::{
    error::CatalogError,
    types::{Asset, AssetId, AssetInfo, NewAsset, PricePoint},
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Factory for independent catalog sessions
///
/// Each session is a self-contained unit of work. Concurrent workers must
/// each open their own session rather than share one.
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Opens a new session
    async fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError>;
}

/// One unit of work against the catalog
#[async_trait]
pub trait CatalogSession: Send + Sync {
    /// Returns every known asset
    async fn all_assets(&self) -> Result<Vec<Asset>, CatalogError>;

    /// Returns asset state plus last recorded price for each known external id
    ///
    /// Unknown ids are left out of the result.
    async fn assets_info(&self, external_ids: &[String]) -> Result<Vec<AssetInfo>, CatalogError>;

    /// Returns the most recent price point per asset
    ///
    /// Assets with no recorded price are absent from the map.
    async fn last_price_points(
        &self,
        asset_ids: &[AssetId],
    ) -> Result<HashMap<AssetId, PricePoint>, CatalogError>;

    /// Returns up to two most recent price points per asset, newest first
    async fn two_latest_price_points(
        &self,
        asset_ids: &[AssetId],
    ) -> Result<HashMap<AssetId, Vec<PricePoint>>, CatalogError>;

    /// Stages new assets, returning them with their assigned ids
    async fn add_assets(&mut self, assets: Vec<NewAsset>) -> Result<Vec<Asset>, CatalogError>;

    /// Stages price points for append
    fn add_price_points(&mut self, points: Vec<PricePoint>);

    /// Stages updates of existing assets
    fn update_assets(&mut self, assets: Vec<Asset>);

    /// Applies every staged write atomically, returning the number of affected rows
    async fn commit(&mut self) -> Result<usize, CatalogError>;
}
