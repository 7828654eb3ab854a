//! In-memory asset catalog

use super::{AssetCatalog, CatalogSession};
use crate::{
    error::CatalogError,
    types::{Asset, AssetId, AssetInfo, NewAsset, PricePoint},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Committed catalog contents
#[derive(Debug, Default)]
struct CatalogState {
    /// Assets in creation order
    assets: Vec<Asset>,
    /// Price points per asset in append order
    history: HashMap<AssetId, Vec<PricePoint>>,
}

impl CatalogState {
    fn latest(&self, asset_id: AssetId) -> Option<&PricePoint> {
        self.history
            .get(&asset_id)?
            .iter()
            .max_by_key(|point| point.observed_at)
    }

    fn newest_first(&self, asset_id: AssetId, limit: usize) -> Vec<PricePoint> {
        let Some(points) = self.history.get(&asset_id) else {
            return Vec::new();
        };
        // Later appends win ties on observed_at
        let mut points: Vec<PricePoint> = points.iter().rev().cloned().collect();
        points.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        points.truncate(limit);
        points
    }
}

/// In-memory catalog
///
/// Ids are assigned sequentially when assets are staged. Commits are
/// atomic: they are validated in full before anything is applied.
pub struct MemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
    next_id: Arc<AtomicI64>,
    sessions_opened: AtomicUsize,
}

impl MemoryCatalog {
    /// Creates an empty catalog
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState::default())),
            next_id: Arc::new(AtomicI64::new(1)),
            sessions_opened: AtomicUsize::new(0),
        }
    }

    /// Number of sessions opened so far
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of committed assets
    pub async fn asset_count(&self) -> usize {
        self.state.read().await.assets.len()
    }

    /// Committed price history of one asset in append order
    pub async fn price_history(&self, asset_id: AssetId) -> Vec<PricePoint> {
        self.state
            .read()
            .await
            .history
            .get(&asset_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Looks up a committed asset by provider key
    pub async fn find_by_external_id(&self, external_id: &str) -> Option<Asset> {
        self.state
            .read()
            .await
            .assets
            .iter()
            .find(|asset| asset.external_id == external_id)
            .cloned()
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetCatalog for MemoryCatalog {
    async fn open_session(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            next_id: self.next_id.clone(),
            staged_assets: Vec::new(),
            staged_points: Vec::new(),
            staged_updates: Vec::new(),
        }))
    }
}

/// Session over a `MemoryCatalog`
struct MemorySession {
    state: Arc<RwLock<CatalogState>>,
    next_id: Arc<AtomicI64>,
    staged_assets: Vec<Asset>,
    staged_points: Vec<PricePoint>,
    staged_updates: Vec<Asset>,
}

impl MemorySession {
    fn validate(&self, state: &CatalogState) -> Result<(), CatalogError> {
        let mut external_ids: HashSet<&str> = state
            .assets
            .iter()
            .map(|asset| asset.external_id.as_str())
            .collect();
        let mut known_ids: HashSet<AssetId> = state.assets.iter().map(|asset| asset.id).collect();

        for asset in &self.staged_assets {
            if !external_ids.insert(asset.external_id.as_str()) {
                return Err(CatalogError::conflict("external_id", &asset.external_id));
            }
            known_ids.insert(asset.id);
        }

        for point in &self.staged_points {
            if !known_ids.contains(&point.asset_id) {
                return Err(CatalogError::Internal(format!(
                    "price point for unknown asset {}",
                    point.asset_id
                )));
            }
            if point.price.is_sign_negative() {
                return Err(CatalogError::Internal(format!(
                    "negative price for asset {}",
                    point.asset_id
                )));
            }
        }

        for asset in &self.staged_updates {
            if !known_ids.contains(&asset.id) {
                return Err(CatalogError::Internal(format!(
                    "update for unknown asset {}",
                    asset.id
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CatalogSession for MemorySession {
    async fn all_assets(&self) -> Result<Vec<Asset>, CatalogError> {
        Ok(self.state.read().await.assets.clone())
    }

    async fn assets_info(&self, external_ids: &[String]) -> Result<Vec<AssetInfo>, CatalogError> {
        let wanted: HashSet<&str> = external_ids.iter().map(String::as_str).collect();
        let state = self.state.read().await;

        Ok(state
            .assets
            .iter()
            .filter(|asset| wanted.contains(asset.external_id.as_str()))
            .map(|asset| AssetInfo {
                id: asset.id,
                external_id: asset.external_id.clone(),
                name: asset.name.clone(),
                symbol: asset.symbol.clone(),
                icon_url: asset.icon_url.clone(),
                last_price: state.latest(asset.id).map(|point| point.price),
            })
            .collect())
    }

    async fn last_price_points(
        &self,
        asset_ids: &[AssetId],
    ) -> Result<HashMap<AssetId, PricePoint>, CatalogError> {
        let state = self.state.read().await;
        Ok(asset_ids
            .iter()
            .filter_map(|id| state.latest(*id).map(|point| (*id, point.clone())))
            .collect())
    }

    async fn two_latest_price_points(
        &self,
        asset_ids: &[AssetId],
    ) -> Result<HashMap<AssetId, Vec<PricePoint>>, CatalogError> {
        let state = self.state.read().await;
        Ok(asset_ids
            .iter()
            .map(|id| (*id, state.newest_first(*id, 2)))
            .filter(|(_, points)| !points.is_empty())
            .collect())
    }

    async fn add_assets(&mut self, assets: Vec<NewAsset>) -> Result<Vec<Asset>, CatalogError> {
        let created: Vec<Asset> = assets
            .into_iter()
            .map(|asset| asset.with_id(AssetId(self.next_id.fetch_add(1, Ordering::SeqCst))))
            .collect();
        self.staged_assets.extend(created.iter().cloned());
        Ok(created)
    }

    fn add_price_points(&mut self, points: Vec<PricePoint>) {
        self.staged_points.extend(points);
    }

    fn update_assets(&mut self, assets: Vec<Asset>) {
        self.staged_updates.extend(assets);
    }

    async fn commit(&mut self) -> Result<usize, CatalogError> {
        let lock = self.state.clone();
        let mut state = lock.write().await;

        if let Err(e) = self.validate(&state) {
            self.staged_assets.clear();
            self.staged_points.clear();
            self.staged_updates.clear();
            return Err(e);
        }

        let affected =
            self.staged_assets.len() + self.staged_points.len() + self.staged_updates.len();

        state.assets.append(&mut self.staged_assets);

        for point in self.staged_points.drain(..) {
            state.history.entry(point.asset_id).or_default().push(point);
        }

        for update in self.staged_updates.drain(..) {
            if let Some(asset) = state.assets.iter_mut().find(|asset| asset.id == update.id) {
                asset.icon_url = update.icon_url;
            }
        }

        Ok(affected)
    }
}
