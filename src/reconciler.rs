//! Catalog reconciliation
//!
//! Merges the provider's coin list into the local catalog. A provider coin
//! is registered only when its id, name and symbol are all unseen; names and
//! symbols compare case-insensitively.

use crate::{
    catalog::CatalogSession,
    error::CatalogError,
    types::{Asset, AssetId, CoinListing, NewAsset},
};
use std::collections::{HashMap, HashSet};

/// Read-only snapshot of the catalog taken once reconciliation is final
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    assets: Vec<Asset>,
    by_external_id: HashMap<String, AssetId>,
}

impl CatalogIndex {
    pub fn new(assets: Vec<Asset>) -> Self {
        let by_external_id = assets
            .iter()
            .map(|asset| (asset.external_id.clone(), asset.id))
            .collect();
        Self {
            assets,
            by_external_id,
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.assets.iter().map(|asset| asset.id).collect()
    }

    pub fn id_of(&self, external_id: &str) -> Option<AssetId> {
        self.by_external_id.get(external_id).copied()
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.by_external_id.contains_key(external_id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Outcome of one reconciliation
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub index: CatalogIndex,
    /// Number of assets registered by this run
    pub created: usize,
}

/// Drops provider coins sharing a symbol, then those sharing a name
///
/// The first listing wins. Symbol goes first because a provider may list
/// several pairs under one name.
pub fn dedup_listings(coins: &[CoinListing]) -> Vec<&CoinListing> {
    let mut seen_symbols = HashSet::new();
    let by_symbol: Vec<&CoinListing> = coins
        .iter()
        .filter(|coin| seen_symbols.insert(coin.symbol.to_lowercase()))
        .collect();

    let mut seen_names = HashSet::new();
    by_symbol
        .into_iter()
        .filter(|coin| seen_names.insert(coin.name.to_lowercase()))
        .collect()
}

/// Decides which provider coins become new assets
pub fn plan_new_assets(coins: &[CoinListing], existing: &[Asset]) -> Vec<NewAsset> {
    let mut external_ids: HashSet<&str> = existing
        .iter()
        .map(|asset| asset.external_id.as_str())
        .collect();
    let names: HashSet<String> = existing.iter().map(|asset| asset.name.to_lowercase()).collect();
    let symbols: HashSet<String> = existing
        .iter()
        .map(|asset| asset.symbol.to_lowercase())
        .collect();

    dedup_listings(coins)
        .into_iter()
        .filter(|coin| !coin.id.is_empty())
        .filter(|coin| {
            !names.contains(&coin.name.to_lowercase())
                && !symbols.contains(&coin.symbol.to_lowercase())
        })
        .filter(|&coin| external_ids.insert(coin.id.as_str()))
        .map(|coin| NewAsset {
            external_id: coin.id.clone(),
            name: coin.name.clone(),
            symbol: coin.symbol.clone(),
            icon_url: None,
        })
        .collect()
}

/// Registers unseen provider coins and returns the finalized catalog index
///
/// Performs at most one commit, and only when something new was found.
pub async fn reconcile(
    session: &mut dyn CatalogSession,
    coins: &[CoinListing],
) -> Result<Reconciliation, CatalogError> {
    let mut assets = session.all_assets().await?;
    let planned = plan_new_assets(coins, &assets);

    if planned.is_empty() {
        tracing::debug!(known = assets.len(), listed = coins.len(), "No new assets to register");
        return Ok(Reconciliation {
            index: CatalogIndex::new(assets),
            created: 0,
        });
    }

    let created = session.add_assets(planned).await?;
    session.commit().await?;

    tracing::info!(
        created = created.len(),
        known = assets.len(),
        "Registered new assets"
    );

    let count = created.len();
    assets.extend(created);
    Ok(Reconciliation {
        index: CatalogIndex::new(assets),
        created: count,
    })
}
