//! Ranked, paginated price listing

use crate::types::{change_percentage, Asset, AssetId, PageResult, PricePoint, PriceSnapshot};
use std::collections::HashMap;

/// Builds one page of the price listing
///
/// `recent` holds up to two most recent points per asset. Assets without a
/// price are left out of the listing but still counted in `total_count`.
/// Items are ranked by current price, highest first; equal prices keep
/// catalog order. `page_number` is 1-based and values below 1 read as 1.
pub fn build_page(
    assets: &[Asset],
    recent: &HashMap<AssetId, Vec<PricePoint>>,
    page_number: usize,
    page_size: usize,
) -> PageResult<PriceSnapshot> {
    let page_number = page_number.max(1);

    let mut snapshots: Vec<PriceSnapshot> = assets
        .iter()
        .filter_map(|asset| snapshot_of(asset, recent.get(&asset.id)?))
        .collect();

    snapshots.sort_by(|a, b| b.current_price.cmp(&a.current_price));

    let items = snapshots
        .into_iter()
        .skip((page_number - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    PageResult {
        items,
        total_count: assets.len(),
        page_number,
        page_size,
    }
}

fn snapshot_of(asset: &Asset, points: &[PricePoint]) -> Option<PriceSnapshot> {
    let mut points: Vec<&PricePoint> = points.iter().collect();
    points.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));

    let current = points.first()?;
    let previous = points.get(1).map(|point| point.price);

    Some(PriceSnapshot {
        id: asset.external_id.clone(),
        name: asset.name.clone(),
        symbol: asset.symbol.clone(),
        icon_url: asset.icon_url.clone().unwrap_or_default(),
        current_price: current.price,
        change_percentage: change_percentage(current.price, previous),
        last_updated: current.observed_at,
    })
}
