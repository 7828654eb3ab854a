//! Refresh priority
//!
//! Orders assets so that the ones most in need of a price are fetched
//! first when the per-cycle request budget runs out.

use crate::types::{Asset, AssetId, PricePoint};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Returns external ids ordered by refresh urgency
///
/// Three tiers, in order:
/// 1. never priced, in input order
/// 2. last priced before `now - recent_window`, oldest first
/// 3. last priced within `recent_window`, oldest first
///
/// Ties within a tier keep input order. A window reaching past the
/// earliest representable instant makes every priced asset fresh.
pub fn prioritize(
    assets: &[Asset],
    last_points: &HashMap<AssetId, PricePoint>,
    now: DateTime<Utc>,
    recent_window: Duration,
) -> Vec<String> {
    let cutoff = now
        .checked_sub_signed(recent_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut never_priced = Vec::new();
    let mut stale = Vec::new();
    let mut fresh = Vec::new();

    for asset in assets {
        match last_points.get(&asset.id) {
            None => never_priced.push(asset.external_id.clone()),
            Some(point) if point.observed_at < cutoff => {
                stale.push((point.observed_at, asset.external_id.clone()))
            }
            Some(point) => fresh.push((point.observed_at, asset.external_id.clone())),
        }
    }

    stale.sort_by_key(|(observed_at, _)| *observed_at);
    fresh.sort_by_key(|(observed_at, _)| *observed_at);

    never_priced
        .into_iter()
        .chain(stale.into_iter().map(|(_, id)| id))
        .chain(fresh.into_iter().map(|(_, id)| id))
        .collect()
}
