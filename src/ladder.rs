//! Resolution-tiered bitrate ladders and their temporal-layer splits.
//!
//! Ladder points are multiples of 100 kbps so that downstream grouping on
//! normalized ladders stays exact.

use crate::MAX_TEMPORAL_LAYERS;

pub const LADDER_POINTS: usize = 6;

/// `(pixel bound, ladder)`; the first tier whose bound is not exceeded wins.
const TIERS: [(u64, [u32; LADDER_POINTS]); 4] = [
    (320 * 240, [100, 200, 400, 600, 800, 1200]),
    (640 * 480, [200, 300, 500, 800, 1200, 2000]),
    (1280 * 720, [400, 800, 1200, 1600, 2500, 5000]),
    (1920 * 1080, [800, 1200, 2000, 3000, 5000, 10000]),
];

const TOP_TIER: [u32; LADDER_POINTS] = [1200, 1800, 3000, 6000, 10000, 15000];

/// Per-layer share of the nominal bitrate, in percent, indexed by layer count - 1.
const LAYER_SPLIT_PERCENT: [&[u32]; MAX_TEMPORAL_LAYERS as usize] =
    [&[100], &[60, 100], &[45, 65, 100]];

/// Picks the ladder for a resolution.
///
/// The pixel count is compared as `width * height / 1.5`, which sits well below the
/// exact value so that e.g. 1280x800 still counts as 720p.
pub fn bitrate_ladder(width: u32, height: u32) -> [u32; LADDER_POINTS] {
    // width * height / 1.5 <= bound  <=>  2 * width * height <= 3 * bound
    let doubled = 2 * u64::from(width) * u64::from(height);
    TIERS
        .iter()
        .find(|(bound, _)| doubled <= 3 * bound)
        .map(|(_, ladder)| *ladder)
        .unwrap_or(TOP_TIER)
}

/// Splits a nominal bitrate into cumulative per-temporal-layer targets.
///
/// Returns `None` for layer counts outside `1..=3`. Values are truncated, the last
/// entry always equals `target_kbps`.
pub fn split_temporal_bitrates(target_kbps: u32, temporal_layers: u32) -> Option<Vec<u32>> {
    let index = temporal_layers.checked_sub(1)? as usize;
    let split = LAYER_SPLIT_PERCENT.get(index)?;
    Some(
        split
            .iter()
            .map(|percent| (u64::from(target_kbps) * u64::from(*percent) / 100) as u32)
            .collect(),
    )
}
