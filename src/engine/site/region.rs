// ABOUTME: Transpiration regions - contiguous layer bands used for region-averaged SWP per veg type
// ABOUTME: Strictly increasing lower-bound layer indices, at most 4 regions

use crate::engine::error::{SimError, SimResult};

/// Ordered list of region lower-bound layer indices (1-based layer counts,
/// strictly increasing), at most 4 entries per the data model.
#[derive(Clone, Debug, Default)]
pub struct TranspirationRegions {
    /// `bounds[r]` is the last layer index (0-based, inclusive) belonging to
    /// region `r + 1`.
    bounds: Vec<usize>,
}

impl TranspirationRegions {
    pub fn new(bounds: Vec<usize>) -> SimResult<Self> {
        if bounds.len() > 4 {
            return Err(SimError::ConfigError {
                reason: format!("at most 4 transpiration regions allowed, got {}", bounds.len()),
            });
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SimError::ConfigError {
                reason: "transpiration region bounds must be strictly increasing".into(),
            });
        }
        Ok(Self { bounds })
    }

    pub fn region_count(&self) -> usize {
        self.bounds.len()
    }

    /// Region id (1-based) of the first region whose lower-bound layer index
    /// is >= `layer_id`; returns `None` if the layer falls past every
    /// defined region.
    pub fn region_of(&self, layer_id: usize) -> Option<usize> {
        for (idx, bound) in self.bounds.iter().enumerate() {
            if layer_id <= *bound {
                return Some(idx + 1);
            }
        }
        None
    }

    pub fn layers_in_region(&self, region: usize, n_layers: usize) -> std::ops::Range<usize> {
        let start = if region <= 1 {
            0
        } else {
            self.bounds[region - 2] + 1
        };
        let end = self
            .bounds
            .get(region - 1)
            .map(|b| (*b + 1).min(n_layers))
            .unwrap_or(n_layers);
        start..end
    }
}
