// ABOUTME: Core foundation - unit constants and the soil water retention curve
// ABOUTME: Provides the bidirectional VWC <-> SWP mapping all other physics modules build on

pub mod retention;

pub use retention::{Swrc, SwrcKind};

/// One bar of matric potential equals 1024 cm of water column.
pub const BAR_TO_CM: f64 = 1024.0;

/// The Parton-1978 tangent-inflection function shared by the canopy-height,
/// bare-soil-evaporation, transpiration, and shade-effect calculations:
/// a logistic-shaped curve through `(xinflec, yinflec)` with half-range
/// `range` and slope `slope`.
pub fn tanfunc(z: f64, xinflec: f64, yinflec: f64, range: f64, slope: f64) -> f64 {
    yinflec + (range / std::f64::consts::PI) * (std::f64::consts::PI * slope * (z - xinflec)).atan()
}
