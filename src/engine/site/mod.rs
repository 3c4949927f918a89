// ABOUTME: Site/layer/vegetation state - C2 and C3 of the core
// ABOUTME: Layer derivation, transpiration regions, and per-veg-type daily state

pub mod layer;
pub mod region;
pub mod site;
pub mod vegetation;

pub use layer::{derive_layer, Layer, LayerSpec, ThresholdMode};
pub use region::TranspirationRegions;
pub use site::{GlobalParams, SiteDefinition};
pub use vegetation::{CanopyHeight, Co2Coeffs, CurveParams, HydRedParams, InterceptionParams, VegKind, VegType, N_VEG};
