// ABOUTME: Per-layer physical state - texture, derived thresholds, today/yesterday SWC and temperature
// ABOUTME: Layer derivation (4.2 steps 1-6) lives here; cross-layer steps 7-10 live in site.rs

use crate::engine::core::retention::{estimate_campbell_cosby1984, residual_vwc_rawls_brakensiek};
use crate::engine::core::Swrc;
use crate::engine::error::{SimError, SimResult};
use crate::engine::site::vegetation::N_VEG;

/// How a layer's `swc_min` / `swc_init` / `swc_wet` threshold is derived.
#[derive(Clone, Copy, Debug)]
pub enum ThresholdMode {
    FixedSwp(f64),
    FixedVwc(f64),
    /// `swc_min` only: Rawls-Brakensiek residual VWC, falling back to
    /// `SWP_to_SWC(300 bar)` outside the polynomial's valid texture box.
    Residual,
}

/// Raw, unvalidated per-layer inputs as they arrive from the site loader.
#[derive(Clone, Debug)]
pub struct LayerSpec {
    pub id: usize,
    pub width: f64,
    pub sand: f64,
    pub clay: f64,
    pub gravel_vol_fraction: f64,
    pub matric_density: f64,
    pub impermeability: f64,
    pub initial_soil_temp: f64,
    pub evap_coeff: f64,
    pub transp_coeff: [f64; N_VEG],
    /// `None` means "estimate via Cosby 1984 PTF from sand/clay".
    pub swrc: Option<Swrc>,
    pub swc_min_mode: ThresholdMode,
    pub swc_init_mode: ThresholdMode,
    pub swc_wet_mode: ThresholdMode,
}

/// A fully derived, validated soil layer. Texture/thresholds are fixed for
/// the run; `swc_today`/`temp_today` and their yesterday counterparts are
/// the only fields a daily step mutates.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: usize,
    pub width: f64,
    pub sand: f64,
    pub clay: f64,
    pub gravel_vol_fraction: f64,
    pub matric_density: f64,
    pub bulk_density: f64,
    pub impermeability: f64,
    pub evap_coeff: f64,
    pub transp_coeff: [f64; N_VEG],
    pub swrc: Swrc,

    pub swc_fc: f64,
    pub swc_wp: f64,
    pub swc_halfwp: f64,
    pub swc_sat: f64,
    pub swc_min: f64,
    pub swc_wet: f64,
    pub swc_init: f64,
    pub swc_at_swpcrit: [f64; N_VEG],
    pub transp_region_id: [usize; N_VEG],

    pub swc_today: f64,
    pub swc_yesterday: f64,
    pub frozen: bool,
    pub temp_today: f64,
    pub temp_yesterday: f64,
    pub temp_min_today: f64,
    pub temp_max_today: f64,
}

const BAR_FC: f64 = 0.333;
const BAR_WP: f64 = 15.0;
const BAR_HALFWP: f64 = 100.0;
const BAR_RESIDUAL_FALLBACK: f64 = 300.0;

impl Layer {
    /// Matric volumetric water content, `(swc/width)/(1-gravel)`.
    pub fn vwc_today(&self) -> f64 {
        (self.swc_today / self.width) / (1.0 - self.gravel_vol_fraction)
    }

    /// `SWC -> SWP` per 4.1: zero/negative SWC maps to 0 (not an error).
    pub fn swc_to_swp(&self, swc: f64) -> SimResult<f64> {
        if swc <= 0.0 {
            return Ok(0.0);
        }
        let theta_m = (swc / self.width) / (1.0 - self.gravel_vol_fraction);
        self.swrc.vwc_to_swp(theta_m, self.id)
    }

    pub fn swp_today(&self) -> SimResult<f64> {
        self.swc_to_swp(self.swc_today)
    }

    /// `SWP -> SWC`, inverse of the above, in cm of water for this layer.
    pub fn swp_to_swc(&self, swp_bar: f64) -> f64 {
        let theta_m = self.swrc.swp_to_vwc(swp_bar);
        theta_m * (1.0 - self.gravel_vol_fraction) * self.width
    }

    fn resolve_threshold(&self, mode: ThresholdMode) -> f64 {
        match mode {
            ThresholdMode::FixedSwp(bar) => self.swp_to_swc(bar),
            ThresholdMode::FixedVwc(vwc) => vwc * (1.0 - self.gravel_vol_fraction) * self.width,
            ThresholdMode::Residual => {
                let porosity = 1.0 - self.matric_density / 2.65;
                match residual_vwc_rawls_brakensiek(
                    self.gravel_vol_fraction,
                    self.sand,
                    self.clay,
                    porosity,
                ) {
                    Some(theta_r) => theta_r * (1.0 - self.gravel_vol_fraction) * self.width,
                    None => self.swp_to_swc(BAR_RESIDUAL_FALLBACK),
                }
            }
        }
    }

    pub fn commit(&mut self) {
        self.swc_yesterday = self.swc_today;
        self.temp_yesterday = self.temp_today;
    }
}

/// Derive one layer from its spec: 4.2 steps 1-6. Cross-layer steps (critical
/// SWP consistency, region assignment, coefficient normalization) happen
/// afterwards in `site::SiteDefinition::validate_and_derive`.
pub fn derive_layer(spec: LayerSpec) -> SimResult<Layer> {
    validate_spec(&spec)?;

    let bulk_density =
        spec.matric_density * (1.0 - spec.gravel_vol_fraction) + spec.gravel_vol_fraction * 2.65;

    let swrc = match spec.swrc {
        Some(swrc) => swrc,
        None => estimate_campbell_cosby1984(spec.sand, spec.clay),
    };
    swrc.validate()?;

    let mut layer = Layer {
        id: spec.id,
        width: spec.width,
        sand: spec.sand,
        clay: spec.clay,
        gravel_vol_fraction: spec.gravel_vol_fraction,
        matric_density: spec.matric_density,
        bulk_density,
        impermeability: spec.impermeability,
        evap_coeff: spec.evap_coeff,
        transp_coeff: spec.transp_coeff,
        swrc,
        swc_fc: 0.0,
        swc_wp: 0.0,
        swc_halfwp: 0.0,
        swc_sat: 0.0,
        swc_min: 0.0,
        swc_wet: 0.0,
        swc_init: 0.0,
        swc_at_swpcrit: [0.0; N_VEG],
        transp_region_id: [0; N_VEG],
        swc_today: 0.0,
        swc_yesterday: 0.0,
        frozen: false,
        temp_today: spec.initial_soil_temp,
        temp_yesterday: spec.initial_soil_temp,
        temp_min_today: spec.initial_soil_temp,
        temp_max_today: spec.initial_soil_temp,
    };

    layer.swc_fc = layer.swp_to_swc(BAR_FC);
    layer.swc_wp = layer.swp_to_swc(BAR_WP);
    layer.swc_halfwp = (0.5 * layer.swc_wp).max(layer.swp_to_swc(BAR_HALFWP));
    layer.swc_sat = layer.swrc.theta_s() * (1.0 - layer.gravel_vol_fraction) * layer.width;

    layer.swc_min = layer.resolve_threshold(spec.swc_min_mode);
    layer.swc_wet = layer.resolve_threshold(spec.swc_wet_mode);
    layer.swc_init = layer.resolve_threshold(spec.swc_init_mode);
    layer.swc_today = layer.swc_init;
    layer.swc_yesterday = layer.swc_init;

    if !(layer.swc_min <= layer.swc_halfwp
        && layer.swc_halfwp <= layer.swc_wp
        && layer.swc_wp <= layer.swc_fc
        && layer.swc_fc <= layer.swc_sat)
    {
        return Err(SimError::ConfigError {
            reason: format!(
                "layer {}: threshold ordering violated (min={} halfwp={} wp={} fc={} sat={})",
                layer.id, layer.swc_min, layer.swc_halfwp, layer.swc_wp, layer.swc_fc, layer.swc_sat
            ),
        });
    }
    if layer.swc_init <= layer.swc_min {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: swc_init must exceed swc_min", layer.id),
        });
    }
    if layer.swc_wet <= layer.swc_min {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: swc_wet must exceed swc_min", layer.id),
        });
    }

    Ok(layer)
}

fn validate_spec(spec: &LayerSpec) -> SimResult<()> {
    if !(spec.width > 0.0) {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: width must be > 0", spec.id),
        });
    }
    if !(spec.sand > 0.0 && spec.sand < 1.0) || !(spec.clay > 0.0 && spec.clay < 1.0) {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: sand/clay must each be in (0,1)", spec.id),
        });
    }
    if spec.sand + spec.clay >= 1.0 {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: sand + clay must be < 1", spec.id),
        });
    }
    if !(0.0..1.0).contains(&spec.gravel_vol_fraction) {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: gravel_vol_fraction must be in [0,1)", spec.id),
        });
    }
    if spec.matric_density < 0.0 {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: matric_density must be >= 0", spec.id),
        });
    }
    if !(0.0..=1.0).contains(&spec.impermeability) {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: impermeability must be in [0,1]", spec.id),
        });
    }
    if !(0.0..=1.0).contains(&spec.evap_coeff) {
        return Err(SimError::ConfigError {
            reason: format!("layer {}: evap_coeff must be in [0,1]", spec.id),
        });
    }
    for (v, c) in spec.transp_coeff.iter().enumerate() {
        if !(0.0..=1.0).contains(c) {
            return Err(SimError::ConfigError {
                reason: format!("layer {}: transp_coeff[{v}] must be in [0,1]", spec.id),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> LayerSpec {
        LayerSpec {
            id: 0,
            width: 10.0,
            sand: 0.4,
            clay: 0.2,
            gravel_vol_fraction: 0.0,
            matric_density: 1.4,
            impermeability: 0.0,
            initial_soil_temp: 15.0,
            evap_coeff: 1.0,
            transp_coeff: [0.0, 0.0, 0.0, 1.0],
            swrc: None,
            swc_min_mode: ThresholdMode::Residual,
            swc_init_mode: ThresholdMode::FixedSwp(0.5),
            swc_wet_mode: ThresholdMode::FixedSwp(0.1),
        }
    }

    #[test]
    fn derives_consistent_thresholds() {
        let layer = derive_layer(sample_spec()).unwrap();
        assert!(layer.swc_min <= layer.swc_halfwp);
        assert!(layer.swc_halfwp <= layer.swc_wp);
        assert!(layer.swc_wp <= layer.swc_fc);
        assert!(layer.swc_fc <= layer.swc_sat);
    }

    #[test]
    fn rejects_bad_texture() {
        let mut spec = sample_spec();
        spec.sand = 0.7;
        spec.clay = 0.5;
        assert!(derive_layer(spec).is_err());
    }

    #[test]
    fn commit_copies_today_to_yesterday() {
        let mut layer = derive_layer(sample_spec()).unwrap();
        layer.swc_today = layer.swc_fc;
        layer.temp_today = 22.0;
        layer.commit();
        assert_eq!(layer.swc_yesterday, layer.swc_fc);
        assert_eq!(layer.temp_yesterday, 22.0);
    }
}
