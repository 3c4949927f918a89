// ABOUTME: Site-level assembly and validation - cross-layer derivation steps 7-10 of 4.2
// ABOUTME: Ties layers, transpiration regions, vegetation, and global parameters into one definition

use crate::engine::diagnostics::WarningEvent;
use crate::engine::error::{SimError, SimResult};
use crate::engine::physics::{TemperatureGrid, MAX_ST_RGR};
use crate::engine::site::layer::Layer;
use crate::engine::site::region::TranspirationRegions;
use crate::engine::site::vegetation::{normalize_cover, VegKind, VegType, N_VEG};
use serde::{Deserialize, Serialize};

/// Snow model, surface runoff/runon, percolation, and temperature-grid
/// parameters that apply to the whole site rather than any one layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalParams {
    pub snow_tmin_accu: f64,
    pub snow_tmax_crit: f64,
    pub snow_lambda: f64,
    pub snow_melt_min: f64,
    pub snow_melt_max: f64,
    pub pct_runoff: f64,
    pub pct_runon: f64,
    pub pct_snow_runoff: f64,
    pub pet_scale: f64,
    pub slow_drain_coeff: f64,
    pub slow_drain_depth: f64,
    pub temp_grid_spacing_cm: f64,
    pub temp_grid_max_depth_cm: f64,
    pub biomass_limiter: f64,
    pub t1_param1: f64,
    pub t1_param2: f64,
    pub t1_param3: f64,
    pub cs_param1: f64,
    pub cs_param2: f64,
    pub sh_param: f64,
    pub tsoil_constant: f64,
    pub snow_loss_fraction: f64,
    pub reset_swc_each_year: bool,

    /// Bare-ground (no veg cover) `pot_soil_evap_bs` watrate curve.
    pub bare_soil_watrate_shift: f64,
    pub bare_soil_watrate_shape: f64,
    pub bare_soil_watrate_inflec: f64,
    pub bare_soil_watrate_range: f64,
}

/// True when `numerator` divides evenly by `denom` (within floating-point
/// tolerance), or `denom` is non-positive (handled separately as fatal).
fn divides_cleanly(numerator: f64, denom: f64) -> bool {
    if !(denom > 0.0) {
        return false;
    }
    let r = numerator % denom;
    r.abs() < 1e-6 || (denom - r).abs() < 1e-6
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            snow_tmin_accu: 0.0,
            snow_tmax_crit: 1.0,
            snow_lambda: 0.1,
            snow_melt_min: 1.0,
            snow_melt_max: 3.0,
            pct_runoff: 0.0,
            pct_runon: 0.0,
            pct_snow_runoff: 0.0,
            pet_scale: 1.0,
            slow_drain_coeff: 0.02,
            slow_drain_depth: 15.0,
            temp_grid_spacing_cm: 15.0,
            temp_grid_max_depth_cm: 180.0,
            biomass_limiter: 300.0,
            t1_param1: 15.0,
            t1_param2: -4.0,
            t1_param3: 600.0,
            cs_param1: 0.0007,
            cs_param2: 0.0003,
            sh_param: 0.18,
            tsoil_constant: 4.15,
            snow_loss_fraction: 0.5,
            reset_swc_each_year: false,
            bare_soil_watrate_shift: 3.0,
            bare_soil_watrate_shape: 3.0,
            bare_soil_watrate_inflec: -1.5,
            bare_soil_watrate_range: 1.0,
        }
    }
}

/// The fully validated, run-fixed site definition. Daily mutable state
/// (snowpack, standing water, per-day weather) is layered on top by
/// `driver::Site`, which owns one of these plus its own daily fields.
#[derive(Clone, Debug)]
pub struct SiteDefinition {
    pub layers: Vec<Layer>,
    pub regions: TranspirationRegions,
    pub veg: [VegType; N_VEG],
    pub bare_ground_cover: f64,
    pub params: GlobalParams,
    pub temp_grid: TemperatureGrid,
}

impl SiteDefinition {
    /// Steps 7-10 of 4.2, run once after layers/regions/veg are individually
    /// constructed and validated.
    pub fn validate_and_derive(
        mut layers: Vec<Layer>,
        regions: TranspirationRegions,
        mut veg: [VegType; N_VEG],
        mut bare_ground_cover: f64,
        params: GlobalParams,
    ) -> SimResult<(Self, Vec<WarningEvent>)> {
        if layers.is_empty() || layers.len() > 25 {
            return Err(SimError::ConfigError {
                reason: format!("site must have 1-25 layers, got {}", layers.len()),
            });
        }
        let mut warnings = Vec::new();

        for v in VegKind::ALL {
            veg[v.index()].validate()?;
        }
        normalize_cover(&mut veg, &mut bare_ground_cover);

        // Step 7: critical SWP consistency. If a veg type's critical-SWP
        // threshold would fall below swc_min in any layer, lower that veg
        // type's critical SWP to SWCtoSWP(swc_min) and recompute everywhere.
        for v in VegKind::ALL {
            let idx = v.index();
            let mut crit_bar = veg[idx].crit_swp_bar;
            loop {
                let mut lowest_allowed: Option<f64> = None;
                for layer in layers.iter() {
                    let swc_crit = layer.swp_to_swc(crit_bar);
                    if swc_crit < layer.swc_min {
                        let implied_bar = layer.swc_to_swp(layer.swc_min)?;
                        lowest_allowed = Some(match lowest_allowed {
                            Some(b) => b.min(implied_bar),
                            None => implied_bar,
                        });
                    }
                }
                match lowest_allowed {
                    Some(new_bar) if new_bar < crit_bar => {
                        crit_bar = new_bar;
                    }
                    _ => break,
                }
            }
            veg[idx].crit_swp_bar = crit_bar;
            for layer in layers.iter_mut() {
                layer.swc_at_swpcrit[idx] = layer.swp_to_swc(crit_bar);
                if layer.swc_at_swpcrit[idx] < layer.swc_min {
                    layer.swc_at_swpcrit[idx] = layer.swc_min;
                }
            }
        }

        // Step 8: region assignment by walking regions shallow-to-deep
        // while transp_coeff[v] > 0.
        for layer in layers.iter_mut() {
            for v in VegKind::ALL {
                let idx = v.index();
                if layer.transp_coeff[idx] > 0.0 {
                    layer.transp_region_id[idx] =
                        regions.region_of(layer.id).unwrap_or(regions.region_count().max(1));
                } else {
                    layer.transp_region_id[idx] = 0;
                }
            }
        }

        // Step 9: normalize evap_coeff and each veg's transp_coeff to sum to 1
        // over active layers, tolerance 1e-4.
        let evap_sum: f64 = layers.iter().map(|l| l.evap_coeff).sum();
        if evap_sum > 0.0 && (evap_sum - 1.0).abs() > 1e-4 {
            warnings.push(WarningEvent::Normalization {
                what: "evap_coeff".into(),
                pre: evap_sum,
                post: 1.0,
            });
            for layer in layers.iter_mut() {
                layer.evap_coeff /= evap_sum;
            }
        }
        for v in VegKind::ALL {
            let idx = v.index();
            let sum: f64 = layers.iter().map(|l| l.transp_coeff[idx]).sum();
            if sum > 0.0 && (sum - 1.0).abs() > 1e-4 {
                warnings.push(WarningEvent::Normalization {
                    what: format!("transp_coeff[{idx}]"),
                    pre: sum,
                    post: 1.0,
                });
                for layer in layers.iter_mut() {
                    layer.transp_coeff[idx] /= sum;
                }
            }
        }

        // Step 10: region boundaries strictly increasing (TranspirationRegions::new
        // already enforced this); top layer must belong to every active veg
        // type's region set, i.e. transp_region_id[v] != 0 whenever that veg
        // type has any nonzero coefficient anywhere.
        for v in VegKind::ALL {
            let idx = v.index();
            let veg_active = layers.iter().any(|l| l.transp_coeff[idx] > 0.0);
            if veg_active && layers[0].transp_region_id[idx] == 0 {
                return Err(SimError::ConfigError {
                    reason: format!(
                        "top soil layer does not belong to veg type {idx}'s transpiration region set"
                    ),
                });
            }
        }

        // Grid setup, 4.8: a max depth that doesn't divide evenly by the
        // spacing, or one that would need too many regression nodes, are
        // both recoverable misconfigurations (unlike a max depth too shallow
        // for the soil profile, which stays fatal in `TemperatureGrid::build`)
        // - warn and fall back to the documented defaults (180, 15), matching
        // the original's single warn-and-reset branch for both conditions.
        let n_rgr_requested = ((params.temp_grid_max_depth_cm / params.temp_grid_spacing_cm).round()
            as i64
            - 1)
        .max(0) as usize;
        let too_many_rgr = n_rgr_requested + 1 >= MAX_ST_RGR;
        let (grid_spacing, grid_max_depth) = if !too_many_rgr
            && divides_cleanly(params.temp_grid_max_depth_cm, params.temp_grid_spacing_cm)
        {
            (params.temp_grid_spacing_cm, params.temp_grid_max_depth_cm)
        } else {
            warnings.push(WarningEvent::TempGridDefaultsReset {
                requested_depth: params.temp_grid_max_depth_cm,
                requested_spacing: params.temp_grid_spacing_cm,
            });
            (15.0, 180.0)
        };
        let temp_grid = TemperatureGrid::build(&layers, grid_spacing, grid_max_depth)?;

        Ok((
            Self {
                layers,
                regions,
                veg,
                bare_ground_cover,
                params,
                temp_grid,
            },
            warnings,
        ))
    }
}
