// ABOUTME: Soil temperature diffusion - C9
// ABOUTME: Regression-grid interpolation, adaptive explicit diffusion, freeze/thaw flagging

use crate::engine::error::{SimError, SimResult};
use crate::engine::site::Layer;

/// Freezing point of soil water (Parton 1984), degC.
pub const FREEZING_TEMP_C: f64 = -1.0;
/// Minimum VWC headroom below saturation for a layer at/under freezing to be
/// flagged frozen (Eitzinger 2000 / Parton 1998 criterion).
pub const MIN_VWC_TO_FREEZE: f64 = 0.13;

const SEC_PER_DAY: f64 = 86400.0;
/// Stop condition on the number of sub-timesteps per day (`SEC_PER_DAY/dt`),
/// not on the number of times `dt` has been halved: the last attempted `dt`
/// is allowed to push `Nsteps_per_day` past this bound by one halving before
/// giving up, matching the original's `Nsteps_per_day <= 16` do-while test.
const MAX_SUBSTEPS_PER_DAY: u32 = 16;
/// Upper bound on regression nodes; the original's `MAX_ST_RGR` compile-time
/// array bound, enforced as a runtime check instead. `site::validate_and_derive`
/// checks a requested grid against this before calling `TemperatureGrid::build`
/// and falls back to the documented defaults (180, 15) rather than failing, so
/// this only fires as a backstop against a caller bypassing that pre-check.
pub const MAX_ST_RGR: usize = 100;

/// Thermal-property constants (Parton 1978 eq. 2.22).
#[derive(Clone, Copy, Debug)]
pub struct ThermalParams {
    pub cs_param1: f64,
    pub cs_param2: f64,
    pub sh_param: f64,
}

impl Default for ThermalParams {
    fn default() -> Self {
        Self {
            cs_param1: 0.0007,
            cs_param2: 0.0003,
            sh_param: 0.18,
        }
    }
}

/// Parton 1998 eq. 5/6: the soil-surface temperature under an existing
/// snowpack, damping the air temperature signal. Returns 0 (no override)
/// when there is no snow.
pub fn surface_temperature_under_snow(air_temp_avg: f64, snow_swe_cm: f64) -> f64 {
    if snow_swe_cm <= 0.0 {
        0.0
    } else if air_temp_avg >= 0.0 {
        -2.0
    } else {
        let k_snow = (-0.15 * snow_swe_cm + 1.0).max(0.0);
        0.3 * air_temp_avg * k_snow - 2.0
    }
}

/// Linear interpolation of `y` between `(x1, y1)` and `(x2, y2)` at `x`,
/// matching the original's `interpolation()` helper (falls back to `y1` if
/// the bracket has zero width).
fn interpolation(x1: f64, x2: f64, y1: f64, y2: f64, x: f64) -> f64 {
    if (x2 - x1).abs() < 1e-12 {
        y1
    } else {
        y1 + (x - x1) * (y2 - y1) / (x2 - x1)
    }
}

/// The evenly spaced regression grid used only for soil-temperature
/// diffusion (distinct from the soil-layer grid). Built once per run from
/// the fixed soil layer geometry; `depths_r[i]` is the depth of interior
/// regression node `i`, `i` in `0..n_rgr`. The grid's lower boundary sits at
/// `max_depth` (the constant-temperature boundary, `Tsoil_constant`), one
/// `delta_x` below the deepest interior node.
#[derive(Clone, Debug)]
pub struct TemperatureGrid {
    pub delta_x: f64,
    pub max_depth: f64,
    pub n_rgr: usize,
    /// Cumulative soil layer bottom depths, len = nlyrs.
    pub depths: Vec<f64>,
    /// Depths of the interior regression nodes, len = n_rgr.
    pub depths_r: Vec<f64>,
    /// Correspondence matrix: row i (regression node), column j (soil
    /// layer), value = cm of overlap between that node's ΔX band and that
    /// soil layer. Column `nlyrs` (the last one) holds a negative value
    /// when the node's band extends past the deepest soil layer, meaning
    /// "copy the deepest soil layer's value" for that portion.
    pub tlyrs_by_slyrs: Vec<Vec<f64>>,
    pub fc_r: Vec<f64>,
    pub wp_r: Vec<f64>,
    pub bulk_density_r: Vec<f64>,
    pub temp_r_yesterday: Vec<f64>,
    pub temp_r_today: Vec<f64>,
}

impl TemperatureGrid {
    /// Soil-temperature-setup: build the grid and its correspondence matrix
    /// from the fixed layer geometry, then interpolate FC, WP, bulk density
    /// and initial temperature onto it. Returns `ConfigError` if `max_depth`
    /// does not reach the deepest soil layer, or (as a backstop; callers are
    /// expected to have already applied the warn-and-reset-to-defaults
    /// fallback) if the grid would still need too many regression nodes.
    pub fn build(layers: &[Layer], delta_x: f64, max_depth: f64) -> SimResult<Self> {
        let nlyrs = layers.len();
        let mut depths = Vec::with_capacity(nlyrs);
        let mut acc = 0.0;
        for layer in layers {
            acc += layer.width;
            depths.push(acc);
        }
        let deepest_soil = *depths.last().unwrap_or(&0.0);

        if !(delta_x > 0.0) || !(max_depth > 0.0) {
            return Err(SimError::ConfigError {
                reason: "temperature grid spacing and max depth must be positive".into(),
            });
        }
        if max_depth < deepest_soil {
            return Err(SimError::ConfigError {
                reason: format!(
                    "temperature grid max depth ({max_depth:.2} cm) must be >= deepest soil layer depth ({deepest_soil:.2} cm)"
                ),
            });
        }

        let n_rgr = ((max_depth / delta_x).round() as i64 - 1).max(0) as usize;
        if n_rgr + 1 >= MAX_ST_RGR {
            return Err(SimError::ConfigError {
                reason: format!("too many ({n_rgr}) soil temperature regression layers requested"),
            });
        }

        let depths_r: Vec<f64> = (1..=n_rgr).map(|i| i as f64 * delta_x).collect();

        // Correspondence matrix: band i spans [i*delta_x, (i+1)*delta_x).
        let mut tlyrs_by_slyrs = vec![vec![0.0; nlyrs + 1]; n_rgr];
        for (i, row) in tlyrs_by_slyrs.iter_mut().enumerate() {
            let lo = i as f64 * delta_x;
            let hi = (i + 1) as f64 * delta_x;
            let mut top = 0.0;
            for (j, &bot) in depths.iter().enumerate() {
                let overlap = (hi.min(bot) - lo.max(top)).max(0.0);
                if overlap > 0.0 {
                    row[j] = overlap;
                }
                top = bot;
            }
            if hi > deepest_soil {
                let beyond = hi - deepest_soil.max(lo);
                if beyond > 0.0 {
                    row[nlyrs] = -beyond;
                }
            }
        }

        let widths: Vec<f64> = layers.iter().map(|l| l.width).collect();
        let bulk_densities: Vec<f64> = layers.iter().map(|l| l.bulk_density).collect();
        let fc_vwc: Vec<f64> = layers.iter().map(|l| l.swc_fc / l.width).collect();
        let wp_vwc: Vec<f64> = layers.iter().map(|l| l.swc_wp / l.width).collect();
        let old_temp: Vec<f64> = layers.iter().map(|l| l.temp_yesterday).collect();

        let bulk_density_r = lyr_soil_to_lyr_temp(&tlyrs_by_slyrs, &widths, &bulk_densities);
        let fc_r = lyr_soil_to_lyr_temp(&tlyrs_by_slyrs, &widths, &fc_vwc);
        let wp_r = lyr_soil_to_lyr_temp(&tlyrs_by_slyrs, &widths, &wp_vwc);
        let temp_r_yesterday =
            lyr_soil_to_lyr_temp_temperature(&depths, &old_temp, max_depth, &depths_r);

        Ok(Self {
            delta_x,
            max_depth,
            n_rgr,
            depths,
            depths_r,
            tlyrs_by_slyrs,
            fc_r,
            wp_r,
            bulk_density_r,
            temp_r_today: temp_r_yesterday.clone(),
            temp_r_yesterday,
        })
    }

    pub fn commit(&mut self) {
        self.temp_r_yesterday.clone_from(&self.temp_r_today);
    }
}

/// Map per-soil-layer values onto the regression grid: each node's value is
/// the overlap-weighted average of the soil layers (or the deepest layer's
/// value, for the portion of a node's band past the soil profile) it spans.
fn lyr_soil_to_lyr_temp(cor: &[Vec<f64>], width_soil: &[f64], var: &[f64]) -> Vec<f64> {
    let nlyrs = width_soil.len();
    cor.iter()
        .map(|row| {
            let mut num = 0.0;
            let mut den = 0.0;
            for (j, &w) in row.iter().enumerate() {
                if w > 0.0 && j < nlyrs {
                    let ratio = w / width_soil[j];
                    num += var[j] * ratio;
                    den += ratio;
                } else if w < 0.0 && nlyrs > 0 {
                    let ratio = -w / width_soil[nlyrs - 1];
                    num += var[nlyrs - 1] * ratio;
                    den += ratio;
                }
            }
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        })
        .collect()
}

/// Map per-soil-layer temperatures onto the regression grid by piecewise
/// linear interpolation against cumulative soil depths, with `end_temp`
/// (the constant boundary temperature) appended as a virtual bottom layer
/// at `max_depth`.
fn lyr_soil_to_lyr_temp_temperature(
    depths_soil: &[f64],
    temp_soil: &[f64],
    max_depth: f64,
    depths_r: &[f64],
) -> Vec<f64> {
    if depths_soil.is_empty() {
        return vec![0.0; depths_r.len()];
    }
    let nlyrs = depths_soil.len();
    let mut depths2 = Vec::with_capacity(nlyrs + 1);
    depths2.push(0.0);
    depths2.extend_from_slice(depths_soil);
    let mut temp2 = Vec::with_capacity(nlyrs + 1);
    temp2.push(temp_soil[0]);
    temp2.extend_from_slice(temp_soil);
    // endpoint for extrapolation past the deepest soil layer
    depths2.push(max_depth);
    temp2.push(*temp_soil.last().unwrap());

    depths_r
        .iter()
        .map(|&d| {
            let mut j = 0;
            while j + 1 < depths2.len() && depths2[j + 1] < d {
                j += 1;
            }
            let j2 = (j + 1).min(depths2.len() - 1);
            interpolation(depths2[j], depths2[j2], temp2[j], temp2[j2], d)
        })
        .collect()
}

/// Interpolate regression-grid values back onto soil layers: each layer's
/// value is the overlap-weighted average of the regression nodes whose
/// bands intersect it.
fn lyr_temp_to_lyr_soil(cor: &[Vec<f64>], nlyrs: usize, var_r: &[f64]) -> Vec<f64> {
    let mut num = vec![0.0; nlyrs];
    let mut den = vec![0.0; nlyrs];
    for (i, row) in cor.iter().enumerate() {
        for j in 0..nlyrs {
            let w = row[j];
            if w > 0.0 {
                num[j] += var_r[i] * w;
                den[j] += w;
            }
        }
    }
    (0..nlyrs)
        .map(|j| if den[j] > 0.0 { num[j] / den[j] } else { 0.0 })
        .collect()
}

/// Advance the regression grid by one day of explicit diffusion against a
/// surface boundary `surface_temp` and the constant-temperature lower
/// boundary `t_const`, halving the timestep whenever any node's `parts`
/// (Parton 1984's stability parameter) reaches 0.5, up to 16 doublings.
/// Interpolates today's VWC onto the grid, diffuses, then interpolates the
/// result back onto `layers[..].temp_today`. Fails with
/// `SimError::TempUnstable` if still unstable after 16 halvings, or if any
/// node's temperature exceeds +-100 degC.
pub fn soil_temperature_today(
    grid: &mut TemperatureGrid,
    layers: &mut [Layer],
    surface_temp: f64,
    t_const: f64,
    params: &ThermalParams,
    year: u32,
    doy: u32,
) -> SimResult<()> {
    let n = grid.n_rgr;
    if n == 0 {
        for layer in layers.iter_mut() {
            layer.temp_today = surface_temp;
            layer.temp_min_today = surface_temp;
            layer.temp_max_today = surface_temp;
        }
        return Ok(());
    }

    let widths: Vec<f64> = layers.iter().map(|l| l.width).collect();
    let vwc: Vec<f64> = layers.iter().map(|l| l.vwc_today()).collect();
    let vwc_r = lyr_soil_to_lyr_temp(&grid.tlyrs_by_slyrs, &widths, &vwc);

    let old_temp = grid.temp_r_yesterday.clone();
    let mut dt = SEC_PER_DAY;

    loop {
        let nsteps = (SEC_PER_DAY / dt).round().max(1.0) as u32;
        let mut step_old = old_temp.clone();
        let mut step_new = old_temp.clone();
        let mut stable = true;

        'substeps: for _ in 0..nsteps {
            for i in 0..n {
                let denom = grid.fc_r[i] - grid.wp_r[i];
                let pe = if denom.abs() > 1e-9 {
                    ((vwc_r[i] - grid.wp_r[i]) / denom).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let cs = params.cs_param1 + pe * params.cs_param2;
                let sh = vwc_r[i] + params.sh_param * (1.0 - vwc_r[i]);
                let alpha = cs / (sh * grid.bulk_density_r[i].max(1e-9));
                let parts = alpha * dt / grid.delta_x.powi(2);

                if parts >= 0.5 {
                    stable = false;
                    break 'substeps;
                }

                let above = if i == 0 { surface_temp } else { step_old[i - 1] };
                let below = if i + 1 < n { step_old[i + 1] } else { t_const };
                let t_new = step_old[i] + parts * (above - 2.0 * step_old[i] + below);

                if !(-100.0..=100.0).contains(&t_new) {
                    return Err(SimError::TempUnstable { year, doy });
                }
                step_new[i] = t_new;
            }
            if !stable {
                break;
            }
            step_old.clone_from(&step_new);
        }

        if stable {
            grid.temp_r_today = step_new;
            break;
        }

        if nsteps >= MAX_SUBSTEPS_PER_DAY {
            return Err(SimError::TempUnstable { year, doy });
        }
        dt /= 2.0;
    }

    let nlyrs = layers.len();
    let soil_today = lyr_temp_to_lyr_soil(&grid.tlyrs_by_slyrs, nlyrs, &grid.temp_r_today);
    for (layer, t) in layers.iter_mut().zip(soil_today.into_iter()) {
        layer.temp_today = t;
        layer.temp_min_today = t;
        layer.temp_max_today = t;
    }

    Ok(())
}

/// Damp a surface min/max air-temperature half-range down to each
/// regression node using a running mean thermal diffusivity from the
/// surface (Parton 1984), then interpolate the result back onto soil
/// layers. Call after `soil_temperature_today` on the same grid.
pub fn daily_min_max(
    grid: &TemperatureGrid,
    layers: &mut [Layer],
    surf_min: f64,
    surf_max: f64,
    params: &ThermalParams,
) {
    let n = grid.n_rgr;
    let nlyrs = layers.len();
    if n == 0 {
        for layer in layers.iter_mut() {
            layer.temp_min_today = surf_min;
            layer.temp_max_today = surf_max;
        }
        return;
    }
    let half_range = (surf_max - surf_min).max(0.0) / 2.0;
    let mean = (surf_max + surf_min) / 2.0;

    let mut mean_alpha_acc = 0.0;
    let mut min_r = vec![0.0; n];
    let mut max_r = vec![0.0; n];
    for i in 0..n {
        let denom = grid.fc_r[i] - grid.wp_r[i];
        let vwc_est = grid.wp_r[i] + denom.max(0.0) * 0.5;
        let pe = if denom.abs() > 1e-9 { 0.5 } else { 0.0 };
        let cs = params.cs_param1 + pe * params.cs_param2;
        let sh = vwc_est + params.sh_param * (1.0 - vwc_est);
        let alpha = cs / (sh * grid.bulk_density_r[i].max(1e-9));
        mean_alpha_acc += alpha;
        let mean_alpha = (mean_alpha_acc / (i as f64 + 1.0)).max(1e-12);
        let damp = (-grid.depths_r[i] * (std::f64::consts::PI / (SEC_PER_DAY * mean_alpha)).sqrt()).exp();
        min_r[i] = mean - half_range * damp;
        max_r[i] = mean + half_range * damp;
    }
    let min_soil = lyr_temp_to_lyr_soil(&grid.tlyrs_by_slyrs, nlyrs, &min_r);
    let max_soil = lyr_temp_to_lyr_soil(&grid.tlyrs_by_slyrs, nlyrs, &max_r);
    for ((layer, mn), mx) in layers.iter_mut().zip(min_soil).zip(max_soil) {
        layer.temp_min_today = layer.temp_min_today.min(mn);
        layer.temp_max_today = layer.temp_max_today.max(mx);
    }
}

/// Eitzinger 2000 / Parton 1998 frozen criterion: at or below freezing and
/// not so wet that latent heat would keep it liquid. The fusion-pool
/// latent-heat correction named alongside this in the source literature is
/// a documented no-op and is intentionally not implemented (see DESIGN.md).
pub fn set_frozen_unfrozen(layers: &mut [Layer]) {
    for layer in layers.iter_mut() {
        layer.frozen = layer.temp_today <= FREEZING_TEMP_C
            && layer.swc_today > layer.swc_sat - layer.width * MIN_VWC_TO_FREEZE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::site::vegetation::N_VEG;
    use crate::engine::site::{derive_layer, LayerSpec, ThresholdMode};

    fn test_layer(id: usize, width: f64, temp: f64) -> Layer {
        let spec = LayerSpec {
            id,
            width,
            sand: 0.4,
            clay: 0.2,
            gravel_vol_fraction: 0.0,
            matric_density: 1.4,
            impermeability: 0.0,
            initial_soil_temp: temp,
            evap_coeff: 0.0,
            transp_coeff: [0.0; N_VEG],
            swrc: None,
            swc_min_mode: ThresholdMode::FixedSwp(30.0),
            swc_init_mode: ThresholdMode::FixedSwp(0.5),
            swc_wet_mode: ThresholdMode::FixedSwp(0.1),
        };
        derive_layer(spec).unwrap()
    }

    #[test]
    fn grid_rejects_shallow_max_depth() {
        let layers = vec![test_layer(0, 200.0, 15.0)];
        assert!(TemperatureGrid::build(&layers, 15.0, 180.0).is_err());
    }

    #[test]
    fn grid_builds_with_defaults() {
        let layers = vec![test_layer(0, 20.0, 15.0), test_layer(1, 20.0, 15.0)];
        let grid = TemperatureGrid::build(&layers, 15.0, 180.0).unwrap();
        assert_eq!(grid.n_rgr, 11);
        assert_eq!(grid.depths_r.len(), 11);
        assert_eq!(grid.tlyrs_by_slyrs.len(), 11);
        assert_eq!(grid.tlyrs_by_slyrs[0].len(), 3);
    }

    #[test]
    fn converges_toward_constant_boundary_over_many_days() {
        let mut layers = vec![
            test_layer(0, 20.0, 25.0),
            test_layer(1, 20.0, 25.0),
            test_layer(2, 20.0, 25.0),
        ];
        let mut grid = TemperatureGrid::build(&layers, 15.0, 180.0).unwrap();
        let params = ThermalParams::default();
        for day in 0..400 {
            soil_temperature_today(&mut grid, &mut layers, 10.0, 10.0, &params, 1, day).unwrap();
            grid.commit();
            for l in layers.iter_mut() {
                l.commit();
            }
        }
        for l in &layers {
            assert!((l.temp_today - 10.0).abs() < 2.0, "temp={}", l.temp_today);
        }
    }

    #[test]
    fn surface_under_snow_is_damped_and_cold() {
        assert_eq!(surface_temperature_under_snow(5.0, 0.0), 0.0);
        assert_eq!(surface_temperature_under_snow(5.0, 3.0), -2.0);
        let cold = surface_temperature_under_snow(-10.0, 3.0);
        assert!(cold < -2.0 && cold > -5.0);
    }

    #[test]
    fn daily_min_max_brackets_mean() {
        let mut layers = vec![test_layer(0, 20.0, 15.0), test_layer(1, 20.0, 15.0)];
        let grid = TemperatureGrid::build(&layers, 15.0, 180.0).unwrap();
        let params = ThermalParams::default();
        daily_min_max(&grid, &mut layers, 10.0, 20.0, &params);
        for l in &layers {
            assert!(l.temp_min_today <= l.temp_max_today);
        }
    }

    #[test]
    fn frozen_flag_requires_both_cold_and_not_too_wet() {
        let mut layer = test_layer(0, 10.0, -2.0);
        layer.swc_today = layer.swc_sat;
        let mut layers = vec![layer];
        set_frozen_unfrozen(&mut layers);
        assert!(!layers[0].frozen, "too wet to freeze despite cold temp");

        let mut layer = test_layer(0, 10.0, -2.0);
        layer.swc_today = layer.swc_wp;
        let mut layers = vec![layer];
        set_frozen_unfrozen(&mut layers);
        assert!(layers[0].frozen);
    }
}
