// ABOUTME: Evapotranspiration partitioning - C6
// ABOUTME: watrate, bare-soil/transpiration partitioning, and the two potential-rate formulas

use crate::engine::core::tanfunc;
use crate::engine::error::SimResult;
use crate::engine::site::region::TranspirationRegions;
use crate::engine::site::Layer;

/// Parton-1978 tangens-driven rate in `[0, 1]`: the ratio of actual to
/// potential E/T as a function of soil water potential, with a PET-dependent
/// slope adjustment (`par1`).
pub fn watrate(swp: f64, petday: f64, shift: f64, shape: f64, inflec: f64, range: f64) -> f64 {
    let par1 = if petday < 0.2 {
        3.0
    } else if petday < 0.4 {
        (0.4 - petday) * -10.0 + 5.0
    } else if petday < 0.6 {
        (0.6 - petday) * -15.0 + 8.0
    } else {
        8.0
    };
    let par2 = shift - swp;
    tanfunc(par2, par1, inflec, range, shape).clamp(0.0, 1.0)
}

/// Fraction of water loss from bare-soil evaporation vs. transpiration,
/// from live LAI.
pub fn es_t_partitioning(lai_live: f64, lai_param: f64) -> (f64, f64) {
    let fbse = (-lai_param * lai_live).exp().min(0.995);
    (fbse, 1.0 - fbse)
}

/// Weighted-average SWP across the evaporation layers (coefficients already
/// normalized to sum to 1 at load time).
pub fn pot_soil_evap_avg_swp(layers: &[Layer]) -> SimResult<f64> {
    let mut avswp = 0.0;
    let mut sumwidth = 0.0;
    for layer in layers {
        if layer.evap_coeff == 0.0 {
            break;
        }
        let x = layer.width * layer.evap_coeff;
        sumwidth += x;
        avswp += x * layer.swp_today()?;
    }
    Ok(if sumwidth == 0.0 { 0.0 } else { avswp / sumwidth })
}

/// Potential bare-soil evaporation rate ("pot_soil_evap"): zero when total
/// above-ground biomass saturates the litter cutoff or the column is dry.
pub fn pot_soil_evap(
    avswp: f64,
    totagb: f64,
    fbse: f64,
    petday: f64,
    shift: f64,
    shape: f64,
    inflec: f64,
    range: f64,
    es_param_limit: f64,
) -> f64 {
    if totagb >= es_param_limit || avswp == 0.0 {
        0.0
    } else {
        petday * watrate(avswp, petday, shift, shape, inflec, range) * (1.0 - totagb / es_param_limit) * fbse
    }
}

/// Potential bare-soil evaporation for the uncovered (bare-ground) path,
/// which has no litter cutoff, unlike `pot_soil_evap`. Callers pick whichever
/// formula matches their intent instead of branching on a litter flag here.
pub fn pot_soil_evap_bs(avswp: f64, petday: f64, shift: f64, shape: f64, inflec: f64, range: f64) -> f64 {
    petday * watrate(avswp, petday, shift, shape, inflec, range)
}

/// Potential transpiration rate ("pot_transp"), with a shade adjustment when
/// dead biomass exceeds `shade_deadmax`.
#[allow(clippy::too_many_arguments)]
pub fn pot_transp(
    swp_avg: f64,
    biolive: f64,
    biodead: f64,
    fbst: f64,
    petday: f64,
    swp_shift: f64,
    swp_shape: f64,
    swp_inflec: f64,
    swp_range: f64,
    shade_scale: f64,
    shade_deadmax: f64,
    shade_xinflex: f64,
    shade_slope: f64,
    shade_yinflex: f64,
    shade_range: f64,
    co2_wue_multiplier: f64,
) -> f64 {
    if biolive <= 0.0 {
        return 0.0;
    }
    let shadeaf = if biodead >= shade_deadmax {
        let par1 = tanfunc(biolive, shade_xinflex, shade_yinflex, shade_range, shade_slope);
        let par2 = tanfunc(biodead, shade_xinflex, shade_yinflex, shade_range, shade_slope);
        ((par1 / par2) * (1.0 - shade_scale) + shade_scale).min(1.0)
    } else {
        1.0
    };
    watrate(swp_avg, petday, swp_shift, swp_shape, swp_inflec, swp_range) * shadeaf * petday * fbst * co2_wue_multiplier
}

/// Region-weighted average SWP for a veg type's transpiration: per region,
/// `Sum tr_coeff*SWP / Sum tr_coeff`; the overall result is the minimum
/// (driest) region average.
pub fn transp_weighted_avg(
    layers: &[Layer],
    regions: &TranspirationRegions,
    veg_index: usize,
) -> SimResult<f64> {
    let mut swp_avg: Option<f64> = None;
    for region in 1..=regions.region_count().max(1) {
        let mut swp = 0.0;
        let mut sumco = 0.0;
        for layer in layers {
            if layer.transp_region_id[veg_index] == region {
                swp += layer.transp_coeff[veg_index] * layer.swp_today()?;
                sumco += layer.transp_coeff[veg_index];
            }
        }
        let region_avg = if sumco > 0.0 { swp / sumco } else { 0.0 };
        swp_avg = Some(match swp_avg {
            Some(prev) => prev.min(region_avg),
            None => region_avg,
        });
    }
    Ok(swp_avg.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watrate_is_bounded() {
        let rate = watrate(5.0, 0.5, 3.0, 3.0, -1.5, 1.0);
        assert!((0.0..=1.0).contains(&rate));
    }

    #[test]
    fn partitioning_sums_to_one() {
        let (fbse, fbst) = es_t_partitioning(2.0, 0.5);
        assert!((fbse + fbst - 1.0).abs() < 1e-9);
    }

    #[test]
    fn transp_zero_when_no_live_biomass() {
        let rate = pot_transp(5.0, 0.0, 50.0, 0.8, 0.5, 3.0, 3.0, -1.5, 1.0, 0.5, 100.0, 0.0, 0.1, 0.0, 1.0, 1.0);
        assert_eq!(rate, 0.0);
    }
}
