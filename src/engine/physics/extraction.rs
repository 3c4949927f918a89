// ABOUTME: Removal from soil - C7, shared by bare-soil evaporation and transpiration
// ABOUTME: SWP-weighted coefficients distribute a single total rate across non-frozen layers

use crate::engine::error::SimResult;
use crate::engine::site::Layer;

/// Remove `rate` (cm/day) from `layers`, weighted by `coeff[i] / SWP[i]`
/// (saturated layers use `coeff[i] / 0.333` to avoid a singularity), bounded
/// below by `floor[i]` and skipping frozen layers entirely. Adds the total
/// removed to `aet` and returns the per-layer amounts removed.
pub fn remove_from_soil(
    layers: &mut [Layer],
    coeff: &[f64],
    rate: f64,
    floor: &[f64],
    aet: &mut f64,
) -> SimResult<Vec<f64>> {
    let n = layers.len();
    let mut removed = vec![0.0; n];
    let mut swpfrac = vec![0.0; n];
    let mut sumswp = 0.0;

    for i in 0..n {
        let swp = layers[i].swp_today()?;
        swpfrac[i] = if swp > 0.0 {
            coeff[i] / swp
        } else {
            coeff[i] / 0.333
        };
        sumswp += swpfrac[i];
    }

    if sumswp == 0.0 {
        return Ok(removed);
    }

    for i in 0..n {
        let d = if layers[i].frozen {
            0.0
        } else {
            let q = (swpfrac[i] / sumswp) * rate;
            let avail = (layers[i].swc_today - floor[i]).max(0.0);
            q.min(avail)
        };
        layers[i].swc_today -= d;
        *aet += d;
        removed[i] = d;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::site::{derive_layer, LayerSpec, ThresholdMode, N_VEG};

    fn test_layer(id: usize) -> Layer {
        let spec = LayerSpec {
            id,
            width: 10.0,
            sand: 0.4,
            clay: 0.2,
            gravel_vol_fraction: 0.0,
            matric_density: 1.4,
            impermeability: 0.0,
            initial_soil_temp: 15.0,
            evap_coeff: 1.0,
            transp_coeff: [0.0; N_VEG],
            swrc: None,
            swc_min_mode: ThresholdMode::FixedSwp(30.0),
            swc_init_mode: ThresholdMode::FixedSwp(0.5),
            swc_wet_mode: ThresholdMode::FixedSwp(0.1),
        };
        let mut layer = derive_layer(spec).unwrap();
        layer.swc_today = layer.swc_fc;
        layer
    }

    #[test]
    fn extraction_never_drives_below_floor() {
        let mut layers = vec![test_layer(0)];
        let floor = vec![layers[0].swc_halfwp];
        let mut aet = 0.0;
        let coeff = vec![1.0];
        let removed = remove_from_soil(&mut layers, &coeff, 100.0, &floor, &mut aet).unwrap();
        assert!(layers[0].swc_today >= floor[0] - 1e-9);
        assert!(removed[0] > 0.0);
    }

    #[test]
    fn frozen_layer_is_skipped() {
        let mut layer = test_layer(0);
        layer.frozen = true;
        let mut layers = vec![layer];
        let floor = vec![layers[0].swc_halfwp];
        let mut aet = 0.0;
        let coeff = vec![1.0];
        let removed = remove_from_soil(&mut layers, &coeff, 1.0, &floor, &mut aet).unwrap();
        assert_eq!(removed[0], 0.0);
        assert_eq!(aet, 0.0);
    }
}
