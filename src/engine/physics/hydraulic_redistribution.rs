// ABOUTME: Hydraulic redistribution - C8, Ryel 2002 passive root-mediated water movement
// ABOUTME: Builds an antisymmetric per-pair matrix, then iteratively restricts it to respect swc_min

use crate::engine::error::{SimError, SimResult};
use crate::engine::site::Layer;

/// Per veg type `v`: redistribute water between non-frozen, root-containing
/// layers (excluding the surface layer) along SWP gradients. Returns the net
/// `hydred[i]` applied to each layer (already scaled by `scale`, i.e. veg
/// cover) and mutates `layers[i].swc_today` in place.
pub fn hydraulic_redistribution(
    layers: &mut [Layer],
    veg_index: usize,
    max_cond_root: f64,
    swp50: f64,
    shape_cond: f64,
    scale: f64,
    year: u32,
    doy: u32,
) -> SimResult<Vec<f64>> {
    let n = layers.len();
    let mut swa = vec![0.0; n];
    let mut swp = vec![0.0; n];
    let mut rel_cond_root = vec![0.0; n];

    for i in 0..n {
        let floor = layers[i].swc_wp.min(layers[i].swc_at_swpcrit[veg_index]);
        swa[i] = (layers[i].swc_today - floor).max(0.0);
        swp[i] = layers[i].swp_today()?;
        rel_cond_root[i] = (1.0 / (1.0 + (swp[i] / swp50).powf(shape_cond))).clamp(0.0, 1.0);
    }

    let mut hd = vec![vec![0.0_f64; n]; n];

    for i in 1..n {
        for j in (i + 1)..n {
            let wet_enough = layers[i].swc_today > layers[i].swc_wp || layers[j].swc_today > layers[j].swc_wp;
            if wet_enough && !layers[i].frozen && !layers[j].frozen {
                let (idso, idre) = if swp[i] < swp[j] { (i, j) } else { (j, i) };
                let mut co_src = layers[idso].transp_coeff[veg_index];
                let mut co_recip = layers[idre].transp_coeff[veg_index];
                if layers[idso].width < layers[idre].width {
                    co_recip *= layers[idso].width / layers[idre].width;
                }
                if co_src >= 1.0 {
                    co_src = 0.999_999;
                }
                let tmp = (10.0 / 24.0) * max_cond_root * (swp[j] - swp[i])
                    * rel_cond_root[i].max(rel_cond_root[j])
                    * co_src
                    * co_recip
                    / (1.0 - co_src);
                let tmp = tmp.clamp(-swa[idso], swa[idso]);
                hd[i][j] = tmp;
                hd[j][i] = -tmp;
            }
        }
    }

    let mut infeasible = true;
    let mut nit = 0;
    while nit < n && infeasible {
        nit += 1;
        infeasible = false;
        for i in 0..n {
            if swa[i] <= 0.0 {
                continue;
            }
            let mut hdin = 0.0;
            let mut hdout = 0.0;
            for j in 0..n {
                if hd[i][j] > 0.0 {
                    hdin += hd[i][j];
                } else {
                    hdout += hd[i][j];
                }
            }
            let hdnet = hdin + hdout;
            if hdnet < 0.0 && -hdnet > swa[i] {
                let factor = -(swa[i] + hdin) / hdout;
                infeasible = true;
                for j in 0..n {
                    if hd[i][j] < 0.0 {
                        hd[i][j] *= factor;
                        hd[j][i] *= factor;
                    }
                }
            }
        }
    }

    if infeasible {
        return Err(SimError::HydRedInfeasible {
            year,
            doy,
            layer_id: 0,
        });
    }

    let mut hydred = vec![0.0; n];
    for i in 1..n {
        let net: f64 = (1..n).map(|j| hd[i][j]).sum();
        hydred[i] = net * scale;
        layers[i].swc_today += hydred[i];
    }

    Ok(hydred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::site::{derive_layer, LayerSpec, ThresholdMode, N_VEG};

    fn layer_at(id: usize, swc_frac_of_fc: f64) -> Layer {
        let mut coeff = [0.0; N_VEG];
        coeff[1] = 0.25;
        let spec = LayerSpec {
            id,
            width: 10.0,
            sand: 0.4,
            clay: 0.2,
            gravel_vol_fraction: 0.0,
            matric_density: 1.4,
            impermeability: 0.0,
            initial_soil_temp: 15.0,
            evap_coeff: 0.25,
            transp_coeff: coeff,
            swrc: None,
            swc_min_mode: ThresholdMode::FixedSwp(30.0),
            swc_init_mode: ThresholdMode::FixedSwp(0.5),
            swc_wet_mode: ThresholdMode::FixedSwp(0.1),
        };
        let mut layer = derive_layer(spec).unwrap();
        layer.swc_at_swpcrit[1] = layer.swc_wp;
        layer.swc_today = layer.swc_fc * swc_frac_of_fc;
        layer
    }

    #[test]
    fn conserves_total_water_across_layers() {
        let mut layers = vec![layer_at(0, 0.6), layer_at(1, 1.0), layer_at(2, 1.0), layer_at(3, 1.0)];
        let hydred = hydraulic_redistribution(&mut layers, 1, 0.0097, 3.0, 3.22, 1.0, 1, 1).unwrap();
        let total: f64 = hydred.iter().sum();
        assert!(total.abs() < 1e-6, "total={total}");
    }

    #[test]
    fn dry_top_layer_receives_water() {
        let mut layers = vec![layer_at(0, 0.6), layer_at(1, 1.0), layer_at(2, 1.0), layer_at(3, 1.0)];
        let hydred = hydraulic_redistribution(&mut layers, 1, 0.0097, 3.0, 3.22, 1.0, 1, 1).unwrap();
        assert_eq!(hydred[0], 0.0, "no HR in surface layer");
        assert!(hydred.iter().skip(1).any(|h| *h < 0.0), "some deeper layer donates");
    }

    #[test]
    fn result_never_drives_below_floor() {
        let mut layers = vec![layer_at(0, 0.6), layer_at(1, 1.0), layer_at(2, 1.0), layer_at(3, 1.0)];
        hydraulic_redistribution(&mut layers, 1, 0.0097, 3.0, 3.22, 1.0, 1, 1).unwrap();
        for l in &layers {
            let floor = l.swc_wp.min(l.swc_at_swpcrit[1]);
            assert!(l.swc_today >= floor - 1e-6);
        }
    }
}
