// ABOUTME: Soil water retention curve - bidirectional VWC <-> SWP mapping per layer
// ABOUTME: Campbell (1974) and van Genuchten (1980) families, plus pedotransfer estimation from texture

use super::BAR_TO_CM;
use crate::engine::error::{SimError, SimResult};

/// Which retention-curve family a layer's parameters belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwrcKind {
    /// Campbell 1974 power law: psi = psi_s * (theta / theta_s) ^ -b
    Campbell1974,
    /// van Genuchten 1980 closed form.
    VanGenuchten1980,
}

/// A fitted (or estimated) retention curve for one soil layer.
///
/// Campbell1974 params: `[psi_s (bar), theta_s (cm/cm), b]`.
/// VanGenuchten1980 params: `[theta_r, theta_s, alpha (1/bar), n]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Swrc {
    kind: SwrcKind,
    params: Vec<f64>,
}

impl Swrc {
    pub fn campbell(psi_s: f64, theta_s: f64, b: f64) -> Self {
        Self {
            kind: SwrcKind::Campbell1974,
            params: vec![psi_s, theta_s, b],
        }
    }

    pub fn van_genuchten(theta_r: f64, theta_s: f64, alpha: f64, n: f64) -> Self {
        Self {
            kind: SwrcKind::VanGenuchten1980,
            params: vec![theta_r, theta_s, alpha, n],
        }
    }

    pub fn kind(&self) -> SwrcKind {
        self.kind
    }

    pub fn theta_s(&self) -> f64 {
        match self.kind {
            SwrcKind::Campbell1974 => self.params[1],
            SwrcKind::VanGenuchten1980 => self.params[1],
        }
    }

    /// Validate the parameter vector. Called once at load time; failures are fatal.
    pub fn validate(&self) -> SimResult<()> {
        match self.kind {
            SwrcKind::Campbell1974 => {
                let [psi_s, theta_s, b] = [self.params[0], self.params[1], self.params[2]];
                if !(psi_s > 0.0) {
                    return Err(SimError::ConfigError {
                        reason: format!("Campbell1974: psi_s must be > 0, got {psi_s}"),
                    });
                }
                if !(theta_s > 0.0 && theta_s <= 1.0) {
                    return Err(SimError::ConfigError {
                        reason: format!("Campbell1974: theta_s must be in (0, 1], got {theta_s}"),
                    });
                }
                if b == 0.0 {
                    return Err(SimError::ConfigError {
                        reason: "Campbell1974: b must be nonzero".into(),
                    });
                }
                Ok(())
            }
            SwrcKind::VanGenuchten1980 => {
                let [theta_r, theta_s, alpha, n] = [
                    self.params[0],
                    self.params[1],
                    self.params[2],
                    self.params[3],
                ];
                if !(theta_r >= 0.0 && theta_r < theta_s && theta_s <= 1.0) {
                    return Err(SimError::ConfigError {
                        reason: format!(
                            "vanGenuchten1980: require 0 <= theta_r < theta_s <= 1, got theta_r={theta_r}, theta_s={theta_s}"
                        ),
                    });
                }
                if !(alpha > 0.0) {
                    return Err(SimError::ConfigError {
                        reason: format!("vanGenuchten1980: alpha must be > 0, got {alpha}"),
                    });
                }
                if !(n > 1.0) {
                    return Err(SimError::ConfigError {
                        reason: format!("vanGenuchten1980: n must be > 1, got {n}"),
                    });
                }
                Ok(())
            }
        }
    }

    /// Forward mapping: matric volumetric water content (cm/cm) -> matric
    /// potential magnitude (bar). Callers handle the "SWC <= 0 -> 0" special
    /// case themselves (this function only ever sees theta_m > 0).
    pub fn vwc_to_swp(&self, theta_m: f64, layer_id: usize) -> SimResult<f64> {
        match self.kind {
            SwrcKind::Campbell1974 => {
                let (psi_s, theta_s, b) = (self.params[0], self.params[1], self.params[2]);
                let ratio = (theta_m / theta_s).powf(b);
                if ratio == 0.0 || ratio.is_nan() {
                    return Err(SimError::RetentionDomainError {
                        layer_id,
                        reason: format!(
                            "(theta/theta_s)^b underflowed to zero (theta={theta_m}, theta_s={theta_s}, b={b})"
                        ),
                    });
                }
                Ok(psi_s / ratio)
            }
            SwrcKind::VanGenuchten1980 => {
                let (theta_r, theta_s, alpha, n) = (
                    self.params[0],
                    self.params[1],
                    self.params[2],
                    self.params[3],
                );
                let m = 1.0 - 1.0 / n;
                let se = ((theta_m - theta_r) / (theta_s - theta_r)).clamp(1e-12, 1.0);
                let inner = se.powf(-1.0 / m) - 1.0;
                if inner <= 0.0 || inner.is_nan() {
                    return Err(SimError::RetentionDomainError {
                        layer_id,
                        reason: format!("van Genuchten inverse-Se term invalid (Se={se})"),
                    });
                }
                Ok(inner.powf(1.0 / n) / alpha)
            }
        }
    }

    /// Inverse mapping: matric potential magnitude (bar) -> matric volumetric
    /// water content (cm/cm).
    pub fn swp_to_vwc(&self, swp_bar: f64) -> f64 {
        match self.kind {
            SwrcKind::Campbell1974 => {
                let (psi_s, theta_s, b) = (self.params[0], self.params[1], self.params[2]);
                theta_s * (psi_s / swp_bar).powf(1.0 / b)
            }
            SwrcKind::VanGenuchten1980 => {
                let (theta_r, theta_s, alpha, n) = (
                    self.params[0],
                    self.params[1],
                    self.params[2],
                    self.params[3],
                );
                let m = 1.0 - 1.0 / n;
                let h = swp_bar;
                theta_r + (theta_s - theta_r) / (1.0 + (alpha * h).powf(n)).powf(m)
            }
        }
    }
}

/// Cosby et al. (1984) multivariate pedotransfer function for Campbell 1974
/// parameters, estimated from sand/clay mass fractions (both in [0, 1]).
/// Coefficients reproduced from Table 4 of Cosby et al. 1984.
pub fn estimate_campbell_cosby1984(sand: f64, clay: f64) -> Swrc {
    let psi_s = 10f64.powf(-1.58 * sand - 0.63 * clay + 2.17);
    let theta_s = -0.142 * sand - 0.037 * clay + 0.505;
    let b = -0.3 * sand + 15.7 * clay + 3.10;
    Swrc::campbell(psi_s, theta_s, b)
}

/// Saxton et al. (2006) based estimate of saturated VWC directly from
/// texture (organic matter fraction assumed zero); shape parameters
/// (psi_s, b) still come from Cosby 1984. An alternative pedotransfer
/// function sharing the same curve family as `estimate_campbell_cosby1984`
/// but with a different saturated-theta regression (eqs. 2, 3, 5).
pub fn estimate_campbell_saxton2006(sand: f64, clay: f64) -> Swrc {
    let mut swrc = estimate_campbell_cosby1984(sand, clay);
    let theta_33t = 0.299 - 0.251 * sand + 0.195 * clay + 0.452 * sand * clay;
    let theta_33 = theta_33t + (1.283 * theta_33t * theta_33t - 0.374 * theta_33t - 0.015);
    let theta_s33t = 0.078 + 0.278 * sand + 0.034 * clay - 0.584 * sand * clay;
    let theta_s33 = theta_s33t + (0.636 * theta_s33t - 0.107);
    let theta_s = theta_33 + theta_s33 - 0.097 * sand + 0.043;
    swrc.params[1] = theta_s;
    swrc
}

/// Rawls & Brakensiek (1985) polynomial estimate of Brooks-Corey residual
/// volumetric water content. Valid only for clay in [0.05, 0.6], sand in
/// [0.05, 0.7], porosity in [0.1, 1); returns `None` outside that box (the
/// spec's "missing" sentinel, modeled as an `Option` at this boundary per
/// the redesign notes).
pub fn residual_vwc_rawls_brakensiek(
    gravel: f64,
    sand: f64,
    clay: f64,
    porosity: f64,
) -> Option<f64> {
    if !(0.05..=0.6).contains(&clay) || !(0.05..=0.7).contains(&sand) || !(0.1..1.0).contains(&porosity)
    {
        return None;
    }
    let sand_pct = sand * 100.0;
    let clay_pct = clay * 100.0;
    let res = (1.0 - gravel)
        * (-0.0182482 + 0.00087269 * sand_pct + 0.00513488 * clay_pct + 0.02939286 * porosity
            - 0.00015395 * clay_pct.powi(2)
            - 0.0010827 * sand_pct * porosity
            - 0.00018233 * clay_pct.powi(2) * porosity.powi(2)
            + 0.00030703 * clay_pct.powi(2) * porosity
            - 0.0023584 * porosity.powi(2) * clay_pct);
    Some(res.max(0.0))
}

pub(crate) fn bar_to_cm_head(bar: f64) -> f64 {
    bar * BAR_TO_CM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campbell_round_trip() {
        let swrc = estimate_campbell_cosby1984(0.4, 0.2);
        swrc.validate().unwrap();
        let theta_s = swrc.theta_s();
        let mut theta = 0.05;
        while theta < theta_s - 1e-6 {
            let swp = swrc.vwc_to_swp(theta, 0).unwrap();
            let back = swrc.swp_to_vwc(swp);
            assert!(
                (theta - back).abs() < 1e-6,
                "theta={theta} swp={swp} back={back}"
            );
            theta += 0.02;
        }
    }

    #[test]
    fn saxton2006_theta_s_differs_from_cosby_and_validates() {
        let cosby = estimate_campbell_cosby1984(0.4, 0.2);
        let saxton = estimate_campbell_saxton2006(0.4, 0.2);
        saxton.validate().unwrap();
        assert!((cosby.theta_s() - saxton.theta_s()).abs() > 1e-6);
    }

    #[test]
    fn van_genuchten_round_trip() {
        let swrc = Swrc::van_genuchten(0.05, 0.45, 0.02, 1.5);
        swrc.validate().unwrap();
        let mut theta = 0.06;
        while theta < 0.45 - 1e-6 {
            let swp = swrc.vwc_to_swp(theta, 0).unwrap();
            let back = swrc.swp_to_vwc(swp);
            assert!(
                (theta - back).abs() < 1e-5,
                "theta={theta} swp={swp} back={back}"
            );
            theta += 0.03;
        }
    }

    #[test]
    fn monotone_decreasing_swp_with_theta() {
        let swrc = estimate_campbell_cosby1984(0.3, 0.25);
        let mut prev_swp = f64::INFINITY;
        let mut theta = 0.05;
        while theta < swrc.theta_s() - 1e-6 {
            let swp = swrc.vwc_to_swp(theta, 0).unwrap();
            assert!(swp < prev_swp, "swp should decrease as theta increases");
            prev_swp = swp;
            theta += 0.02;
        }
    }

    #[test]
    fn campbell_rejects_zero_b() {
        let swrc = Swrc::campbell(1.0, 0.4, 0.0);
        assert!(swrc.validate().is_err());
    }

    #[test]
    fn van_genuchten_rejects_bad_theta_ordering() {
        let swrc = Swrc::van_genuchten(0.4, 0.3, 0.02, 1.5);
        assert!(swrc.validate().is_err());
    }

    #[test]
    fn residual_vwc_outside_valid_box_is_none() {
        assert!(residual_vwc_rawls_brakensiek(0.0, 0.9, 0.2, 0.4).is_none());
        assert!(residual_vwc_rawls_brakensiek(0.0, 0.4, 0.2, 0.4).is_some());
    }
}
