// ABOUTME: Vegetation state - per-veg-type parameters, monthly->daily interpolation, CO2 multipliers
// ABOUTME: Four fixed kinds (trees, shrubs, forbs, grasses) indexed by VegKind, never a loose array

use crate::engine::core::tanfunc;
use crate::engine::error::{SimError, SimResult};

pub const N_VEG: usize = 4;

/// The four vegetation kinds this core ever tracks. Always indexed through
/// `VegKind::ALL` / `as usize` rather than a bare integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VegKind {
    Trees,
    Shrubs,
    Forbs,
    Grasses,
}

impl VegKind {
    pub const ALL: [VegKind; N_VEG] = [
        VegKind::Trees,
        VegKind::Shrubs,
        VegKind::Forbs,
        VegKind::Grasses,
    ];

    pub fn index(self) -> usize {
        match self {
            VegKind::Trees => 0,
            VegKind::Shrubs => 1,
            VegKind::Forbs => 2,
            VegKind::Grasses => 3,
        }
    }
}

/// A canopy-height model: either a constant, or the tangent-function form
/// used by the source for biomass-driven canopy height.
#[derive(Clone, Debug)]
pub enum CanopyHeight {
    Constant(f64),
    Tangent {
        xinflec: f64,
        yinflec: f64,
        range: f64,
        slope: f64,
    },
}

impl CanopyHeight {
    pub fn height_for_biomass(&self, biomass: f64) -> f64 {
        match self {
            CanopyHeight::Constant(h) => *h,
            CanopyHeight::Tangent {
                xinflec,
                yinflec,
                range,
                slope,
            } => tanfunc(biomass, *xinflec, *yinflec, *range, *slope),
        }
    }
}

/// Interception storage-capacity parameters (canopy or litter).
#[derive(Clone, Copy, Debug, Default)]
pub struct InterceptionParams {
    pub k_smax: f64,
    pub k_dead: f64,
}

/// Hydraulic redistribution capability parameters (absent unless `enabled`).
#[derive(Clone, Copy, Debug, Default)]
pub struct HydRedParams {
    pub enabled: bool,
    pub max_cond_root: f64,
    pub swp50: f64,
    pub shape_cond: f64,
}

/// CO2 biomass/WUE multiplier coefficients, `M = c1 * ppm ^ c2`.
#[derive(Clone, Copy, Debug)]
pub struct Co2Coeffs {
    pub bio_c1: f64,
    pub bio_c2: f64,
    pub wue_c1: f64,
    pub wue_c2: f64,
}

impl Default for Co2Coeffs {
    fn default() -> Self {
        Self {
            bio_c1: 1.0,
            bio_c2: 0.0,
            wue_c1: 1.0,
            wue_c2: 0.0,
        }
    }
}

impl Co2Coeffs {
    pub fn bio_multiplier(&self, ppm: f64) -> f64 {
        self.bio_c1 * ppm.powf(self.bio_c2)
    }

    pub fn wue_multiplier(&self, ppm: f64) -> f64 {
        self.wue_c1 * ppm.powf(self.wue_c2)
    }
}

/// The four `watrate` curve parameters: a Parton-1978 tangent-inflection
/// shape applied to `shift - swp`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurveParams {
    pub shift: f64,
    pub shape: f64,
    pub inflec: f64,
    pub range: f64,
}

/// Monthly inputs (Jan..Dec) for one vegetation type, before interpolation to
/// daily resolution.
#[derive(Clone, Debug)]
pub struct MonthlyVegInputs {
    pub litter: [f64; 12],
    pub biomass: [f64; 12],
    pub pct_live: [f64; 12],
    pub lai_conv: [f64; 12],
}

/// One vegetation type's full parameter set plus its daily-interpolated
/// state. The daily arrays hold 366 slots (leap-safe).
#[derive(Clone, Debug)]
pub struct VegType {
    pub kind: VegKind,
    pub cover: f64,
    pub albedo: f64,
    pub monthly: MonthlyVegInputs,
    pub canopy_height: CanopyHeight,
    pub canopy_intercept: InterceptionParams,
    pub litter_intercept_k_smax: f64,
    pub est_lai_param: f64,
    pub bare_soil_evap_cutoff: f64,
    pub shade_scale: f64,
    pub shade_deadmax: f64,
    pub shade_xinflex: f64,
    pub shade_slope: f64,
    pub shade_yinflex: f64,
    pub shade_range: f64,
    pub hydred: HydRedParams,
    pub crit_swp_bar: f64,
    pub co2: Co2Coeffs,
    pub es_param_limit: f64,
    /// Bare-soil-evaporation `watrate` curve (litter-covered path).
    pub watrate_bs: CurveParams,
    /// Transpiration `watrate` curve.
    pub watrate_t: CurveParams,

    /// Daily-interpolated arrays, 366 slots, CO2-biomass-multiplier applied.
    pub daily_litter: Vec<f64>,
    pub daily_biomass: Vec<f64>,
    pub daily_pct_live: Vec<f64>,
    pub daily_lai_conv: Vec<f64>,

    /// Carries across days; only reset on a site-level "reset each year".
    pub s_veg: f64,
    pub s_lit: f64,
}

const DAYS_IN_MONTH_NONLEAP: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

fn interpolate_monthly_to_daily(monthly: &[f64; 12], co2_mult: Option<f64>) -> Vec<f64> {
    // Centered-on-midmonth linear interpolation, matching the source's
    // monthly->daily production convention; 366 slots, index 0 unused so
    // that day-of-year (1-based) indexes directly.
    let mut daily = vec![0.0_f64; 367];
    let mut midpoints = [0.0_f64; 12];
    let mut acc = 0.0;
    for (m, days) in DAYS_IN_MONTH_NONLEAP.iter().enumerate() {
        midpoints[m] = acc + (*days as f64) / 2.0;
        acc += *days as f64;
    }
    for doy in 1..=366u32 {
        let d = ((doy - 1) % 365) as f64;
        let (lo, hi) = {
            let mut lo = 11usize;
            let mut hi = 0usize;
            for m in 0..12 {
                if midpoints[m] <= d {
                    lo = m;
                }
            }
            hi = (lo + 1) % 12;
            (lo, hi)
        };
        let (t_lo, t_hi) = (midpoints[lo], if hi == 0 { 365.0 + midpoints[hi] } else { midpoints[hi] });
        let span = (t_hi - t_lo).max(1e-9);
        let frac = ((d - t_lo).rem_euclid(365.0)) / span;
        let frac = frac.clamp(0.0, 1.0);
        let value = monthly[lo] + frac * (monthly[hi] - monthly[lo]);
        let value = match co2_mult {
            Some(m) => value * m,
            None => value,
        };
        daily[doy as usize] = value;
    }
    daily
}

impl VegType {
    /// Interpolate all four monthly series to daily resolution for one
    /// simulated year, applying the CO2 biomass multiplier per 4.9: trees
    /// scale `pct_live` instead of `biomass`.
    pub fn interpolate_daily(&mut self, co2_ppm: f64) {
        let m_bio = self.co2.bio_multiplier(co2_ppm);
        self.daily_litter = interpolate_monthly_to_daily(&self.monthly.litter, None);
        self.daily_lai_conv = interpolate_monthly_to_daily(&self.monthly.lai_conv, None);
        match self.kind {
            VegKind::Trees => {
                self.daily_biomass = interpolate_monthly_to_daily(&self.monthly.biomass, None);
                self.daily_pct_live = interpolate_monthly_to_daily(&self.monthly.pct_live, Some(m_bio));
            }
            _ => {
                self.daily_biomass = interpolate_monthly_to_daily(&self.monthly.biomass, Some(m_bio));
                self.daily_pct_live = interpolate_monthly_to_daily(&self.monthly.pct_live, None);
            }
        }
    }

    pub fn wue_multiplier(&self, co2_ppm: f64) -> f64 {
        self.co2.wue_multiplier(co2_ppm)
    }

    pub fn lai_live_today(&self, doy: u32) -> f64 {
        let biomass = self.daily_biomass[doy as usize];
        let pct_live = self.daily_pct_live[doy as usize] / 100.0;
        let lai_conv = self.daily_lai_conv[doy as usize];
        if lai_conv <= 0.0 {
            0.0
        } else {
            (biomass * pct_live) / lai_conv
        }
    }

    pub fn canopy_height_today(&self, doy: u32) -> f64 {
        self.canopy_height.height_for_biomass(self.daily_biomass[doy as usize])
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.cover) {
            return Err(SimError::ConfigError {
                reason: format!("veg cover out of [0,1]: {}", self.cover),
            });
        }
        if self.hydred.enabled && self.hydred.max_cond_root <= 0.0 {
            return Err(SimError::ConfigError {
                reason: "hydraulic redistribution enabled with non-positive max_cond_root".into(),
            });
        }
        Ok(())
    }
}

/// Normalize the four cover fractions plus bare ground so they sum to 1,
/// per the Layer/VegType invariant in the data model.
pub fn normalize_cover(veg: &mut [VegType; N_VEG], bare_ground: &mut f64) {
    let total: f64 = veg.iter().map(|v| v.cover).sum::<f64>() + *bare_ground;
    if total <= 0.0 {
        *bare_ground = 1.0;
        return;
    }
    if (total - 1.0).abs() > 1e-6 {
        for v in veg.iter_mut() {
            v.cover /= total;
        }
        *bare_ground /= total;
    }
}
