// ABOUTME: Snow accumulation, melt, sublimation, and depth - SWAT2K-style routines
// ABOUTME: Precedes the rest of the daily flow step; today's Snowpack carries the smoothed snow temperature

/// Scalar snowpack state. `internal_temp` is an exponentially-smoothed
/// proxy for snow-surface temperature, carried across days.
#[derive(Clone, Copy, Debug)]
pub struct Snowpack {
    pub swe_cm: f64,
    pub internal_temp: f64,
}

impl Default for Snowpack {
    fn default() -> Self {
        Self {
            swe_cm: 0.0,
            internal_temp: 0.0,
        }
    }
}

pub struct SnowModelParams {
    pub tmin_accu: f64,
    pub tmax_crit: f64,
    pub lambda: f64,
    pub rmelt_min: f64,
    pub rmelt_max: f64,
    /// Fraction of the snowpack exposed for melt; the source carries this
    /// as a hardcoded constant (1.0) but it is exposed here as a parameter.
    pub snow_cover_fraction: f64,
}

/// Result of partitioning today's precipitation into rain and snow, and
/// advancing the snowpack by one day's accumulation and melt.
pub struct SnowStep {
    pub rain: f64,
    pub snow_accum: f64,
    pub snowmelt: f64,
}

/// Split `ppt` into rain/snow by mean air temperature, accumulate, then melt
/// using the SWAT2K sinusoidal `Rmelt` plus smoothed snow temperature.
pub fn adjust_snow(snowpack: &mut Snowpack, t_min: f64, t_max: f64, ppt: f64, doy: u32, params: &SnowModelParams) -> SnowStep {
    let t_avg = (t_min + t_max) / 2.0;

    let snow_accum = if t_avg <= params.tmin_accu { ppt } else { 0.0 };
    let rain = (ppt - snow_accum).max(0.0);
    snowpack.swe_cm += snow_accum;

    let rmelt = (params.rmelt_max + params.rmelt_min) / 2.0
        + ((doy as f64 - 81.0) / 58.09).sin() * (params.rmelt_max - params.rmelt_min) / 2.0;
    snowpack.internal_temp = snowpack.internal_temp * (1.0 - params.lambda) + t_avg * params.lambda;

    let snowmelt_potential = if snowpack.internal_temp > params.tmax_crit {
        (rmelt * params.snow_cover_fraction * ((snowpack.internal_temp + t_max) / 2.0 - params.tmax_crit)).max(0.0)
    } else {
        0.0
    };

    let snowmelt = if snowpack.swe_cm > 0.0 {
        let melt = snowmelt_potential.min(snowpack.swe_cm).max(0.0);
        snowpack.swe_cm = (snowpack.swe_cm - melt).max(0.0);
        melt
    } else {
        0.0
    };

    SnowStep {
        rain,
        snow_accum: snow_accum.max(0.0),
        snowmelt,
    }
}

/// Sublimation-and-other-losses from the snowpack, capped by `loss_fraction
/// * pet` (default 0.5, matching the original's hardcoded `cov_soil`; exposed
/// here as a tunable parameter instead).
pub fn snow_loss(snowpack: &mut Snowpack, pet: f64, loss_fraction: f64) -> f64 {
    if snowpack.swe_cm > 0.0 {
        let loss = (loss_fraction * pet).min(snowpack.swe_cm).max(0.0);
        snowpack.swe_cm = (snowpack.swe_cm - loss).max(0.0);
        loss
    } else {
        0.0
    }
}

/// Snow depth in cm from water-equivalent (cm) and density (kg/m3).
pub fn snow_depth(swe_cm: f64, snow_density: f64) -> f64 {
    if snow_density > 0.0 {
        swe_cm / snow_density * 1000.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SnowModelParams {
        SnowModelParams {
            tmin_accu: 0.0,
            tmax_crit: 1.0,
            lambda: 0.1,
            rmelt_min: 1.0,
            rmelt_max: 3.0,
            snow_cover_fraction: 1.0,
        }
    }

    #[test]
    fn cold_day_accumulates_all_ppt_as_snow() {
        let mut pack = Snowpack::default();
        let step = adjust_snow(&mut pack, -5.0, -1.0, 1.0, 10, &params());
        assert_eq!(step.rain, 0.0);
        assert_eq!(step.snow_accum, 1.0);
        assert_eq!(pack.swe_cm, 1.0);
    }

    #[test]
    fn warm_day_is_all_rain() {
        let mut pack = Snowpack::default();
        let step = adjust_snow(&mut pack, 10.0, 20.0, 2.0, 180, &params());
        assert_eq!(step.rain, 2.0);
        assert_eq!(step.snow_accum, 0.0);
    }

    #[test]
    fn snow_depth_zero_density_is_safe() {
        assert_eq!(snow_depth(5.0, 0.0), 0.0);
    }
}
