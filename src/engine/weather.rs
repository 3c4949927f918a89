// ABOUTME: Daily weather inputs and the external atmospheric/PET contract
// ABOUTME: PET and solar radiation are out of scope here; callers supply them through AtmosphereProvider

/// One day's driving weather, as handed to the daily driver (6 "Input to
/// daily driver").
#[derive(Clone, Debug)]
pub struct DailyWeather {
    pub year: u32,
    pub doy: u32,
    pub t_min: f64,
    pub t_max: f64,
    pub ppt: f64,
    pub cloud_cover_monthly: [f64; 12],
    pub wind_speed_monthly: [f64; 12],
    pub relative_humidity_monthly: [f64; 12],
    pub snow_density_monthly: [f64; 12],
    pub rain_events_per_day_monthly: [f64; 12],
    pub co2_ppm: f64,
}

impl DailyWeather {
    pub fn t_avg(&self) -> f64 {
        (self.t_min + self.t_max) / 2.0
    }

    fn month_index(&self) -> usize {
        // Non-leap-aligned month lookup; doy is 1-based.
        const CUM: [u32; 12] = [31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];
        let d = (self.doy - 1) % 365;
        CUM.iter().position(|c| d < *c).unwrap_or(11)
    }

    pub fn cloud_cover(&self) -> f64 {
        self.cloud_cover_monthly[self.month_index()]
    }

    pub fn wind_speed(&self) -> f64 {
        self.wind_speed_monthly[self.month_index()]
    }

    pub fn relative_humidity(&self) -> f64 {
        self.relative_humidity_monthly[self.month_index()]
    }

    pub fn snow_density(&self) -> f64 {
        self.snow_density_monthly[self.month_index()]
    }

    pub fn rain_events_per_day(&self) -> f64 {
        self.rain_events_per_day_monthly[self.month_index()]
    }
}

/// Horizontal/tilted, overhead/ground solar radiation breakdown (6, "Output
/// per day": `H_oh`, `H_ot`, `H_gh`, `H_gt`). The core only ever forwards
/// these from the atmosphere collaborator into `DayReport`; it does not
/// derive them itself (1, "Out of scope": solar radiation formulas).
#[derive(Clone, Copy, Debug, Default)]
pub struct SolarRadiationComponents {
    pub h_oh: f64,
    pub h_ot: f64,
    pub h_gh: f64,
    pub h_gt: f64,
}

/// Potential evapotranspiration and solar radiation, contracted out to a
/// host-supplied collaborator per 1/6 ("PET and solar radiation formulas
/// ... treated as a pure function called with known inputs").
pub trait AtmosphereProvider {
    fn potential_evapotranspiration(&self, weather: &DailyWeather) -> f64;
    fn solar_radiation(&self, weather: &DailyWeather) -> f64;

    /// Defaults to copying the scalar `solar_radiation` into all four
    /// components; a host with a real radiation model overrides this.
    fn solar_radiation_components(&self, weather: &DailyWeather) -> SolarRadiationComponents {
        let h = self.solar_radiation(weather);
        SolarRadiationComponents {
            h_oh: h,
            h_ot: h,
            h_gh: h,
            h_gt: h,
        }
    }
}

/// A fixed-value stand-in, useful for tests and for the CLI demo where a
/// full radiation model is out of scope.
pub struct ConstantAtmosphere {
    pub pet: f64,
    pub solar_radiation: f64,
}

impl AtmosphereProvider for ConstantAtmosphere {
    fn potential_evapotranspiration(&self, _weather: &DailyWeather) -> f64 {
        self.pet
    }

    fn solar_radiation(&self, _weather: &DailyWeather) -> f64 {
        self.solar_radiation
    }
}

/// Optional per-day override of SWC from an external source (6, "Historical
/// SWC override"). A no-op for any (year, doy) the host hasn't supplied data for.
#[derive(Clone, Copy, Debug)]
pub enum SwcOverrideMode {
    Average,
    StdErr { stderr: f64 },
}

#[derive(Clone, Debug, Default)]
pub struct HistoricalSwcOverride {
    entries: std::collections::HashMap<(u32, u32), Vec<f64>>,
}

impl HistoricalSwcOverride {
    pub fn insert(&mut self, year: u32, doy: u32, per_layer_swc: Vec<f64>) {
        self.entries.insert((year, doy), per_layer_swc);
    }

    pub fn get(&self, year: u32, doy: u32) -> Option<&[f64]> {
        self.entries.get(&(year, doy)).map(|v| v.as_slice())
    }

    pub fn apply(
        &self,
        year: u32,
        doy: u32,
        layer_id: usize,
        swc_today: f64,
        mode: SwcOverrideMode,
    ) -> f64 {
        let Some(values) = self.get(year, doy) else {
            return swc_today;
        };
        let Some(host_value) = values.get(layer_id).copied() else {
            return swc_today;
        };
        match mode {
            SwcOverrideMode::Average => (swc_today + host_value) / 2.0,
            SwcOverrideMode::StdErr { stderr } => {
                swc_today.clamp(host_value - stderr, host_value + stderr)
            }
        }
    }
}
