// ABOUTME: Warning taxonomy and host-supplied sink for non-fatal diagnostics
// ABOUTME: Water-balance checks, coefficient normalization, and degraded-mode notices flow through here

/// Tolerances and defaults used by the daily water-balance assertions (4.3)
/// and the soil-temperature stability check (4.8).
pub mod safety_parameters {
    /// Default tolerance for `AET <= PET + eps` and the per-layer/column
    /// conservation checks.
    pub const WATER_BALANCE_TOLERANCE_CM: f64 = 1e-9;

    /// Tolerance used for `Sum evap_coeff ~= 1` / `Sum transp_coeff[v] ~= 1`.
    pub const NORMALIZATION_TOLERANCE: f64 = 1e-4;

    /// Tolerance for hydraulic redistribution's `Sum hydred[v] ~= 0`.
    pub const HYDRED_CONSERVATION_TOLERANCE_CM: f64 = 1e-9;

    /// Sub-timestep floor below which soil temperature diffusion gives up
    /// for the day (4.8: "below 90 min").
    pub const MIN_TEMP_SUBSTEP_SECONDS: f64 = 90.0 * 60.0;

    /// Hard bound past which a regression-grid node is considered exploded.
    pub const TEMP_EXPLOSION_BOUND_C: f64 = 100.0;
}

/// A non-fatal event worth surfacing to the host. None of these stop the
/// simulation; `error::SimError` is reserved for that.
#[derive(Clone, Debug, PartialEq)]
pub enum WarningEvent {
    /// One of the 4.3 water-balance assertions missed its tolerance.
    WaterBalanceWarning {
        year: u32,
        doy: u32,
        check: &'static str,
        actual: f64,
        expected: f64,
        tolerance: f64,
    },
    /// A coefficient vector was not exactly normalized at load time and was
    /// silently rescaled.
    Normalization { what: String, pre: f64, post: f64 },
    /// Soil temperature diffusion failed its stability test; temperature
    /// computation is now permanently disabled for the remainder of the run.
    TempDisabled { year: u32, doy: u32 },
    /// The temperature grid spacing/depth inputs were invalid in a
    /// recoverable way (not `ConfigError`-fatal) and were reset to defaults.
    TempGridDefaultsReset { requested_depth: f64, requested_spacing: f64 },
}

impl std::fmt::Display for WarningEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningEvent::WaterBalanceWarning {
                year,
                doy,
                check,
                actual,
                expected,
                tolerance,
            } => write!(
                f,
                "water balance warning [{check}] at year {year} doy {doy}: actual={actual} expected={expected} tolerance={tolerance}"
            ),
            WarningEvent::Normalization { what, pre, post } => {
                write!(f, "normalized {what}: {pre} -> {post}")
            }
            WarningEvent::TempDisabled { year, doy } => write!(
                f,
                "soil temperature diffusion unstable at year {year} doy {doy}; disabled for remainder of run"
            ),
            WarningEvent::TempGridDefaultsReset {
                requested_depth,
                requested_spacing,
            } => write!(
                f,
                "temperature grid depth={requested_depth} spacing={requested_spacing} invalid, reset to defaults (180, 15)"
            ),
        }
    }
}

/// Capability a host passes into `step_day` to receive warnings. The core
/// never knows about files, stdout, or logging frameworks directly.
pub trait WarningSink {
    fn emit(&mut self, event: WarningEvent);
}

/// Default sink: prints to stderr, same as a host that hasn't wired up
/// anything fancier yet.
#[derive(Default)]
pub struct EprintlnSink;

impl WarningSink for EprintlnSink {
    fn emit(&mut self, event: WarningEvent) {
        eprintln!("[aridflux] {event}");
    }
}

/// A counting sink useful for tests and for the end-of-run summary: tallies
/// warnings by kind rather than acting on them immediately.
#[derive(Default, Debug, Clone)]
pub struct CountingSink {
    pub water_balance_warnings: usize,
    pub normalizations: usize,
    pub temp_disabled_events: usize,
    pub temp_grid_resets: usize,
    pub events: Vec<WarningEvent>,
}

impl WarningSink for CountingSink {
    fn emit(&mut self, event: WarningEvent) {
        match &event {
            WarningEvent::WaterBalanceWarning { .. } => self.water_balance_warnings += 1,
            WarningEvent::Normalization { .. } => self.normalizations += 1,
            WarningEvent::TempDisabled { .. } => self.temp_disabled_events += 1,
            WarningEvent::TempGridDefaultsReset { .. } => self.temp_grid_resets += 1,
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_sink_tallies_by_kind() {
        let mut sink = CountingSink::default();
        sink.emit(WarningEvent::Normalization {
            what: "evap_coeff".into(),
            pre: 0.98,
            post: 1.0,
        });
        sink.emit(WarningEvent::WaterBalanceWarning {
            year: 1,
            doy: 5,
            check: "AET<=PET",
            actual: 1.2,
            expected: 1.0,
            tolerance: 1e-9,
        });
        assert_eq!(sink.normalizations, 1);
        assert_eq!(sink.water_balance_warnings, 1);
        assert_eq!(sink.events.len(), 2);
    }
}
