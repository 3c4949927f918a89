// ABOUTME: Error taxonomy for the soil-water/soil-temperature core
// ABOUTME: Fatal kinds stop a day or a load; warnings flow through diagnostics::WarningEvent instead

use std::fmt;

/// Fatal error kinds the core can raise. Warnings (`WaterBalanceWarning`,
/// `Normalization`) are not here - they never stop the simulation and are
/// reported through `diagnostics::WarningEvent` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Invalid layer properties, SWRC parameters, region structure, or an
    /// incompatible SWRC/PTF pairing. Raised at load time; fatal.
    ConfigError { reason: String },

    /// `SWC -> SWP` produced an invalid intermediate (a zero or NaN power).
    /// Fatal for the day it occurs on.
    RetentionDomainError { layer_id: usize, reason: String },

    /// Hydraulic redistribution's iterative feasibility pass could not
    /// respect `swc_min` within the allotted number of passes.
    HydRedInfeasible { year: u32, doy: u32, layer_id: usize },

    /// Soil temperature diffusion failed its stability test below a 90
    /// minute sub-timestep, or a node exceeded +-100 degC.
    TempUnstable { year: u32, doy: u32 },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::ConfigError { reason } => write!(f, "config error: {reason}"),
            SimError::RetentionDomainError { layer_id, reason } => {
                write!(f, "retention domain error in layer {layer_id}: {reason}")
            }
            SimError::HydRedInfeasible {
                year,
                doy,
                layer_id,
            } => write!(
                f,
                "hydraulic redistribution infeasible at layer {layer_id} (year {year}, doy {doy})"
            ),
            SimError::TempUnstable { year, doy } => {
                write!(f, "soil temperature unstable (year {year}, doy {doy})")
            }
        }
    }
}

impl std::error::Error for SimError {}

pub type SimResult<T> = Result<T, SimError>;
