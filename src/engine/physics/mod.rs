// ABOUTME: Physics module organization - interception, percolation, extraction, evapotranspiration,
// ABOUTME: hydraulic redistribution, snow, and soil temperature (C4-C9)

pub mod evapotranspiration;
pub mod extraction;
pub mod hydraulic_redistribution;
pub mod interception;
pub mod percolation;
pub mod snow;
pub mod temperature;

pub use evapotranspiration::{
    es_t_partitioning, pot_soil_evap, pot_soil_evap_avg_swp, pot_soil_evap_bs, pot_transp,
    transp_weighted_avg, watrate,
};
pub use extraction::remove_from_soil;
pub use hydraulic_redistribution::hydraulic_redistribution;
pub use interception::{evaporate_from_pool, intercept_canopy, intercept_litter};
pub use percolation::{infiltrate_water_high, percolate_unsaturated};
pub use snow::{adjust_snow, snow_depth, snow_loss, SnowModelParams, Snowpack, SnowStep};
pub use temperature::{
    daily_min_max, set_frozen_unfrozen, soil_temperature_today, surface_temperature_under_snow,
    TemperatureGrid, ThermalParams, MAX_ST_RGR,
};
