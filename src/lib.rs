// ABOUTME: Library interface for the aridflux dryland ecohydrology engine
// ABOUTME: Exposes a clean public API for the per-day soil-water/soil-temperature core

pub mod engine;

pub use engine::config::SiteConfig;
pub use engine::driver::Site;
pub use engine::error::{SimError, SimResult};
pub use engine::weather::DailyWeather;
