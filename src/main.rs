// ABOUTME: CLI entry point - loads a site config and an optional weather CSV, runs the daily core
// ABOUTME: Falls back to the synthetic seasonal series from applications::cli_demo when no CSV is given

use clap::Parser;

use aridflux::engine::config::SiteConfig;
use aridflux::engine::diagnostics::{CountingSink, WarningEvent, WarningSink};
use aridflux::engine::weather::{ConstantAtmosphere, DailyWeather};
use aridflux::{Site, SimResult};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "aridflux")]
#[command(about = "Point-based, layered ecohydrological soil-water/soil-temperature core")]
struct Args {
    /// Path to a site configuration YAML.
    #[arg(short, long)]
    config: String,

    /// Optional CSV of daily weather: year,doy,t_min,t_max,ppt,co2_ppm.
    /// Without this, a deterministic synthetic seasonal series is used.
    #[arg(long)]
    weather_csv: Option<String>,

    /// Number of days to simulate when no weather CSV is given.
    #[arg(short, long, default_value = "365")]
    days: u32,

    /// Constant PET fed to the demo atmosphere stand-in (cm/day); deriving
    /// PET/solar radiation from real station data is a host collaborator's
    /// responsibility, not this crate's.
    #[arg(long, default_value = "0.3")]
    pet: f64,

    #[arg(long, default_value = "300.0")]
    solar_radiation: f64,

    /// Run this many independent replicas of the same site in parallel and
    /// report only their final AET/PET totals, instead of a single verbose
    /// per-day run. Each replica owns its own `Site`, so no state leaks
    /// between them.
    #[arg(long, default_value = "1")]
    replicas: usize,
}

/// One replica's end-of-run totals.
struct ReplicaSummary {
    replica: usize,
    total_aet: f64,
    total_pet: f64,
    water_balance_warnings: usize,
}

fn run_replica(
    replica: usize,
    def: aridflux::engine::site::SiteDefinition,
    weather_series: &[DailyWeather],
    atmosphere: &ConstantAtmosphere,
) -> SimResult<ReplicaSummary> {
    let mut site = Site::new(def);
    let mut sink = CountingSink::default();
    let mut total_aet = 0.0;
    let mut total_pet = 0.0;
    for weather in weather_series {
        let report = site.step_day(weather, atmosphere, &mut sink)?;
        total_aet += report.aet;
        total_pet += report.pet;
    }
    Ok(ReplicaSummary {
        replica,
        total_aet,
        total_pet,
        water_balance_warnings: sink.water_balance_warnings,
    })
}

struct EprintlnCountingSink {
    counting: CountingSink,
}

impl WarningSink for EprintlnCountingSink {
    fn emit(&mut self, event: WarningEvent) {
        eprintln!("[aridflux] {event}");
        self.counting.emit(event);
    }
}

fn parse_weather_csv(path: &str) -> Result<Vec<DailyWeather>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if lineno == 0 || line.trim().is_empty() {
            continue; // header row
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 6 {
            return Err(format!("weather CSV line {}: expected 6 columns, got {}", lineno + 1, fields.len()).into());
        }
        rows.push(DailyWeather {
            year: fields[0].parse()?,
            doy: fields[1].parse()?,
            t_min: fields[2].parse()?,
            t_max: fields[3].parse()?,
            ppt: fields[4].parse()?,
            cloud_cover_monthly: [0.4; 12],
            wind_speed_monthly: [2.0; 12],
            relative_humidity_monthly: [50.0; 12],
            snow_density_monthly: [150.0; 12],
            rain_events_per_day_monthly: [1.0; 12],
            co2_ppm: fields[5].parse()?,
        });
    }
    Ok(rows)
}

fn synthetic_series(days: u32) -> Vec<DailyWeather> {
    let mut out = Vec::with_capacity(days as usize);
    let mut doy = 1u32;
    let mut year = 0u32;
    for _ in 0..days {
        let phase = std::f64::consts::TAU * ((doy as f64 - 80.0) / 365.0);
        let t_avg = 15.0 + 10.0 * phase.sin();
        let ppt = if doy % 7 == 0 { 0.6 } else { 0.0 };
        out.push(DailyWeather {
            year,
            doy,
            t_min: t_avg - 5.0,
            t_max: t_avg + 5.0,
            ppt,
            cloud_cover_monthly: [0.4; 12],
            wind_speed_monthly: [2.0; 12],
            relative_humidity_monthly: [50.0; 12],
            snow_density_monthly: [150.0; 12],
            rain_events_per_day_monthly: [1.0; 12],
            co2_ppm: 380.0,
        });
        doy += 1;
        if doy > 365 {
            doy = 1;
            year += 1;
        }
    }
    out
}

fn run(args: Args) -> AppResult<()> {
    let cfg = SiteConfig::load_from_file(&args.config)
        .map_err(|e| format!("failed to load site config {}: {e}", args.config))?;
    let (def, load_warnings) = cfg.build()?;
    for w in &load_warnings {
        println!("[load warning] {w}");
    }

    let weather_series = match &args.weather_csv {
        Some(path) => parse_weather_csv(path).map_err(|e| format!("failed to read {path}: {e}"))?,
        None => synthetic_series(args.days),
    };

    let atmosphere = ConstantAtmosphere {
        pet: args.pet,
        solar_radiation: args.solar_radiation,
    };

    if args.replicas > 1 {
        use rayon::prelude::*;

        let summaries: Vec<ReplicaSummary> = (0..args.replicas)
            .into_par_iter()
            .map(|replica| run_replica(replica, def.clone(), &weather_series, &atmosphere))
            .collect::<SimResult<Vec<_>>>()?;

        println!("{:>8} {:>12} {:>12} {:>10}", "replica", "total_aet", "total_pet", "warnings");
        for s in &summaries {
            println!("{:>8} {:>12.3} {:>12.3} {:>10}", s.replica, s.total_aet, s.total_pet, s.water_balance_warnings);
        }
        return Ok(());
    }

    let mut site = Site::new(def);
    let mut sink = EprintlnCountingSink {
        counting: CountingSink::default(),
    };

    println!("{:>5} {:>4} {:>8} {:>8} {:>9} {:>9}", "year", "doy", "pet", "aet", "snowpack", "standing");
    for weather in &weather_series {
        let report = site.step_day(weather, &atmosphere, &mut sink)?;
        println!(
            "{:>5} {:>4} {:>8.3} {:>8.3} {:>9.3} {:>9.3}",
            report.year, report.doy, report.pet, report.aet, report.snowpack, report.standing_water
        );
    }

    println!(
        "\n{} days simulated; {} water-balance warnings, {} normalizations, {} temperature-disabled events",
        weather_series.len(),
        sink.counting.water_balance_warnings,
        sink.counting.normalizations,
        sink.counting.temp_disabled_events
    );
    Ok(())
}

fn main() -> AppResult<()> {
    let args = Args::parse();
    run(args)
}
