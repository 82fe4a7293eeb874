#![deny(warnings)]

//! Headless CLI: seeds a farm simulation and replays ticks on an
//! accelerated clock, printing a KPI summary.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use farm_core::CropCatalog;
use farm_engine::{PollingController, SimConfig};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    ticks: u32,
    seed: Option<u64>,
    scenario: Option<String>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        ticks: 10,
        seed: None,
        scenario: None,
        json: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--ticks" => {
                if let Some(v) = it.next().and_then(|s| s.parse().ok()) {
                    args.ticks = v;
                }
            }
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--scenario" => args.scenario = it.next(),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.scenario {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading scenario {path}"))?;
            serde_yaml::from_str(&text).with_context(|| format!("parsing scenario {path}"))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    Ok(config)
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    let config = load_config(&args)?;
    info!(ticks = args.ticks, seed = config.rng_seed, "starting agrisim");

    let catalog = CropCatalog::standard();
    farm_core::validate_catalog(&catalog)?;
    let n_crops = catalog.len();
    let total_area: f64 = catalog.iter().map(|(_, def)| def.area_ha).sum();

    let start = Utc::now();
    let interval = Duration::milliseconds(config.update_interval_ms as i64);
    let mut controller = PollingController::new_at(config, catalog, start)?;

    // Accelerated clock: advance one interval per iteration instead of
    // sleeping through real time.
    let mut now = start;
    let mut committed = 0u32;
    for _ in 0..args.ticks {
        now += interval;
        if controller.poll_at(now) {
            committed += 1;
        } else if let Some(err) = controller.last_error() {
            info!(err, "tick skipped");
        }
    }

    println!(
        "Farm OK | crops: {} | area: {} ha | season: {}",
        n_crops,
        total_area,
        controller.season()
    );

    let current = controller
        .current_data_point()
        .context("no data point committed")?;
    let k = &current.kpis;
    println!(
        "KPI | ticks: {} | history: {} | revenue: {:.0} | production: {:.2} t | efficiency: {}% | growth: {:.1}% | risk: {} | profit/ha: {:.0}",
        committed,
        controller.history_len(),
        k.total_revenue,
        k.total_production_t,
        k.average_efficiency_pct,
        k.average_growth_pct,
        k.weather_risk,
        k.profit_per_hectare,
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(current)?);
    }

    Ok(())
}
