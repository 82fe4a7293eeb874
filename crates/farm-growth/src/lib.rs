#![deny(warnings)]

//! Growth, production, and KPI models for the farm simulation.
//!
//! This crate provides validated pure helpers for:
//! - Stress-factor economics against a crop's optimal bands
//! - Stateless growth stepping with production/revenue variability
//! - Farm-wide KPI reduction including a composite weather-risk score
//!
//! Stepping a crop never mutates growth state; the caller commits the
//! returned growth percentage for the next tick.

use chrono::Datelike;
use farm_core::{
    gaussian, round_dp, CropDefinition, CropId, CropStage, EnvironmentalSample, KpiSnapshot,
    ProductionSample,
};
use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;

/// Stress multipliers never drop below this floor; growth slows under
/// adverse conditions but never halts entirely from a single factor.
const STRESS_FLOOR: f64 = 0.2;

/// Rainfall (mm) that fully covers a tick's water demand.
const FULL_WATER_MM: f64 = 5.0;

/// Errors produced by KPI aggregation.
#[derive(Debug, Error, PartialEq)]
pub enum KpiError {
    /// Aggregation over zero crops; a contract violation rather than a
    /// runtime condition, since catalogs are validated non-empty.
    #[error("cannot aggregate KPIs over an empty crop set")]
    EmptyCropSet,
}

/// Stress multiplier in [0.2, 1.0] for `value` against an optimal band.
///
/// 1.0 inside the band; outside it, decays linearly with the distance beyond
/// the nearer bound measured in units of half the band width.
///
/// Example:
/// stress_factor(20.0, 15.0, 25.0) == 1.0
/// stress_factor(10.0, 15.0, 25.0) == 0.4 // one full tolerance width below
pub fn stress_factor(value: f64, optimal_min: f64, optimal_max: f64) -> f64 {
    if value >= optimal_min && value <= optimal_max {
        return 1.0;
    }
    let tolerance = (optimal_max - optimal_min) * 0.5;
    let distance = (value - optimal_min).abs().min((value - optimal_max).abs());
    (1.0 - (distance / tolerance) * 0.6).max(STRESS_FLOOR)
}

/// Fraction of a tick's water demand met by rainfall.
///
/// Example:
/// water_availability(2.5) == 0.5
/// water_availability(40.0) == 1.0
pub fn water_availability(rainfall_mm: f64) -> f64 {
    (rainfall_mm / FULL_WATER_MM).min(1.0)
}

/// Growth added this tick in percentage points, before accumulation.
///
/// Scales the crop's nominal daily progress (100 / cycle days) by the
/// temperature and humidity stress factors and the water availability term.
pub fn growth_increment(def: &CropDefinition, env: &EnvironmentalSample) -> f64 {
    let temp_stress = stress_factor(
        env.temperature_c,
        def.optimal_temp_c.min,
        def.optimal_temp_c.max,
    );
    let humidity_stress = stress_factor(
        env.humidity_pct,
        def.optimal_humidity_pct.min,
        def.optimal_humidity_pct.max,
    );
    let water = water_availability(env.rainfall_mm);
    let base = 100.0 / def.growth_cycle_days as f64;
    (base * temp_stress * humidity_stress * (0.7 + 0.3 * water)).max(0.0)
}

/// Stage label for cumulative growth during the given 1-based month.
pub fn crop_stage(growth_pct: f64, def: &CropDefinition, month: u32) -> CropStage {
    if growth_pct < 25.0 {
        CropStage::Planting
    } else if growth_pct < 50.0 {
        CropStage::Vegetative
    } else if growth_pct < 75.0 {
        CropStage::Flowering
    } else if growth_pct < 95.0 {
        CropStage::Maturation
    } else if month == def.harvest_month {
        CropStage::Harvest
    } else {
        CropStage::Completed
    }
}

/// Advance one crop by one tick.
///
/// Pure given the RNG state. The returned sample carries the new cumulative
/// growth; the caller persists it as the prior growth for the next tick.
/// Efficiency is intentionally unclamped and may exceed 100 under favorable
/// variability draws.
pub fn step<R: Rng + ?Sized>(
    def: &CropDefinition,
    env: &EnvironmentalSample,
    prior_growth_pct: f64,
    rng: &mut R,
) -> ProductionSample {
    let increment = growth_increment(def, env);
    let new_growth = (prior_growth_pct + increment).min(100.0);

    let maturity = (new_growth / 100.0).min(1.0);
    let variability = gaussian(rng, 1.0, 0.15);
    let production = (def.avg_yield_t_per_ha * def.area_ha * maturity * variability).max(0.0);

    let market = gaussian(rng, 1.0, 0.10);
    let revenue = production * def.price_per_ton * market;

    let theoretical_max_t = def.avg_yield_t_per_ha * def.area_ha;
    let efficiency_pct = (production / theoretical_max_t * 100.0).round() as u32;

    ProductionSample {
        name: def.name.clone(),
        area_ha: def.area_ha,
        growth_pct: round_dp(new_growth, 1),
        production_t: round_dp(production, 2),
        revenue: revenue.round(),
        efficiency_pct,
        stage: crop_stage(new_growth, def, env.timestamp.month()),
    }
}

/// Banded temperature risk: 0 inside [15, 25] °C, then 20/50/80 as the
/// reading strays by 5, 10, or more degrees.
pub fn temperature_risk(temperature_c: f64) -> f64 {
    if !(5.0..=35.0).contains(&temperature_c) {
        80.0
    } else if !(10.0..=30.0).contains(&temperature_c) {
        50.0
    } else if !(15.0..=25.0).contains(&temperature_c) {
        20.0
    } else {
        0.0
    }
}

/// Banded water stress over the blended index `(2·rainfall + soil) / 3`.
pub fn water_stress(rainfall_mm: f64, soil_moisture_pct: f64) -> f64 {
    let water_index = (rainfall_mm * 2.0 + soil_moisture_pct) / 3.0;
    if water_index < 20.0 {
        90.0
    } else if water_index < 40.0 {
        60.0
    } else if water_index < 60.0 {
        30.0
    } else {
        0.0
    }
}

/// Reduce one tick's production set and environmental reading into
/// farm-wide indicators.
pub fn aggregate(
    production: &BTreeMap<CropId, ProductionSample>,
    env: &EnvironmentalSample,
) -> Result<KpiSnapshot, KpiError> {
    if production.is_empty() {
        return Err(KpiError::EmptyCropSet);
    }
    let n = production.len() as f64;
    let total_area_ha: f64 = production.values().map(|p| p.area_ha).sum();
    let total_revenue: f64 = production.values().map(|p| p.revenue).sum();
    let total_production_t: f64 = production.values().map(|p| p.production_t).sum();
    let avg_efficiency: f64 =
        production.values().map(|p| f64::from(p.efficiency_pct)).sum::<f64>() / n;
    let avg_growth: f64 = production.values().map(|p| p.growth_pct).sum::<f64>() / n;

    let temp_risk = temperature_risk(env.temperature_c);
    let water = water_stress(env.rainfall_mm, env.soil_moisture_pct);
    let weather_risk = ((temp_risk + water) / 2.0).round() as u32;

    Ok(KpiSnapshot {
        total_area_ha,
        total_revenue,
        total_production_t,
        average_efficiency_pct: avg_efficiency.round() as u32,
        average_growth_pct: round_dp(avg_growth, 1),
        weather_risk,
        profit_per_hectare: (total_revenue / total_area_ha).round(),
        productivity_index: round_dp(total_production_t / total_area_ha, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use farm_core::CropCatalog;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn env(temperature_c: f64, humidity_pct: f64, rainfall_mm: f64) -> EnvironmentalSample {
        EnvironmentalSample {
            timestamp: Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap(),
            temperature_c,
            humidity_pct,
            rainfall_mm,
            wind_speed_kmh: 10.0,
            uv_index: 6.0,
            soil_moisture_pct: 55.0,
            pressure_hpa: 1013.0,
        }
    }

    fn wheat() -> CropDefinition {
        CropCatalog::standard()
            .get(&CropId::new("wheat"))
            .unwrap()
            .clone()
    }

    #[test]
    fn stress_is_one_inside_and_at_the_bounds() {
        assert_eq!(stress_factor(15.0, 15.0, 25.0), 1.0);
        assert_eq!(stress_factor(25.0, 15.0, 25.0), 1.0);
        assert_eq!(stress_factor(20.0, 15.0, 25.0), 1.0);
    }

    #[test]
    fn stress_decays_to_exactly_point_four_one_width_out() {
        // One full tolerance width (half the range) below the minimum.
        assert_eq!(stress_factor(10.0, 15.0, 25.0), 0.4);
        assert_eq!(stress_factor(30.0, 15.0, 25.0), 0.4);
    }

    #[test]
    fn stress_never_drops_below_the_floor() {
        assert_eq!(stress_factor(100.0, 15.0, 25.0), 0.2);
        assert_eq!(stress_factor(-100.0, 15.0, 25.0), 0.2);
    }

    #[test]
    fn water_availability_saturates_at_one() {
        assert_eq!(water_availability(0.0), 0.0);
        assert_eq!(water_availability(2.5), 0.5);
        assert_eq!(water_availability(40.0), 1.0);
    }

    #[test]
    fn dry_optimal_day_grows_at_seventy_percent_pace() {
        // Wheat: 240-day cycle, conditions inside both bands, no rain.
        let increment = growth_increment(&wheat(), &env(20.0, 70.0, 0.0));
        assert!((increment - 100.0 / 240.0 * 0.7).abs() < 1e-12);
    }

    #[test]
    fn stage_bands() {
        let def = wheat(); // harvest month 7
        assert_eq!(crop_stage(0.0, &def, 7), CropStage::Planting);
        assert_eq!(crop_stage(24.9, &def, 7), CropStage::Planting);
        assert_eq!(crop_stage(25.0, &def, 7), CropStage::Vegetative);
        assert_eq!(crop_stage(74.9, &def, 7), CropStage::Flowering);
        assert_eq!(crop_stage(94.9, &def, 7), CropStage::Maturation);
        assert_eq!(crop_stage(95.0, &def, 7), CropStage::Harvest);
        assert_eq!(crop_stage(100.0, &def, 3), CropStage::Completed);
    }

    #[test]
    fn step_is_deterministic_per_seed() {
        let def = wheat();
        let sample = env(22.0, 65.0, 3.0);
        let mut a = ChaCha8Rng::seed_from_u64(17);
        let mut b = ChaCha8Rng::seed_from_u64(17);
        assert_eq!(step(&def, &sample, 40.0, &mut a), step(&def, &sample, 40.0, &mut b));
    }

    #[test]
    fn efficiency_can_exceed_one_hundred() {
        let def = wheat();
        let sample = env(20.0, 70.0, 5.0);
        let exceeded = (0..100).any(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            step(&def, &sample, 100.0, &mut rng).efficiency_pct > 100
        });
        assert!(exceeded, "no favorable variability draw in 100 seeds");
    }

    #[test]
    fn kpi_reference_scenario() {
        let crops = [("a", 25.0, 1000.0), ("b", 20.0, 2000.0), ("c", 5.0, 3000.0), ("d", 15.0, 4000.0)];
        let mut production = BTreeMap::new();
        for (id, area_ha, revenue) in crops {
            production.insert(
                CropId::new(id),
                ProductionSample {
                    name: id.to_uppercase(),
                    area_ha,
                    growth_pct: 50.0,
                    production_t: 10.0,
                    revenue,
                    efficiency_pct: 90,
                    stage: CropStage::Flowering,
                },
            );
        }
        let kpis = aggregate(&production, &env(20.0, 70.0, 2.0)).unwrap();
        assert_eq!(kpis.total_area_ha, 65.0);
        assert_eq!(kpis.total_revenue, 10_000.0);
        assert_eq!(kpis.profit_per_hectare, 154.0);
        assert_eq!(kpis.average_efficiency_pct, 90);
        assert_eq!(kpis.average_growth_pct, 50.0);
    }

    #[test]
    fn weather_risk_reference_scenario() {
        assert_eq!(temperature_risk(40.0), 80.0);
        assert_eq!(water_stress(0.0, 15.0), 90.0);
        let mut sample = env(40.0, 30.0, 0.0);
        sample.soil_moisture_pct = 15.0;
        let mut production = BTreeMap::new();
        production.insert(
            CropId::new("wheat"),
            ProductionSample {
                name: "Wheat".to_string(),
                area_ha: 25.0,
                growth_pct: 10.0,
                production_t: 1.0,
                revenue: 100.0,
                efficiency_pct: 10,
                stage: CropStage::Planting,
            },
        );
        let kpis = aggregate(&production, &sample).unwrap();
        assert_eq!(kpis.weather_risk, 85);
    }

    #[test]
    fn temperature_risk_bands() {
        assert_eq!(temperature_risk(20.0), 0.0);
        assert_eq!(temperature_risk(14.9), 20.0);
        assert_eq!(temperature_risk(27.0), 20.0);
        assert_eq!(temperature_risk(9.0), 50.0);
        assert_eq!(temperature_risk(31.0), 50.0);
        assert_eq!(temperature_risk(4.0), 80.0);
        assert_eq!(temperature_risk(36.0), 80.0);
    }

    #[test]
    fn empty_crop_set_is_a_contract_violation() {
        let production = BTreeMap::new();
        assert_eq!(
            aggregate(&production, &env(20.0, 70.0, 0.0)),
            Err(KpiError::EmptyCropSet)
        );
    }

    proptest! {
        #[test]
        fn growth_never_regresses_and_never_overshoots(
            seed in any::<u64>(),
            prior_tenths in 0u32..=1000,
            temperature in 0.0f64..45.0,
            humidity in 20.0f64..100.0,
            rainfall in 0.0f64..50.0,
        ) {
            let def = wheat();
            let prior = f64::from(prior_tenths) / 10.0;
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sample = step(&def, &env(temperature, humidity, rainfall), prior, &mut rng);
            prop_assert!(sample.growth_pct >= prior);
            prop_assert!(sample.growth_pct <= 100.0);
        }

        #[test]
        fn stress_stays_in_band(value in -100.0f64..150.0) {
            let s = stress_factor(value, 15.0, 25.0);
            prop_assert!((0.2..=1.0).contains(&s));
        }

        #[test]
        fn production_and_revenue_round_consistently(seed in any::<u64>(), prior in 0.0f64..100.0) {
            let def = wheat();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sample = step(&def, &env(20.0, 70.0, 2.0), prior, &mut rng);
            prop_assert!(sample.production_t >= 0.0);
            prop_assert_eq!(sample.production_t, round_dp(sample.production_t, 2));
            prop_assert_eq!(sample.revenue, sample.revenue.round());
        }
    }
}
