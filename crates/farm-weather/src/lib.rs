#![deny(warnings)]

//! Environmental sampling for the farm simulation.
//!
//! One synthetic weather reading per tick, keyed to season and hour-of-day
//! with Gaussian noise drawn from a caller-provided RNG.

use chrono::{DateTime, Datelike, Timelike, Utc};
use farm_core::{gaussian, round_dp, EnvironmentalSample};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Baseline air temperature before seasonal and diurnal adjustment, in °C.
const BASE_TEMPERATURE_C: f64 = 20.0;
/// Baseline wind speed before seasonal adjustment, in km/h.
const BASE_WIND_KMH: f64 = 10.0;
/// Peak-to-midline swing of the diurnal temperature curve, in °C.
const DIURNAL_AMPLITUDE_C: f64 = 5.0;
/// Scale of the exponential rainfall magnitude draw, in mm.
const RAINFALL_SCALE_MM: f64 = 8.0;
/// Hard cap on a single tick's rainfall, in mm.
const RAINFALL_CAP_MM: f64 = 50.0;

/// Meteorological season, bucketed from 1-based calendar months.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    /// March through May.
    Spring,
    /// June through August.
    Summer,
    /// September through November.
    Autumn,
    /// December through February.
    Winter,
}

impl Season {
    /// Season for a 1-based calendar month.
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    fn temperature_offset_c(self) -> f64 {
        match self {
            Season::Spring => 0.0,
            Season::Summer => 8.0,
            Season::Autumn => -2.0,
            Season::Winter => -12.0,
        }
    }

    fn wind_offset_kmh(self) -> f64 {
        match self {
            Season::Spring => 3.0,
            Season::Summer => -2.0,
            Season::Autumn => 5.0,
            Season::Winter => 8.0,
        }
    }

    fn rain_probability(self) -> f64 {
        match self {
            Season::Spring => 0.30,
            Season::Summer => 0.15,
            Season::Autumn => 0.40,
            Season::Winter => 0.35,
        }
    }

    fn uv_peak(self) -> f64 {
        match self {
            Season::Spring => 6.0,
            Season::Summer => 9.0,
            Season::Autumn => 4.0,
            Season::Winter => 2.0,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        };
        f.write_str(name)
    }
}

/// Sine-shaped daylight factor: 0 at 06:00 and 18:00, 1 at noon, negative
/// overnight. Shared by the temperature and UV curves.
fn daylight_curve(hour: u32) -> f64 {
    ((hour as f64 - 6.0) * std::f64::consts::PI / 12.0).sin()
}

/// Generates one environmental sample per tick.
///
/// The season is fixed at construction from the construction date and is not
/// re-evaluated per tick within a run; a reset builds a fresh model.
#[derive(Clone, Copy, Debug)]
pub struct WeatherModel {
    season: Season,
}

impl WeatherModel {
    /// Model for the season `start` falls into.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::for_season(Season::from_month(start.month()))
    }

    /// Model pinned to an explicit season.
    pub fn for_season(season: Season) -> Self {
        Self { season }
    }

    /// The fixed season this model samples under.
    pub fn season(&self) -> Season {
        self.season
    }

    /// Generate the reading for instant `at`.
    ///
    /// Pure given `at` and the RNG state; all fields except pressure are
    /// rounded to one decimal place.
    pub fn sample<R: Rng + ?Sized>(&self, at: DateTime<Utc>, rng: &mut R) -> EnvironmentalSample {
        let hour = at.hour();
        let temperature = self.temperature_c(hour, rng);
        let humidity = self.humidity_pct(temperature, rng);
        let rainfall = self.rainfall_mm(rng);
        let wind = self.wind_speed_kmh(rng);
        let uv = self.uv_index(hour);
        let soil = soil_moisture_pct(humidity, rng);

        EnvironmentalSample {
            timestamp: at,
            temperature_c: round_dp(temperature, 1),
            humidity_pct: round_dp(humidity, 1),
            rainfall_mm: round_dp(rainfall, 1),
            wind_speed_kmh: round_dp(wind, 1),
            uv_index: round_dp(uv, 1),
            soil_moisture_pct: round_dp(soil, 1),
            pressure_hpa: gaussian(rng, 1013.0, 15.0),
        }
    }

    fn temperature_c<R: Rng + ?Sized>(&self, hour: u32, rng: &mut R) -> f64 {
        let seasonal = BASE_TEMPERATURE_C + self.season.temperature_offset_c();
        let diurnal = daylight_curve(hour) * DIURNAL_AMPLITUDE_C;
        let noise = gaussian(rng, 0.0, 3.0);
        (seasonal + diurnal + noise).max(0.0)
    }

    fn humidity_pct<R: Rng + ?Sized>(&self, temperature_c: f64, rng: &mut R) -> f64 {
        let base = 90.0 - temperature_c * 1.5;
        (base + gaussian(rng, 0.0, 8.0)).clamp(20.0, 100.0)
    }

    fn rainfall_mm<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if rng.gen::<f64>() >= self.season.rain_probability() {
            return 0.0;
        }
        // Exponential-like magnitude; a zero uniform saturates at the cap.
        let u: f64 = rng.gen();
        (-u.ln() * RAINFALL_SCALE_MM).min(RAINFALL_CAP_MM)
    }

    fn wind_speed_kmh<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let mean = BASE_WIND_KMH + self.season.wind_offset_kmh();
        gaussian(rng, mean, 4.0).max(0.0)
    }

    fn uv_index(&self, hour: u32) -> f64 {
        if !(6..=18).contains(&hour) {
            return 0.0;
        }
        (self.season.uv_peak() * daylight_curve(hour)).max(0.0)
    }
}

fn soil_moisture_pct<R: Rng + ?Sized>(humidity_pct: f64, rng: &mut R) -> f64 {
    (humidity_pct - 10.0 + gaussian(rng, 0.0, 5.0)).clamp(20.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use farm_core::validate_sample;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn at(month: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn months_bucket_into_seasons() {
        assert_eq!(Season::from_month(3), Season::Spring);
        assert_eq!(Season::from_month(5), Season::Spring);
        assert_eq!(Season::from_month(6), Season::Summer);
        assert_eq!(Season::from_month(8), Season::Summer);
        assert_eq!(Season::from_month(9), Season::Autumn);
        assert_eq!(Season::from_month(11), Season::Autumn);
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(2), Season::Winter);
    }

    #[test]
    fn season_is_fixed_at_construction() {
        let model = WeatherModel::new(at(7, 12));
        assert_eq!(model.season(), Season::Summer);
        // Sampling a winter date does not re-derive the season.
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let s = model.sample(at(1, 12), &mut rng);
        assert_eq!(s.timestamp, at(1, 12));
    }

    #[test]
    fn uv_is_zero_outside_daylight_hours() {
        let model = WeatherModel::for_season(Season::Summer);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(model.sample(at(7, 3), &mut rng).uv_index, 0.0);
        assert_eq!(model.sample(at(7, 23), &mut rng).uv_index, 0.0);
        assert!(model.sample(at(7, 12), &mut rng).uv_index > 0.0);
    }

    #[test]
    fn sampling_is_deterministic_per_seed() {
        let model = WeatherModel::for_season(Season::Autumn);
        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        for hour in 0..24 {
            assert_eq!(
                model.sample(at(10, hour), &mut a),
                model.sample(at(10, hour), &mut b)
            );
        }
    }

    #[test]
    fn summer_rains_less_often_than_autumn() {
        let draws = 2000;
        let rainy = |season: Season| {
            let model = WeatherModel::for_season(season);
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            (0..draws)
                .filter(|&i: &u32| model.sample(at(6, i % 24), &mut rng).rainfall_mm > 0.0)
                .count()
        };
        assert!(rainy(Season::Summer) < rainy(Season::Autumn));
    }

    proptest! {
        #[test]
        fn samples_stay_within_physical_bounds(
            seed in any::<u64>(),
            season_idx in 0usize..4,
            hour in 0u32..24,
        ) {
            let season = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter][season_idx];
            let model = WeatherModel::for_season(season);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let s = model.sample(at(6, hour), &mut rng);
            prop_assert!(validate_sample(&s).is_ok(), "invalid sample: {s:?}");
            prop_assert!(s.temperature_c >= 0.0);
            prop_assert!((20.0..=100.0).contains(&s.humidity_pct));
            prop_assert!((0.0..=50.0).contains(&s.rainfall_mm));
            prop_assert!((20.0..=100.0).contains(&s.soil_moisture_pct));
            prop_assert!(s.wind_speed_kmh >= 0.0);
            prop_assert!(s.uv_index >= 0.0);
        }
    }
}
