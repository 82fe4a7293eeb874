#![deny(warnings)]

//! Core domain models and invariants for the agrisim farm simulation.
//!
//! This crate defines the serializable types shared across the simulation
//! with validation helpers to guarantee basic invariants, plus the Gaussian
//! noise primitive every stochastic model draws from.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Unique identifier for a crop, e.g. "wheat", "olives".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CropId(pub String);

impl CropId {
    /// Build an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive band of values a crop tolerates without stress.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimalRange {
    /// Lower bound of the comfortable band.
    pub min: f64,
    /// Upper bound of the comfortable band.
    pub max: f64,
}

impl OptimalRange {
    /// New range; invariants are checked by [`validate_crop`].
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Width of the band.
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Whether `value` lies inside the band (inclusive).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Static agronomic constants for one cultivated crop.
///
/// Months are 1-based calendar months. Never mutated at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CropDefinition {
    /// Catalog key.
    pub id: CropId,
    /// Human-readable display name.
    pub name: String,
    /// Cultivated area in hectares (> 0).
    pub area_ha: f64,
    /// Month the crop goes into the ground.
    pub planting_month: u32,
    /// Month the crop is brought in.
    pub harvest_month: u32,
    /// Average yield in tons per hectare (> 0).
    pub avg_yield_t_per_ha: f64,
    /// Market price in currency units per ton (>= 0).
    pub price_per_ton: f64,
    /// Full growth cycle length in days (> 0).
    pub growth_cycle_days: u32,
    /// Temperature band with no growth stress, in °C.
    pub optimal_temp_c: OptimalRange,
    /// Relative humidity band with no growth stress, in %.
    pub optimal_humidity_pct: OptimalRange,
}

/// Static reference catalog, one definition per crop id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CropCatalog {
    crops: BTreeMap<CropId, CropDefinition>,
}

impl CropCatalog {
    /// The reference four-crop farm: wheat, corn, tomatoes, olives.
    pub fn standard() -> Self {
        let defs = [
            CropDefinition {
                id: CropId::new("wheat"),
                name: "Wheat".to_string(),
                area_ha: 25.0,
                planting_month: 11,
                harvest_month: 7,
                avg_yield_t_per_ha: 5.5,
                price_per_ton: 250.0,
                growth_cycle_days: 240,
                optimal_temp_c: OptimalRange::new(15.0, 25.0),
                optimal_humidity_pct: OptimalRange::new(60.0, 80.0),
            },
            CropDefinition {
                id: CropId::new("corn"),
                name: "Corn".to_string(),
                area_ha: 20.0,
                planting_month: 5,
                harvest_month: 10,
                avg_yield_t_per_ha: 8.5,
                price_per_ton: 220.0,
                growth_cycle_days: 150,
                optimal_temp_c: OptimalRange::new(20.0, 30.0),
                optimal_humidity_pct: OptimalRange::new(70.0, 85.0),
            },
            CropDefinition {
                id: CropId::new("tomatoes"),
                name: "Tomatoes".to_string(),
                area_ha: 5.0,
                planting_month: 4,
                harvest_month: 9,
                avg_yield_t_per_ha: 45.0,
                price_per_ton: 400.0,
                growth_cycle_days: 120,
                optimal_temp_c: OptimalRange::new(18.0, 28.0),
                optimal_humidity_pct: OptimalRange::new(65.0, 80.0),
            },
            CropDefinition {
                id: CropId::new("olives"),
                name: "Olives".to_string(),
                area_ha: 15.0,
                planting_month: 1,
                harvest_month: 11,
                avg_yield_t_per_ha: 3.5,
                price_per_ton: 800.0,
                growth_cycle_days: 365,
                optimal_temp_c: OptimalRange::new(15.0, 30.0),
                optimal_humidity_pct: OptimalRange::new(50.0, 70.0),
            },
        ];
        let mut crops = BTreeMap::new();
        for def in defs {
            crops.insert(def.id.clone(), def);
        }
        Self { crops }
    }

    /// Build a catalog from arbitrary definitions, rejecting duplicate ids.
    pub fn from_definitions(
        defs: impl IntoIterator<Item = CropDefinition>,
    ) -> Result<Self, ValidationError> {
        let mut crops = BTreeMap::new();
        for def in defs {
            let id = def.id.clone();
            if crops.insert(id.clone(), def).is_some() {
                return Err(ValidationError::DuplicateCrop(id.0));
            }
        }
        Ok(Self { crops })
    }

    /// Definition for `id`, if present.
    pub fn get(&self, id: &CropId) -> Option<&CropDefinition> {
        self.crops.get(id)
    }

    /// All definitions in deterministic (id-sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&CropId, &CropDefinition)> {
        self.crops.iter()
    }

    /// Crop ids in deterministic order.
    pub fn ids(&self) -> impl Iterator<Item = &CropId> {
        self.crops.keys()
    }

    /// Number of crops in the catalog.
    pub fn len(&self) -> usize {
        self.crops.len()
    }

    /// Whether the catalog holds no crops.
    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }
}

impl Default for CropCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// One immutable environmental reading produced per tick.
///
/// All fields except `pressure_hpa` are rounded to one decimal place at
/// generation time; bounds are enforced by [`validate_sample`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalSample {
    /// Instant the reading refers to.
    pub timestamp: DateTime<Utc>,
    /// Air temperature in °C (>= 0).
    pub temperature_c: f64,
    /// Relative humidity in % (20..=100).
    pub humidity_pct: f64,
    /// Rainfall in mm (0..=50).
    pub rainfall_mm: f64,
    /// Wind speed in km/h (>= 0).
    pub wind_speed_kmh: f64,
    /// UV index (0..=11).
    pub uv_index: f64,
    /// Soil moisture in % (20..=100).
    pub soil_moisture_pct: f64,
    /// Atmospheric pressure in hPa, unrounded.
    pub pressure_hpa: f64,
}

/// Lifecycle stage derived from cumulative growth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropStage {
    /// Growth below 25%.
    Planting,
    /// Growth below 50%.
    Vegetative,
    /// Growth below 75%.
    Flowering,
    /// Growth below 95%.
    Maturation,
    /// Growth at 95%+ during the crop's harvest month.
    Harvest,
    /// Growth at 95%+ outside the harvest month.
    Completed,
}

impl fmt::Display for CropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CropStage::Planting => "Planting/Germination",
            CropStage::Vegetative => "Vegetative Growth",
            CropStage::Flowering => "Flowering",
            CropStage::Maturation => "Maturation",
            CropStage::Harvest => "Harvest",
            CropStage::Completed => "Completed",
        };
        f.write_str(label)
    }
}

/// Per-crop production figures derived for one tick.
///
/// Deriving a sample does not mutate growth state; the caller commits
/// `growth_pct` back as the crop's new cumulative growth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionSample {
    /// Display name copied from the definition.
    pub name: String,
    /// Cultivated area in hectares, copied from the definition.
    pub area_ha: f64,
    /// Cumulative growth in % (0..=100), rounded to one decimal.
    pub growth_pct: f64,
    /// Production volume in tons, rounded to two decimals.
    pub production_t: f64,
    /// Estimated revenue in currency units, rounded to the nearest unit.
    pub revenue: f64,
    /// Production vs. theoretical maximum in %; may exceed 100 under
    /// favorable variability draws.
    pub efficiency_pct: u32,
    /// Lifecycle stage label.
    pub stage: CropStage,
}

/// Farm-wide indicators reduced from one production set and one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    /// Sum of cultivated areas in hectares.
    pub total_area_ha: f64,
    /// Sum of estimated revenues.
    pub total_revenue: f64,
    /// Sum of production volumes in tons.
    pub total_production_t: f64,
    /// Mean crop efficiency, rounded to an integer percent.
    pub average_efficiency_pct: u32,
    /// Mean cumulative growth in %, rounded to one decimal.
    pub average_growth_pct: f64,
    /// Composite weather risk score (0..=100).
    pub weather_risk: u32,
    /// Revenue per hectare, rounded to the nearest unit.
    pub profit_per_hectare: f64,
    /// Production per hectare, rounded to two decimals.
    pub productivity_index: f64,
}

/// Cumulative growth percentage carried across ticks, keyed by crop id.
pub type GrowthState = BTreeMap<CropId, f64>;

/// The atomic unit of simulation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Sequential id assigned by the controller, restarting on reset.
    pub id: u64,
    /// Instant the point was produced for.
    pub timestamp: DateTime<Utc>,
    /// Environmental reading for this tick.
    pub environmental: EnvironmentalSample,
    /// Per-crop production figures for this tick.
    pub production: BTreeMap<CropId, ProductionSample>,
    /// Farm-wide indicators for this tick.
    pub kpis: KpiSnapshot,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A catalog must carry at least one crop.
    #[error("crop catalog is empty")]
    EmptyCatalog,
    /// Two definitions share the same id.
    #[error("duplicate crop id: {0}")]
    DuplicateCrop(String),
    /// Area must be strictly positive.
    #[error("crop area must be > 0 ha")]
    NonPositiveArea,
    /// Yield must be strictly positive.
    #[error("average yield must be > 0 t/ha")]
    NonPositiveYield,
    /// Prices cannot be negative.
    #[error("negative price per ton is invalid")]
    NegativePrice,
    /// Growth cycles span at least one day.
    #[error("growth cycle must span at least one day")]
    ZeroGrowthCycle,
    /// Calendar months are 1-based.
    #[error("month {0} is out of range [1, 12]")]
    MonthOutOfRange(u32),
    /// Optimal ranges must be ordered and non-degenerate.
    #[error("optimal range min {min} must be below max {max}")]
    InvertedRange {
        /// Offending lower bound.
        min: f64,
        /// Offending upper bound.
        max: f64,
    },
    /// Numeric fields must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// An environmental value escaped its physical bounds.
    #[error("environmental value {field}={value} violates physical bounds")]
    OutOfBounds {
        /// Name of the offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
}

fn validate_range(range: &OptimalRange) -> Result<(), ValidationError> {
    if !(range.min.is_finite() && range.max.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    if range.min >= range.max {
        return Err(ValidationError::InvertedRange {
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}

/// Validate a single crop definition.
pub fn validate_crop(def: &CropDefinition) -> Result<(), ValidationError> {
    if !(def.area_ha.is_finite()
        && def.avg_yield_t_per_ha.is_finite()
        && def.price_per_ton.is_finite())
    {
        return Err(ValidationError::NonFinite);
    }
    if def.area_ha <= 0.0 {
        return Err(ValidationError::NonPositiveArea);
    }
    if def.avg_yield_t_per_ha <= 0.0 {
        return Err(ValidationError::NonPositiveYield);
    }
    if def.price_per_ton < 0.0 {
        return Err(ValidationError::NegativePrice);
    }
    if def.growth_cycle_days == 0 {
        return Err(ValidationError::ZeroGrowthCycle);
    }
    for month in [def.planting_month, def.harvest_month] {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::MonthOutOfRange(month));
        }
    }
    validate_range(&def.optimal_temp_c)?;
    validate_range(&def.optimal_humidity_pct)?;
    Ok(())
}

/// Validate a whole catalog: non-empty, every definition sound.
pub fn validate_catalog(catalog: &CropCatalog) -> Result<(), ValidationError> {
    if catalog.is_empty() {
        return Err(ValidationError::EmptyCatalog);
    }
    for (_, def) in catalog.iter() {
        validate_crop(def)?;
    }
    Ok(())
}

/// Validate an environmental sample against its physical bounds.
pub fn validate_sample(sample: &EnvironmentalSample) -> Result<(), ValidationError> {
    let fields = [
        ("temperature_c", sample.temperature_c),
        ("humidity_pct", sample.humidity_pct),
        ("rainfall_mm", sample.rainfall_mm),
        ("wind_speed_kmh", sample.wind_speed_kmh),
        ("uv_index", sample.uv_index),
        ("soil_moisture_pct", sample.soil_moisture_pct),
        ("pressure_hpa", sample.pressure_hpa),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite);
        }
        if value < 0.0 {
            return Err(ValidationError::OutOfBounds { field, value });
        }
    }
    for (field, value) in [
        ("humidity_pct", sample.humidity_pct),
        ("soil_moisture_pct", sample.soil_moisture_pct),
    ] {
        if !(20.0..=100.0).contains(&value) {
            return Err(ValidationError::OutOfBounds { field, value });
        }
    }
    if sample.rainfall_mm > 50.0 {
        return Err(ValidationError::OutOfBounds {
            field: "rainfall_mm",
            value: sample.rainfall_mm,
        });
    }
    if sample.uv_index > 11.0 {
        return Err(ValidationError::OutOfBounds {
            field: "uv_index",
            value: sample.uv_index,
        });
    }
    Ok(())
}

/// Draw from N(mean, std_dev) with an exact Box–Muller transform.
///
/// This is the single Gaussian primitive shared by every stochastic model in
/// the simulation; stress economics downstream are sensitive to tail
/// magnitude, so it must stay exact rather than approximately normal.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    // Uniform draws in (0, 1); zero is rejected so ln() stays finite.
    let mut u: f64 = 0.0;
    while u == 0.0 {
        u = rng.gen();
    }
    let mut v: f64 = 0.0;
    while v == 0.0 {
        v = rng.gen();
    }
    let z = (-2.0 * u.ln()).sqrt() * (std::f64::consts::TAU * v).cos();
    z * std_dev + mean
}

/// Round to `places` decimal places, halves away from zero.
pub fn round_dp(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
