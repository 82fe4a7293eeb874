#![deny(warnings)]

//! Simulation engine and lifecycle controller for the farm time series.
//!
//! [`SimulationEngine`] composes the weather, growth, and KPI models into one
//! immutable [`DataPoint`] per tick; [`PollingController`] owns the mutable
//! growth state and the bounded history ring, drives ticks on a fixed
//! cadence, and answers trend-window queries. Everything below the
//! controller is a pure function over immutable inputs, so single-writer
//! ownership of the buffer is the only discipline required.

use chrono::{DateTime, Duration, Utc};
use farm_core::{
    validate_catalog, validate_sample, CropCatalog, CropId, DataPoint, EnvironmentalSample,
    GrowthState, KpiSnapshot, ProductionSample,
};
use farm_growth::KpiError;
use farm_weather::{Season, WeatherModel};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;
use tracing::{info, warn};

/// Trend queries default to the most recent seven entries.
pub const DEFAULT_TREND_WINDOW: usize = 7;

/// Simulation configuration, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Milliseconds between scheduled ticks (> 0).
    pub update_interval_ms: u64,
    /// Maximum number of retained data points (> 0).
    pub history_capacity: usize,
    /// Days of history seeded before live polling begins.
    pub history_seed_days: u32,
    /// Seed for the deterministic RNG stream.
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 5000,
            history_capacity: 100,
            history_seed_days: 30,
            rng_seed: 42,
        }
    }
}

/// Validate configuration invariants.
pub fn validate_config(config: &SimConfig) -> Result<(), EngineError> {
    if config.update_interval_ms == 0 {
        return Err(EngineError::InvalidConfig(
            "update_interval_ms must be > 0".to_string(),
        ));
    }
    if config.history_capacity == 0 {
        return Err(EngineError::InvalidConfig(
            "history_capacity must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Errors produced by the engine and controller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Crop catalog rejected at construction.
    #[error("invalid crop catalog: {0}")]
    Catalog(#[from] farm_core::ValidationError),
    /// A tick's numeric pipeline produced an unusable point.
    #[error("data generation failed: {0}")]
    Generation(String),
    /// KPI aggregation was invoked over zero crops.
    #[error(transparent)]
    EmptyCropSet(#[from] KpiError),
    /// Seeding the initial history failed; blocks leaving Initializing.
    #[error("history seeding failed: {0}")]
    Initialization(String),
}

/// Produces immutable data points by composing the weather, growth, and KPI
/// models. Owns no cross-tick growth state: growth is passed in and
/// returned, so only the RNG stream and the fixed season live inside.
#[derive(Clone, Debug)]
pub struct SimulationEngine {
    catalog: CropCatalog,
    weather: WeatherModel,
    rng: ChaCha8Rng,
}

impl SimulationEngine {
    /// Engine over a validated catalog. `start` fixes the season for the
    /// run; `seed` fixes the RNG stream.
    pub fn new(
        catalog: CropCatalog,
        seed: u64,
        start: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        validate_catalog(&catalog)?;
        Ok(Self {
            catalog,
            weather: WeatherModel::new(start),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// The catalog this engine simulates.
    pub fn catalog(&self) -> &CropCatalog {
        &self.catalog
    }

    /// The season fixed at construction.
    pub fn season(&self) -> Season {
        self.weather.season()
    }

    /// Produce the data point for `now`, advancing every crop from `growth`.
    ///
    /// Returns the point together with the updated growth state; the caller
    /// decides whether to commit it.
    pub fn tick(
        &mut self,
        id: u64,
        now: DateTime<Utc>,
        growth: &GrowthState,
    ) -> Result<(DataPoint, GrowthState), EngineError> {
        let environmental = self.weather.sample(now, &mut self.rng);
        validate_sample(&environmental).map_err(|e| EngineError::Generation(e.to_string()))?;

        let mut production = BTreeMap::new();
        let mut next_growth = GrowthState::new();
        for (crop_id, def) in self.catalog.iter() {
            let prior = growth.get(crop_id).copied().unwrap_or(0.0);
            let sample = farm_growth::step(def, &environmental, prior, &mut self.rng);
            next_growth.insert(crop_id.clone(), sample.growth_pct);
            production.insert(crop_id.clone(), sample);
        }

        let kpis = farm_growth::aggregate(&production, &environmental)?;
        if !(kpis.profit_per_hectare.is_finite() && kpis.productivity_index.is_finite()) {
            return Err(EngineError::Generation(
                "non-finite per-hectare indicators".to_string(),
            ));
        }

        Ok((
            DataPoint {
                id,
                timestamp: now,
                environmental,
                production,
                kpis,
            },
            next_growth,
        ))
    }

    /// Replay [`Self::tick`] once per day for `days + 1` consecutive dates
    /// ending at `now`, carrying growth forward from all-zero. Ids run
    /// `0..=days`. This is how initial history is seeded before any live
    /// polling begins.
    pub fn generate_series(
        &mut self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<(Vec<DataPoint>, GrowthState), EngineError> {
        let mut points = Vec::with_capacity(days as usize + 1);
        let mut growth = GrowthState::new();
        for offset in (0..=days).rev() {
            let at = now - Duration::days(i64::from(offset));
            let (point, next) = self.tick(u64::from(days - offset), at, &growth)?;
            growth = next;
            points.push(point);
        }
        Ok((points, growth))
    }
}

/// Bounded FIFO ring of data points; once at capacity, the oldest entry is
/// evicted for each insertion.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    points: VecDeque<DataPoint>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Empty buffer retaining at most `capacity` points.
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest entry if at capacity.
    pub fn push(&mut self, point: DataPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Number of retained points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the buffer holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Configured retention bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently appended point.
    pub fn latest(&self) -> Option<&DataPoint> {
        self.points.back()
    }

    /// All retained points, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.points.iter()
    }

    /// The most recent `n` points, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &DataPoint> {
        self.points
            .iter()
            .skip(self.points.len().saturating_sub(n))
    }

    /// Drop every retained point.
    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Lifecycle state of the polling controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// Seeding initial history; no live ticks yet.
    Initializing,
    /// Cadence running; a tick commits when polled past its due time.
    Active,
    /// Cadence suspended; history stays readable.
    Paused,
}

/// One production trend entry: every crop's figures at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionTrendPoint {
    /// Instant of the underlying data point.
    pub timestamp: DateTime<Utc>,
    /// Per-crop production figures.
    pub crops: BTreeMap<CropId, ProductionSample>,
}

/// One single-crop trend entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropTrendPoint {
    /// Instant of the underlying data point.
    pub timestamp: DateTime<Utc>,
    /// The crop's production figures.
    pub sample: ProductionSample,
}

/// One KPI trend entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KpiTrendPoint {
    /// Instant of the underlying data point.
    pub timestamp: DateTime<Utc>,
    /// Farm-wide indicators at that instant.
    pub kpis: KpiSnapshot,
}

/// Owns the growth state and history ring, drives the engine on a fixed
/// cadence, and serves non-blocking queries over the last committed tick.
///
/// The controller is polled: [`Self::poll_at`] commits a tick once the due
/// time passes. Wall-clock wrappers delegate to the `_at` variants with
/// `Utc::now()`. There is no ambient state; lifecycle is caller-managed.
#[derive(Debug)]
pub struct PollingController {
    config: SimConfig,
    engine: SimulationEngine,
    growth: GrowthState,
    history: HistoryBuffer,
    state: ControllerState,
    next_due: Option<DateTime<Utc>>,
    next_id: u64,
    last_error: Option<String>,
}

impl PollingController {
    /// Construct and synchronously seed history, entering Active.
    pub fn new(config: SimConfig, catalog: CropCatalog) -> Result<Self, EngineError> {
        Self::new_at(config, catalog, Utc::now())
    }

    /// [`Self::new`] at an explicit instant, for deterministic use.
    pub fn new_at(
        config: SimConfig,
        catalog: CropCatalog,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        validate_config(&config)?;
        let engine = SimulationEngine::new(catalog, config.rng_seed, now)?;
        let history = HistoryBuffer::new(config.history_capacity);
        let mut controller = Self {
            config,
            engine,
            growth: GrowthState::new(),
            history,
            state: ControllerState::Initializing,
            next_due: None,
            next_id: 0,
            last_error: None,
        };
        controller.initialize(now)?;
        Ok(controller)
    }

    fn interval(&self) -> Duration {
        Duration::milliseconds(self.config.update_interval_ms as i64)
    }

    /// Seed the buffer and transition Initializing -> Active. A failure
    /// here leaves the controller in Initializing and is surfaced to the
    /// caller as a blocking error.
    fn initialize(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let (points, growth) = self
            .engine
            .generate_series(self.config.history_seed_days, now)
            .map_err(|e| EngineError::Initialization(e.to_string()))?;
        self.next_id = points.len() as u64;
        for point in points {
            self.history.push(point);
        }
        self.growth = growth;
        self.state = ControllerState::Active;
        self.next_due = Some(now + self.interval());
        info!(
            points = self.history.len(),
            season = %self.engine.season(),
            "history seeded"
        );
        Ok(())
    }

    fn commit_tick(&mut self, now: DateTime<Utc>) -> bool {
        match self.engine.tick(self.next_id, now, &self.growth) {
            Ok((point, growth)) => {
                self.next_id += 1;
                self.growth = growth;
                self.history.push(point);
                self.last_error = None;
                true
            }
            Err(err) => {
                // A failed tick does not advance history; the next
                // scheduled tick tries again independently.
                warn!(%err, "tick failed");
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Commit one scheduled tick if `now` has reached the due time.
    /// Returns whether a point was committed.
    pub fn poll_at(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != ControllerState::Active {
            return false;
        }
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        self.next_due = Some(now + self.interval());
        self.commit_tick(now)
    }

    /// [`Self::poll_at`] against the wall clock.
    pub fn poll(&mut self) -> bool {
        self.poll_at(Utc::now())
    }

    /// Force one immediate extra tick without touching the schedule.
    pub fn refresh_at(&mut self, now: DateTime<Utc>) -> bool {
        self.commit_tick(now)
    }

    /// [`Self::refresh_at`] against the wall clock.
    pub fn refresh_now(&mut self) -> bool {
        self.refresh_at(Utc::now())
    }

    /// Suspend the cadence; history and the current pointer stay readable.
    pub fn pause(&mut self) {
        if self.state == ControllerState::Active {
            self.state = ControllerState::Paused;
            self.next_due = None;
            info!("polling paused");
        }
    }

    /// Restart the cadence without re-seeding; the next tick is due one
    /// interval after `now`.
    pub fn resume_at(&mut self, now: DateTime<Utc>) {
        if self.state == ControllerState::Paused {
            self.state = ControllerState::Active;
            self.next_due = Some(now + self.interval());
            info!("polling resumed");
        }
    }

    /// [`Self::resume_at`] against the wall clock.
    pub fn resume(&mut self) {
        self.resume_at(Utc::now())
    }

    /// Full restart: discard history and growth, rebuild the engine from
    /// the configured seed (fresh season and RNG stream), re-seed history.
    /// Crop growth restarts from zero even mid-cycle.
    pub fn reset_at(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        info!("resetting simulation");
        self.engine =
            SimulationEngine::new(self.engine.catalog().clone(), self.config.rng_seed, now)?;
        self.history.clear();
        self.growth.clear();
        self.next_id = 0;
        self.last_error = None;
        self.next_due = None;
        self.state = ControllerState::Initializing;
        self.initialize(now)
    }

    /// [`Self::reset_at`] against the wall clock.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.reset_at(Utc::now())
    }

    /// Latest committed point, or none before initialization completes.
    pub fn current_data_point(&self) -> Option<&DataPoint> {
        self.history.latest()
    }

    /// Current buffer size (bounded by the configured capacity).
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Whether the cadence is running.
    pub fn is_active(&self) -> bool {
        self.state == ControllerState::Active
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Error recorded by the most recent failed tick, cleared by the next
    /// successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The configuration fixed at construction.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The season the current engine samples under.
    pub fn season(&self) -> Season {
        self.engine.season()
    }

    /// All retained points, oldest first.
    pub fn history_iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.history.iter()
    }

    /// Environmental readings for the most recent `days` entries, oldest
    /// first. Each sample carries its own timestamp.
    pub fn environmental_trend(&self, days: usize) -> Vec<EnvironmentalSample> {
        self.history
            .last_n(days)
            .map(|p| p.environmental.clone())
            .collect()
    }

    /// Per-crop production for the most recent `days` entries, oldest first.
    pub fn production_trend(&self, days: usize) -> Vec<ProductionTrendPoint> {
        self.history
            .last_n(days)
            .map(|p| ProductionTrendPoint {
                timestamp: p.timestamp,
                crops: p.production.clone(),
            })
            .collect()
    }

    /// One crop's production series over the most recent `days` entries,
    /// oldest first. Empty if the crop is not in the catalog.
    pub fn crop_trend(&self, crop: &CropId, days: usize) -> Vec<CropTrendPoint> {
        self.history
            .last_n(days)
            .filter_map(|p| {
                p.production.get(crop).map(|sample| CropTrendPoint {
                    timestamp: p.timestamp,
                    sample: sample.clone(),
                })
            })
            .collect()
    }

    /// Farm-wide indicators for the most recent `days` entries, oldest
    /// first.
    pub fn kpi_trend(&self, days: usize) -> Vec<KpiTrendPoint> {
        self.history
            .last_n(days)
            .map(|p| KpiTrendPoint {
                timestamp: p.timestamp,
                kpis: p.kpis.clone(),
            })
            .collect()
    }
}
