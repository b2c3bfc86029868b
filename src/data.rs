use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

use crate::types::Compound;

/// The three model families the engine fits per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Degradation,
    PitLoss,
    OutLap,
}

impl ModelFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::Degradation => "degradation",
            ModelFamily::PitLoss => "pit_loss",
            ModelFamily::OutLap => "out_lap",
        }
    }

    /// Backoff ladder for this family, most specific rung first. Pit loss
    /// is compound-independent, so its ladder narrows on circuit and
    /// season only.
    pub fn ladder(self) -> &'static [ContextLevel] {
        match self {
            ModelFamily::Degradation | ModelFamily::OutLap => &[
                ContextLevel::CircuitSeasonCompound,
                ContextLevel::CircuitCompound,
                ContextLevel::CompoundOnly,
                ContextLevel::Global,
            ],
            ModelFamily::PitLoss => &[
                ContextLevel::CircuitSeason,
                ContextLevel::Circuit,
                ContextLevel::Global,
            ],
        }
    }
}

/// One rung of a backoff ladder. Each level keeps a subset of the full
/// fit context; `Global` keeps nothing and matches every observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextLevel {
    CircuitSeasonCompound,
    CircuitCompound,
    CircuitSeason,
    CompoundOnly,
    Circuit,
    Global,
}

/// The most specific context available for one request.
#[derive(Debug, Clone, Copy)]
pub struct FitContext<'a> {
    pub circuit: &'a str,
    pub season: u16,
    pub compound: Compound,
}

/// A context filter produced by narrowing a [`FitContext`] to one ladder
/// rung. `None` fields match anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextQuery<'a> {
    pub circuit: Option<&'a str>,
    pub season: Option<u16>,
    pub compound: Option<Compound>,
}

impl ContextLevel {
    pub fn narrow<'a>(self, ctx: &FitContext<'a>) -> ContextQuery<'a> {
        let (circuit, season, compound) = match self {
            ContextLevel::CircuitSeasonCompound => {
                (Some(ctx.circuit), Some(ctx.season), Some(ctx.compound))
            }
            ContextLevel::CircuitCompound => (Some(ctx.circuit), None, Some(ctx.compound)),
            ContextLevel::CircuitSeason => (Some(ctx.circuit), Some(ctx.season), None),
            ContextLevel::CompoundOnly => (None, None, Some(ctx.compound)),
            ContextLevel::Circuit => (Some(ctx.circuit), None, None),
            ContextLevel::Global => (None, None, None),
        };
        ContextQuery {
            circuit,
            season,
            compound,
        }
    }
}

/// A single historical record: a lap-time delta (degradation), a stop-time
/// loss (pit loss) or a first-flying-lap penalty (out-lap), in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub circuit: String,
    pub season: u16,
    pub compound: Option<Compound>,
    /// Tire age in laps at the start of the lap. Zero for stop records.
    pub tire_age: u32,
    pub value_s: f64,
}

impl Observation {
    pub fn matches(&self, query: &ContextQuery) -> bool {
        if let Some(circuit) = query.circuit {
            if !self.circuit.eq_ignore_ascii_case(circuit) {
                return false;
            }
        }
        if let Some(season) = query.season {
            if self.season != season {
                return false;
            }
        }
        if let Some(compound) = query.compound {
            if self.compound != Some(compound) {
                return false;
            }
        }
        true
    }
}

/// Read-only query interface over historical observations. Implementations
/// must be safe for concurrent reads; the engine holds no locks around
/// calls.
pub trait HistoricalDataProvider: Send + Sync {
    fn observations(
        &self,
        family: ModelFamily,
        query: &ContextQuery,
    ) -> anyhow::Result<Vec<Observation>>;

    /// Monotonic version of the underlying dataset, used by the model
    /// cache to detect stale entries. Implementations that never change
    /// may keep the default.
    fn dataset_version(&self) -> u64 {
        0
    }
}

// ---------- In-memory provider ----------

#[derive(Debug, Clone, Deserialize)]
struct LapRecord {
    circuit: String,
    season: u16,
    compound: Compound,
    tire_age: u32,
    lap_delta_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct PitRecord {
    circuit: String,
    season: u16,
    loss_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct OutLapRecord {
    circuit: String,
    season: u16,
    compound: Compound,
    penalty_s: f64,
}

/// JSON dataset format consumed by [`StaticDataProvider`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    laps: Vec<LapRecord>,
    #[serde(default)]
    pit_stops: Vec<PitRecord>,
    #[serde(default)]
    out_laps: Vec<OutLapRecord>,
}

/// Immutable in-memory provider backed by a JSON dataset. Reads are
/// lock-free; `replace` swaps the dataset and bumps the version so cached
/// models fitted against the old data become misses.
pub struct StaticDataProvider {
    laps: parking_lot::RwLock<Vec<Observation>>,
    pit_stops: parking_lot::RwLock<Vec<Observation>>,
    out_laps: parking_lot::RwLock<Vec<Observation>>,
    version: AtomicU64,
}

impl StaticDataProvider {
    pub fn empty() -> Self {
        Self::from_dataset(Dataset::default())
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let provider = StaticDataProvider {
            laps: parking_lot::RwLock::new(Vec::new()),
            pit_stops: parking_lot::RwLock::new(Vec::new()),
            out_laps: parking_lot::RwLock::new(Vec::new()),
            version: AtomicU64::new(0),
        };
        provider.load(dataset);
        provider
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let dataset: Dataset = serde_json::from_str(json)?;
        Ok(Self::from_dataset(dataset))
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Swap in a new dataset and advance the version.
    pub fn replace(&self, dataset: Dataset) {
        self.load(dataset);
    }

    fn load(&self, dataset: Dataset) {
        let laps = dataset
            .laps
            .into_iter()
            .map(|r| Observation {
                circuit: r.circuit.to_lowercase(),
                season: r.season,
                compound: Some(r.compound),
                tire_age: r.tire_age,
                value_s: r.lap_delta_s,
            })
            .collect();
        let pit_stops = dataset
            .pit_stops
            .into_iter()
            .map(|r| Observation {
                circuit: r.circuit.to_lowercase(),
                season: r.season,
                compound: None,
                tire_age: 0,
                value_s: r.loss_s,
            })
            .collect();
        let out_laps = dataset
            .out_laps
            .into_iter()
            .map(|r| Observation {
                circuit: r.circuit.to_lowercase(),
                season: r.season,
                compound: Some(r.compound),
                tire_age: 0,
                value_s: r.penalty_s,
            })
            .collect();
        *self.laps.write() = laps;
        *self.pit_stops.write() = pit_stops;
        *self.out_laps.write() = out_laps;
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl HistoricalDataProvider for StaticDataProvider {
    fn observations(
        &self,
        family: ModelFamily,
        query: &ContextQuery,
    ) -> anyhow::Result<Vec<Observation>> {
        let pool = match family {
            ModelFamily::Degradation => self.laps.read(),
            ModelFamily::PitLoss => self.pit_stops.read(),
            ModelFamily::OutLap => self.out_laps.read(),
        };
        Ok(pool.iter().filter(|o| o.matches(query)).cloned().collect())
    }

    fn dataset_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
