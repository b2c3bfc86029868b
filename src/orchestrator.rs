use crate::cache::ModelCache;
use crate::config::EngineConfig;
use crate::data::{FitContext, HistoricalDataProvider, ModelFamily};
use crate::error::EngineError;
use crate::fit::{FittedModel, ModelFitter};
use crate::horizon::simulate_multihorizon;
use crate::simulate::{simulate, FittedModels, ScenarioSpec};
use crate::types::{RaceState, ScenarioRequest, SimulateResponse, SimulationResult};

/// Engine output for one request: either the pit-now evaluation, or that
/// plus one self-contained entry per requested future-lap horizon.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    Single(SimulationResult),
    MultiHorizon {
        now: SimulationResult,
        horizons: Vec<SimulationResult>,
    },
}

impl SimulationOutcome {
    pub fn into_response(self) -> SimulateResponse {
        match self {
            SimulationOutcome::Single(now) => SimulateResponse { now, horizons: None },
            SimulationOutcome::MultiHorizon { now, horizons } => SimulateResponse {
                now,
                horizons: Some(horizons),
            },
        }
    }
}

/// Stateless per-request driver: validates the scenario, fits the three
/// model families (through the cache when one is attached), runs the
/// sampler, and assembles the outcome. Failures propagate as a single
/// typed error; nothing is retried and no partial response is produced.
pub struct Orchestrator<'a> {
    provider: &'a dyn HistoricalDataProvider,
    cache: Option<&'a ModelCache>,
    config: EngineConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(provider: &'a dyn HistoricalDataProvider) -> Self {
        Orchestrator {
            provider,
            cache: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: &'a ModelCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn run(&self, request: &ScenarioRequest) -> Result<SimulationOutcome, EngineError> {
        validate(request)?;

        let circuit = request.gp.to_lowercase();
        let ctx = FitContext {
            circuit: &circuit,
            season: request.year,
            compound: request.compound_a,
        };
        let models = self.fit_models(&ctx)?;
        let state = self.resolve_race_state(request);

        let base = ScenarioSpec {
            horizon_lap: request.lap_now,
            gap_s: state.current_gap_s,
            tire_age_b: state.tire_age_driver_b,
            samples: request.samples,
            p_pit_next: request.p_pit_next,
            seed: request.seed.unwrap_or(self.config.default_seed),
        };

        tracing::info!(
            gp = %circuit,
            year = request.year,
            driver_a = %request.driver_a,
            driver_b = %request.driver_b,
            lap_now = request.lap_now,
            samples = request.samples,
            gap_s = state.current_gap_s,
            tire_age_b = state.tire_age_driver_b,
            "running undercut simulation"
        );

        let now = simulate(&models, &base);
        match request.h {
            Some(h) if h > 1 => {
                let offsets: Vec<u32> = (1..=h).collect();
                let horizons = simulate_multihorizon(&models, &base, &offsets);
                Ok(SimulationOutcome::MultiHorizon { now, horizons })
            }
            _ => Ok(SimulationOutcome::Single(now)),
        }
    }

    fn resolve_race_state(&self, request: &ScenarioRequest) -> RaceState {
        RaceState {
            current_gap_s: request.current_gap_s.unwrap_or(self.config.default_gap_s),
            tire_age_driver_b: request
                .tire_age_driver_b
                .unwrap_or(self.config.default_tire_age_b),
        }
    }

    fn fit_models(&self, ctx: &FitContext) -> Result<FittedModels, EngineError> {
        Ok(FittedModels {
            deg: self.fit_one(ModelFamily::Degradation, ctx)?,
            pit: self.fit_one(ModelFamily::PitLoss, ctx)?,
            outlap: self.fit_one(ModelFamily::OutLap, ctx)?,
        })
    }

    fn fit_one(&self, family: ModelFamily, ctx: &FitContext) -> Result<FittedModel, EngineError> {
        let version = self.provider.dataset_version();
        if let Some(cache) = self.cache {
            if let Some(model) = cache.get(family, ctx, version) {
                return Ok(model);
            }
        }
        let model = ModelFitter::new(self.provider).fit(family, ctx)?;
        if let Some(cache) = self.cache {
            cache.put(family, ctx, version, model.clone());
        }
        Ok(model)
    }
}

/// Check the request invariants, naming the first offending field.
pub fn validate(request: &ScenarioRequest) -> Result<(), EngineError> {
    if request.gp.trim().is_empty() {
        return Err(EngineError::invalid("gp", "must not be empty"));
    }
    if !(1950..=2100).contains(&request.year) {
        return Err(EngineError::invalid(
            "year",
            format!("{} is outside the supported range", request.year),
        ));
    }
    if request.driver_a.trim().is_empty() {
        return Err(EngineError::invalid("driver_a", "must not be empty"));
    }
    if request.driver_b.trim().is_empty() {
        return Err(EngineError::invalid("driver_b", "must not be empty"));
    }
    if request.lap_now < 1 {
        return Err(EngineError::invalid("lap_now", "must be >= 1"));
    }
    if request.samples < 1 {
        return Err(EngineError::invalid("samples", "must be >= 1"));
    }
    if let Some(h) = request.h {
        if h < 1 {
            return Err(EngineError::invalid("H", "must be >= 1 when present"));
        }
    }
    if !request.p_pit_next.is_finite() || !(0.0..=1.0).contains(&request.p_pit_next) {
        return Err(EngineError::invalid(
            "p_pit_next",
            format!("{} is not a probability", request.p_pit_next),
        ));
    }
    if let Some(gap) = request.current_gap_s {
        if !gap.is_finite() || gap < 0.0 {
            return Err(EngineError::invalid(
                "current_gap_s",
                format!("{gap} is not a valid gap"),
            ));
        }
    }
    Ok(())
}
