//! Undercut probability engine.
//!
//! Estimates the probability that a driver gains track position by pitting
//! for fresh tires before a rival. Three statistical models (tire
//! degradation, pit-stop loss, out-lap pace) are fitted from historical
//! observations with a context backoff ladder, then combined in a
//! seeded Monte Carlo simulation, optionally across several future-lap
//! horizons.
//!
//! The HTTP surface in `main.rs` is a thin shell; everything here is
//! request-scoped and safe to call from concurrent workers.

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod horizon;
pub mod orchestrator;
pub mod simulate;
pub mod types;

pub use cache::ModelCache;
pub use config::{EngineConfig, ServerConfig};
pub use data::{ContextLevel, ContextQuery, FitContext, HistoricalDataProvider, ModelFamily, Observation, StaticDataProvider};
pub use error::EngineError;
pub use fit::{DistParams, FittedModel, ModelFitter};
pub use horizon::simulate_multihorizon;
pub use orchestrator::{Orchestrator, SimulationOutcome};
pub use simulate::{simulate, FittedModels, ScenarioSpec};
pub use types::{Compound, ScenarioRequest, SimulateResponse, SimulationResult};
