use crate::simulate::{simulate, FittedModels, ScenarioSpec};
use crate::types::SimulationResult;

/// Evaluate the scenario at each horizon offset, in the given order.
///
/// Every entry is an independent re-run of the sampler on the projected
/// scenario; no state is carried between horizons, so entry `k` is
/// observably identical to a single-horizon run whose stop lap and tire
/// age were shifted by `k` up front.
pub fn simulate_multihorizon(
    models: &FittedModels,
    base: &ScenarioSpec,
    horizons: &[u32],
) -> Vec<SimulationResult> {
    horizons
        .iter()
        .map(|&k| simulate(models, &base.project(k)))
        .collect()
}
