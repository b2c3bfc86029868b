use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::fit::FittedModel;
use crate::types::{Assumptions, ModelsFitted, SimulationResult};

/// Laps the undercutting driver runs on fresh tires before the defender
/// has to respond. The stint penalty accrues over this window.
pub const UNDERCUT_WINDOW_LAPS: u32 = 2;

/// The three fitted models one request runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModels {
    pub deg: FittedModel,
    pub pit: FittedModel,
    pub outlap: FittedModel,
}

impl FittedModels {
    pub fn models_fitted(&self) -> ModelsFitted {
        ModelsFitted {
            deg_model: !self.deg.used_backoff,
            pit_model: !self.pit.used_backoff,
            outlap_model: !self.outlap.used_backoff,
        }
    }
}

/// Fully resolved simulation input: request fields plus live race state,
/// with any horizon offset already folded in via [`ScenarioSpec::project`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioSpec {
    /// Lap at which driver A makes the stop.
    pub horizon_lap: u32,
    /// Gap from A to B at `horizon_lap`, seconds.
    pub gap_s: f64,
    /// B's tire age at `horizon_lap`, laps.
    pub tire_age_b: u32,
    pub samples: u32,
    pub p_pit_next: f64,
    pub seed: u64,
}

impl ScenarioSpec {
    /// Shift the scenario `k` laps into the future: the stop happens `k`
    /// laps later and B's tires are `k` laps older. The seed is unchanged
    /// so a projected run equals an independent run at the shifted lap.
    pub fn project(&self, k: u32) -> ScenarioSpec {
        ScenarioSpec {
            horizon_lap: self.horizon_lap + k,
            tire_age_b: self.tire_age_b + k,
            ..*self
        }
    }
}

fn trial_seed(run_seed: u64, trial: u64) -> u64 {
    // Per-trial stream: fixed function of (run seed, trial index) so the
    // outcome is independent of trial execution order.
    run_seed ^ trial.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Run `spec.samples` independent trials and aggregate.
///
/// Per trial: draw both drivers' stop costs, gate whether B serves the
/// full undercut window on old tires, and compare positions once both
/// have stopped. Reported pit-loss and out-lap figures are the sample
/// means of driver A's draws, not the fitted-model means.
pub fn simulate(models: &FittedModels, spec: &ScenarioSpec) -> SimulationResult {
    debug_assert!(spec.samples >= 1);

    let mut successes: u64 = 0;
    let mut pit_sum = 0.0;
    let mut out_sum = 0.0;

    for trial in 0..spec.samples as u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(trial_seed(spec.seed, trial));

        let pit_a = models.pit.params.draw(&mut rng, 0);
        let out_a = models.outlap.params.draw(&mut rng, 0);
        let pit_b = models.pit.params.draw(&mut rng, 0);
        let out_b = models.outlap.params.draw(&mut rng, 0);
        let b_stays_out = rng.gen_bool(spec.p_pit_next);

        let stint_penalty = if b_stays_out {
            (1..=UNDERCUT_WINDOW_LAPS)
                .map(|j| {
                    let old = models.deg.params.draw(&mut rng, spec.tire_age_b + j);
                    let fresh = models.deg.params.draw(&mut rng, j);
                    old - fresh
                })
                .sum()
        } else {
            // B covers immediately: no continued-stint penalty.
            0.0
        };

        // Positive: A is still behind B once both have stopped.
        let net = spec.gap_s + pit_a + out_a - pit_b - out_b - stint_penalty;
        if net < 0.0 {
            successes += 1;
        }
        pit_sum += pit_a;
        out_sum += out_a;
    }

    let n = spec.samples as f64;
    SimulationResult {
        p_undercut: successes as f64 / n,
        pit_loss_s: pit_sum / n,
        out_lap_delta_s: out_sum / n,
        assumptions: Assumptions {
            current_gap_s: spec.gap_s,
            tire_age_driver_b: spec.tire_age_b,
            models_fitted: models.models_fitted(),
            monte_carlo_samples: spec.samples,
            horizon_lap: spec.horizon_lap,
        },
    }
}
