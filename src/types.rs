use serde::{Deserialize, Serialize};

/// Dry-weather race compounds. Wire format is the uppercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
}

impl Compound {
    pub fn as_str(self) -> &'static str {
        match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
        }
    }
}

fn default_samples() -> u32 {
    1000
}

fn default_p_pit_next() -> f64 {
    1.0
}

// ---------- Request ----------

/// One undercut scenario as posted to /simulate.
///
/// `current_gap_s` and `tire_age_driver_b` are live race state supplied by
/// the caller; when absent, engine defaults apply. `seed` fixes the Monte
/// Carlo stream so identical requests reproduce bit-for-bit.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRequest {
    pub gp: String,
    pub year: u16,
    pub driver_a: String,
    pub driver_b: String,
    pub compound_a: Compound,
    pub lap_now: u32,
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(rename = "H")]
    pub h: Option<u32>,
    #[serde(default = "default_p_pit_next")]
    pub p_pit_next: f64,
    pub seed: Option<u64>,
    pub current_gap_s: Option<f64>,
    pub tire_age_driver_b: Option<u32>,
}

/// Live race state at `lap_now`, resolved from the request or engine
/// defaults. The engine consumes this as an input; it never fetches it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceState {
    pub current_gap_s: f64,
    pub tire_age_driver_b: u32,
}

// ---------- Response ----------

/// Which families obtained a specific (non-prior) model. Each flag is the
/// negation of the corresponding `FittedModel::used_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelsFitted {
    pub deg_model: bool,
    pub pit_model: bool,
    pub outlap_model: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assumptions {
    pub current_gap_s: f64,
    pub tire_age_driver_b: u32,
    pub models_fitted: ModelsFitted,
    pub monte_carlo_samples: u32,
    /// Lap at which the stop is evaluated (extension field).
    pub horizon_lap: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub p_undercut: f64,
    #[serde(rename = "pitLoss_s")]
    pub pit_loss_s: f64,
    #[serde(rename = "outLapDelta_s")]
    pub out_lap_delta_s: f64,
    pub assumptions: Assumptions,
}

/// Full /simulate payload. For multi-horizon requests the pit-now result
/// stays at the top level and `horizons` carries one self-contained entry
/// per future lap, in increasing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulateResponse {
    #[serde(flatten)]
    pub now: SimulationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizons: Option<Vec<SimulationResult>>,
}
