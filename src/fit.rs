use rand::Rng;
use rand_distr::Distribution;

use crate::data::{ContextLevel, FitContext, HistoricalDataProvider, ModelFamily, Observation};
use crate::error::EngineError;

/// Minimum observations a ladder rung must hold, after filtering, before
/// the fitter estimates parameters there.
pub const MIN_OBSERVATIONS: usize = 10;

/// Tire ages beyond this are treated as data errors and discarded.
pub const MAX_TIRE_AGE_LAPS: u32 = 50;

/// Out-lap penalty draws are bounded to this range, matching the filter
/// the historical data already went through.
const OUTLAP_PENALTY_MAX_S: f64 = 5.0;

/// Parameters of one fitted distribution.
///
/// Degradation is a quadratic lap-delta curve over tire age with normal
/// residual noise; pit loss is log-normal over stop-loss seconds; out-lap
/// is normal over the first-flying-lap penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistParams {
    Quadratic { a: f64, b: f64, c: f64, sigma: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Normal { mean: f64, std: f64 },
}

impl DistParams {
    /// Expected value at the given tire age (age is ignored by the stop
    /// and out-lap families).
    pub fn mean_at(&self, tire_age: u32) -> f64 {
        match *self {
            DistParams::Quadratic { a, b, c, .. } => {
                let x = tire_age as f64;
                a * x * x + b * x + c
            }
            DistParams::LogNormal { mu, sigma } => (mu + 0.5 * sigma * sigma).exp(),
            DistParams::Normal { mean, .. } => mean,
        }
    }

    /// Draw one sample. Zero-variance parameters produce deterministic
    /// point draws; the result is always finite.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, tire_age: u32) -> f64 {
        match *self {
            DistParams::Quadratic { sigma, .. } => {
                (self.mean_at(tire_age) + gaussian(rng, sigma)).max(0.0)
            }
            DistParams::LogNormal { mu, sigma } => {
                if sigma > 0.0 {
                    rand_distr::LogNormal::new(mu, sigma)
                        .map(|d| d.sample(rng))
                        .unwrap_or_else(|_| mu.exp())
                } else {
                    mu.exp()
                }
            }
            DistParams::Normal { mean, std } => {
                (mean + gaussian(rng, std)).clamp(0.0, OUTLAP_PENALTY_MAX_S)
            }
        }
    }
}

fn gaussian<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    if sigma > 0.0 {
        rand_distr::Normal::new(0.0, sigma)
            .map(|d| d.sample(rng))
            .unwrap_or(0.0)
    } else {
        0.0
    }
}

/// Output of the fitter for one family: the distribution, the ladder rung
/// it was estimated at, and whether the terminal prior had to be used.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub family: ModelFamily,
    pub params: DistParams,
    pub level: ContextLevel,
    pub used_backoff: bool,
    pub n_samples: usize,
}

/// Hardcoded terminal prior per family. Values are typical dry-race
/// figures: ~0.05 s/lap linear degradation with a mild quadratic term,
/// a ~24 s median stop loss, and a ~1 s out-lap penalty.
pub fn prior(family: ModelFamily) -> DistParams {
    match family {
        ModelFamily::Degradation => DistParams::Quadratic {
            a: 0.0012,
            b: 0.05,
            c: 0.0,
            sigma: 0.25,
        },
        ModelFamily::PitLoss => DistParams::LogNormal {
            mu: 24.0_f64.ln(),
            sigma: 0.06,
        },
        ModelFamily::OutLap => DistParams::Normal { mean: 1.0, std: 0.4 },
    }
}

/// Drop malformed observations before they can reach an estimator:
/// non-finite or negative values always, zero stop losses (a log-normal
/// cannot carry them), and implausible tire ages on lap records.
pub fn filter_observations(family: ModelFamily, observations: Vec<Observation>) -> Vec<Observation> {
    observations
        .into_iter()
        .filter(|o| {
            if !o.value_s.is_finite() || o.value_s < 0.0 {
                return false;
            }
            match family {
                ModelFamily::Degradation => o.tire_age <= MAX_TIRE_AGE_LAPS,
                ModelFamily::PitLoss => o.value_s > 0.0,
                ModelFamily::OutLap => true,
            }
        })
        .collect()
}

/// Fits one distribution per family by walking the family's backoff
/// ladder. Deterministic and total: with no usable data at any rung it
/// returns the prior, never an error.
pub struct ModelFitter<'a> {
    provider: &'a dyn HistoricalDataProvider,
}

impl<'a> ModelFitter<'a> {
    pub fn new(provider: &'a dyn HistoricalDataProvider) -> Self {
        ModelFitter { provider }
    }

    pub fn fit(&self, family: ModelFamily, ctx: &FitContext) -> Result<FittedModel, EngineError> {
        for &level in family.ladder() {
            let query = level.narrow(ctx);
            let raw = self
                .provider
                .observations(family, &query)
                .map_err(|e| EngineError::UpstreamData(e.to_string()))?;
            let observations = filter_observations(family, raw);
            if observations.len() < MIN_OBSERVATIONS {
                continue;
            }
            let params = estimate(family, &observations);
            tracing::debug!(
                family = family.as_str(),
                level = ?level,
                n = observations.len(),
                "fitted model"
            );
            return Ok(FittedModel {
                family,
                params,
                level,
                used_backoff: false,
                n_samples: observations.len(),
            });
        }

        tracing::warn!(
            family = family.as_str(),
            circuit = ctx.circuit,
            season = ctx.season,
            "no rung reached {} observations, using prior",
            MIN_OBSERVATIONS
        );
        Ok(FittedModel {
            family,
            params: prior(family),
            level: ContextLevel::Global,
            used_backoff: true,
            n_samples: 0,
        })
    }
}

fn estimate(family: ModelFamily, observations: &[Observation]) -> DistParams {
    match family {
        ModelFamily::Degradation => {
            let points: Vec<(f64, f64)> = observations
                .iter()
                .map(|o| (o.tire_age as f64, o.value_s))
                .collect();
            fit_quadratic(&points)
        }
        ModelFamily::PitLoss => {
            let logs: Vec<f64> = observations.iter().map(|o| o.value_s.ln()).collect();
            DistParams::LogNormal {
                mu: mean(&logs),
                sigma: std_dev(&logs),
            }
        }
        ModelFamily::OutLap => {
            let values: Vec<f64> = observations.iter().map(|o| o.value_s).collect();
            DistParams::Normal {
                mean: mean(&values),
                std: std_dev(&values),
            }
        }
    }
}

/// Least-squares quadratic over (age, delta) points, degrading to linear
/// when the design has fewer than three distinct ages (or is singular)
/// and to a constant mean below two.
fn fit_quadratic(points: &[(f64, f64)]) -> DistParams {
    let distinct = distinct_xs(points);
    if distinct >= 3 {
        if let Some((c, b, a)) = solve_quadratic_normal_equations(points) {
            let sigma = residual_std(points, |x| a * x * x + b * x + c, 3);
            return DistParams::Quadratic { a, b, c, sigma };
        }
    }
    if distinct >= 2 {
        let (c, b) = fit_line(points);
        let sigma = residual_std(points, |x| b * x + c, 2);
        return DistParams::Quadratic { a: 0.0, b, c, sigma };
    }
    let ys: Vec<f64> = points.iter().map(|&(_, y)| y).collect();
    DistParams::Quadratic {
        a: 0.0,
        b: 0.0,
        c: mean(&ys),
        sigma: std_dev(&ys),
    }
}

fn distinct_xs(points: &[(f64, f64)]) -> usize {
    let mut xs: Vec<u64> = points.iter().map(|&(x, _)| x.to_bits()).collect();
    xs.sort_unstable();
    xs.dedup();
    xs.len()
}

/// Solve the 3x3 normal equations for [c, b, a] via Cramer's rule.
/// Returns None when the design matrix is numerically singular.
fn solve_quadratic_normal_equations(points: &[(f64, f64)]) -> Option<(f64, f64, f64)> {
    let n = points.len() as f64;
    let (mut s1, mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0, 0.0);
    let (mut t0, mut t1, mut t2) = (0.0, 0.0, 0.0);
    for &(x, y) in points {
        let x2 = x * x;
        s1 += x;
        s2 += x2;
        s3 += x2 * x;
        s4 += x2 * x2;
        t0 += y;
        t1 += x * y;
        t2 += x2 * y;
    }
    let m = [[n, s1, s2], [s1, s2, s3], [s2, s3, s4]];
    let det = det3(&m);
    if !det.is_finite() || det.abs() < 1e-9 {
        return None;
    }
    let dc = det3(&[[t0, s1, s2], [t1, s2, s3], [t2, s3, s4]]);
    let db = det3(&[[n, t0, s2], [s1, t1, s3], [s2, t2, s4]]);
    let da = det3(&[[n, s1, t0], [s1, s2, t1], [s2, s3, t2]]);
    let (c, b, a) = (dc / det, db / det, da / det);
    if c.is_finite() && b.is_finite() && a.is_finite() {
        Some((c, b, a))
    } else {
        None
    }
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn fit_line(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let mx = points.iter().map(|&(x, _)| x).sum::<f64>() / n;
    let my = points.iter().map(|&(_, y)| y).sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &(x, y) in points {
        sxx += (x - mx) * (x - mx);
        sxy += (x - mx) * (y - my);
    }
    if sxx <= 0.0 {
        return (my, 0.0);
    }
    let slope = sxy / sxx;
    (my - slope * mx, slope)
}

fn residual_std(points: &[(f64, f64)], predict: impl Fn(f64) -> f64, n_params: usize) -> f64 {
    let n = points.len();
    if n <= n_params {
        return 0.0;
    }
    let ssr: f64 = points
        .iter()
        .map(|&(x, y)| {
            let r = y - predict(x);
            r * r
        })
        .sum();
    let sigma = (ssr / (n - n_params) as f64).sqrt();
    if sigma.is_finite() {
        sigma
    } else {
        0.0
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
