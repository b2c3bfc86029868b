/// End-to-end property tests for the undercut engine
///
/// Run with: cargo test --test simulation_properties -- --nocapture
use serde_json::json;
use undercut_sim::{
    Compound, ModelCache, Orchestrator, ScenarioRequest, SimulationOutcome, StaticDataProvider,
};

/// Synthetic bahrain/2024 dataset with known parameters: degradation
/// 0.5 s per lap of age (±0.05 alternating residual), pit loss 24 s
/// (±0.5), out-lap penalty 1.0 s (±0.2). The alternating residuals keep
/// the sample means exactly on the known values.
fn synthetic_provider() -> StaticDataProvider {
    let mut laps = Vec::new();
    for age in 1u32..=20 {
        for sign in [1.0f64, -1.0] {
            laps.push(json!({
                "circuit": "bahrain",
                "season": 2024,
                "compound": "MEDIUM",
                "tire_age": age,
                "lap_delta_s": 0.5 * age as f64 + sign * 0.05,
            }));
        }
    }
    let mut pit_stops = Vec::new();
    let mut out_laps = Vec::new();
    for i in 0..12 {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        pit_stops.push(json!({
            "circuit": "bahrain",
            "season": 2024,
            "loss_s": 24.0 + sign * 0.5,
        }));
        out_laps.push(json!({
            "circuit": "bahrain",
            "season": 2024,
            "compound": "MEDIUM",
            "penalty_s": 1.0 + sign * 0.2,
        }));
    }
    let dataset = json!({ "laps": laps, "pit_stops": pit_stops, "out_laps": out_laps });
    StaticDataProvider::from_json_str(&dataset.to_string()).unwrap()
}

fn request() -> ScenarioRequest {
    ScenarioRequest {
        gp: "bahrain".into(),
        year: 2024,
        driver_a: "VER".into(),
        driver_b: "LEC".into(),
        compound_a: Compound::Medium,
        lap_now: 25,
        samples: 1000,
        h: None,
        p_pit_next: 1.0,
        seed: Some(42),
        current_gap_s: Some(1.0),
        tire_age_driver_b: Some(15),
    }
}

fn single(outcome: SimulationOutcome) -> undercut_sim::SimulationResult {
    match outcome {
        SimulationOutcome::Single(result) => result,
        other => panic!("expected single-horizon outcome, got {other:?}"),
    }
}

#[test]
fn test_end_to_end_oracle_scenario() {
    println!("\n=== Test: End-to-end oracle scenario ===");
    let provider = synthetic_provider();
    let orch = Orchestrator::new(&provider);

    // Closed-form oracle over the known means, window of 2 laps:
    //   net = gap + E[pit_a - pit_b] + E[out_a - out_b]
    //         - sum_j (0.5*(15+j) - 0.5*j)
    //       = 1.0 + 0 + 0 - 15.0 = -14.0  =>  p_undercut = 1.0
    let result = single(orch.run(&request()).unwrap());
    println!(
        "✓ p_undercut={:.3} pitLoss_s={:.2} outLapDelta_s={:.2}",
        result.p_undercut, result.pit_loss_s, result.out_lap_delta_s
    );
    assert!(
        (result.p_undercut - 1.0).abs() <= 0.02,
        "p_undercut {} not within 0.02 of oracle 1.0",
        result.p_undercut
    );
    assert!((result.pit_loss_s - 24.0).abs() < 1.0);
    assert!((result.out_lap_delta_s - 1.0).abs() < 0.5);
    assert!(result.assumptions.models_fitted.deg_model);
    assert!(result.assumptions.models_fitted.pit_model);
    assert!(result.assumptions.models_fitted.outlap_model);

    // A 40 s gap cannot be closed in two laps: oracle says 0.0.
    let mut hopeless = request();
    hopeless.current_gap_s = Some(40.0);
    let result = single(orch.run(&hopeless).unwrap());
    println!("✓ hopeless gap: p_undercut={:.3}", result.p_undercut);
    assert!(result.p_undercut <= 0.02);
}

#[test]
fn test_p_pit_next_gate_matches_analytic_fraction() {
    println!("\n=== Test: p_pit_next Bernoulli gate ===");
    let provider = synthetic_provider();
    let orch = Orchestrator::new(&provider);

    // With a 5 s gap both branches are decisive: staying out loses B
    // ~15 s (success), covering keeps A ~5 s behind (failure). The
    // success fraction is therefore the gate probability itself.
    let mut req = request();
    req.current_gap_s = Some(5.0);
    req.p_pit_next = 0.4;
    req.samples = 4000;
    let result = single(orch.run(&req).unwrap());
    println!("✓ p_undercut={:.3} vs gate 0.4", result.p_undercut);
    assert!(
        (result.p_undercut - 0.4).abs() <= 0.04,
        "p_undercut {} not within 0.04 of 0.4",
        result.p_undercut
    );
}

#[test]
fn test_determinism_bit_for_bit() {
    println!("\n=== Test: Determinism ===");
    let provider = synthetic_provider();
    let orch = Orchestrator::new(&provider);
    let a = single(orch.run(&request()).unwrap());
    let b = single(orch.run(&request()).unwrap());
    assert_eq!(a.p_undercut.to_bits(), b.p_undercut.to_bits());
    assert_eq!(a.pit_loss_s.to_bits(), b.pit_loss_s.to_bits());
    assert_eq!(a.out_lap_delta_s.to_bits(), b.out_lap_delta_s.to_bits());
    println!("✓ repeated runs identical");

    // Caching must not change results either.
    let cache = ModelCache::new();
    let cached = Orchestrator::new(&provider).with_cache(&cache);
    let c = single(cached.run(&request()).unwrap());
    let d = single(cached.run(&request()).unwrap());
    assert_eq!(a, c);
    assert_eq!(c, d);
    println!("✓ cached runs identical");
}

#[test]
fn test_sample_count_boundary_and_stability() {
    println!("\n=== Test: Sample count boundary ===");
    let provider = synthetic_provider();
    let orch = Orchestrator::new(&provider);

    let mut one = request();
    one.samples = 1;
    one.current_gap_s = Some(5.0);
    one.p_pit_next = 0.5;
    for seed in 0..10 {
        one.seed = Some(seed);
        let p = single(orch.run(&one).unwrap()).p_undercut;
        assert!(p == 0.0 || p == 1.0, "samples=1 gave p={p}");
    }
    println!("✓ samples=1 yields 0.0 or 1.0");

    // More samples must not move the estimate beyond Monte Carlo noise.
    let mut big = request();
    big.current_gap_s = Some(5.0);
    big.p_pit_next = 0.4;
    big.samples = 4000;
    big.seed = Some(5);
    let p1 = single(orch.run(&big).unwrap()).p_undercut;
    big.samples = 8000;
    big.seed = Some(6);
    let p2 = single(orch.run(&big).unwrap()).p_undercut;
    println!("✓ p(4000)={p1:.3} p(8000)={p2:.3}");
    assert!((p1 - p2).abs() < 0.05, "estimates diverged: {p1} vs {p2}");
}

#[test]
fn test_backoff_totality_without_data() {
    println!("\n=== Test: Backoff totality ===");
    let provider = StaticDataProvider::empty();
    let result = single(Orchestrator::new(&provider).run(&request()).unwrap());
    assert!(result.p_undercut >= 0.0 && result.p_undercut <= 1.0);
    assert!(result.pit_loss_s.is_finite());
    assert!(!result.assumptions.models_fitted.deg_model);
    assert!(!result.assumptions.models_fitted.pit_model);
    assert!(!result.assumptions.models_fitted.outlap_model);
    println!(
        "✓ prior-only run: p_undercut={:.3} pitLoss_s={:.2}",
        result.p_undercut, result.pit_loss_s
    );
}

#[test]
fn test_negative_deltas_do_not_reach_the_fit() {
    println!("\n=== Test: Malformed observation filtering ===");
    // Nine valid stops plus six negative ones: without filtering the rung
    // would cross the ten-observation threshold.
    let mut pit_stops = Vec::new();
    for _ in 0..9 {
        pit_stops.push(json!({"circuit":"bahrain","season":2024,"loss_s":24.0}));
    }
    for _ in 0..6 {
        pit_stops.push(json!({"circuit":"bahrain","season":2024,"loss_s":-3.0}));
    }
    let provider = StaticDataProvider::from_json_str(
        &json!({"pit_stops": pit_stops}).to_string(),
    )
    .unwrap();

    let result = single(Orchestrator::new(&provider).run(&request()).unwrap());
    assert!(
        !result.assumptions.models_fitted.pit_model,
        "negative stop losses were counted toward the fit threshold"
    );
    println!("✓ pit model fell back to the prior");
}

#[test]
fn test_horizon_decomposability_through_the_orchestrator() {
    println!("\n=== Test: Horizon decomposability ===");
    let provider = synthetic_provider();
    let orch = Orchestrator::new(&provider);

    let mut multi_req = request();
    multi_req.h = Some(3);
    let (now, horizons) = match orch.run(&multi_req).unwrap() {
        SimulationOutcome::MultiHorizon { now, horizons } => (now, horizons),
        other => panic!("expected multi-horizon outcome, got {other:?}"),
    };
    assert_eq!(horizons.len(), 3);

    // Entry k must equal an independent run shifted k laps forward.
    for k in 1u32..=3 {
        let mut shifted = request();
        shifted.lap_now += k;
        shifted.tire_age_driver_b = Some(15 + k);
        let standalone = single(orch.run(&shifted).unwrap());
        assert_eq!(
            horizons[(k - 1) as usize],
            standalone,
            "horizon {k} differs from the standalone run"
        );
    }
    assert_eq!(now, single(orch.run(&request()).unwrap()));
    println!("✓ all 3 horizons decompose into standalone runs");
}
