use std::cell::Cell;
use std::f64::consts::PI;

use threebody::simulation::diagnostics::{angular_momentum, center_of_mass, linear_momentum, total_energy};
use threebody::{
    figure_eight, integrate, reconstruct, reshape, simulate, simulate_with_stats, Body, IntegratorParameters,
    Method, Scenario, ScenarioConfig, SimError, SimulationConfig, StateVector, Tolerance, Trajectory,
};

/// Two bodies in the plane separated along the x axis
pub fn two_body_system(dist: f64, m1: f64, m2: f64, v1: [f64; 2], v2: [f64; 2]) -> Vec<Body> {
    vec![
        Body::new(m1, vec![-dist / 2.0, 0.0], v1.to_vec()),
        Body::new(m2, vec![dist / 2.0, 0.0], v2.to_vec()),
    ]
}

/// Unit masses on a circular orbit of unit separation (G = 1)
pub fn circular_pair() -> (Vec<Body>, f64) {
    let v = 0.5f64.sqrt();
    let period = 2.0 * PI * 0.5 / v;
    (two_body_system(1.0, 1.0, 1.0, [0.0, -v], [0.0, v]), period)
}

/// Tight tolerances for the accuracy tests
pub fn tight_params() -> IntegratorParameters {
    IntegratorParameters::with_tolerance(Tolerance::new(1e-10, 1e-10))
}

pub fn config(bodies: Vec<Body>, g: f64, t_end: f64, samples: usize) -> SimulationConfig {
    SimulationConfig {
        gravitational_constant: g,
        bodies,
        sample_times: threebody::linspace(0.0, t_end, samples).unwrap(),
    }
}

fn max_relative_energy_drift(traj: &Trajectory, g: f64, masses: &[f64]) -> f64 {
    let e0 = total_energy(&traj.first().unwrap().state, g, masses).unwrap();
    traj.iter()
        .map(|s| ((total_energy(&s.state, g, masses).unwrap() - e0) / e0).abs())
        .fold(0.0, f64::max)
}

// ==================================================================================
// Trajectory shape
// ==================================================================================

#[test]
fn one_sample_per_time_first_is_initial_state() {
    let (bodies, period) = circular_pair();
    let cfg = config(bodies, 1.0, period, 17);
    let traj = simulate(&cfg, &IntegratorParameters::default()).unwrap();

    assert_eq!(traj.len(), 17);
    assert_eq!(traj.times(), cfg.sample_times);

    let initial = threebody::validate_and_flatten(&cfg.bodies).unwrap();
    assert_eq!(traj.first().unwrap().state, initial);
    assert!(traj.iter().all(|s| s.state.len() == 8));
}

#[test]
fn three_bodies_in_3d_have_state_length_18() {
    let bodies = vec![
        Body::new(1.0, vec![1.0, 0.0, 0.0], vec![0.0, 0.3, 0.1]),
        Body::new(1.0, vec![-1.0, 0.0, 0.0], vec![0.0, -0.3, 0.0]),
        Body::new(0.5, vec![0.0, 1.5, 0.5], vec![0.2, 0.0, -0.1]),
    ];
    let traj = simulate(&config(bodies, 1.0, 1.0, 5), &IntegratorParameters::default()).unwrap();
    assert!(traj.iter().all(|s| s.state.len() == 18));
}

// ==================================================================================
// Conservation
// ==================================================================================

#[test]
fn circular_orbit_conserves_energy_and_closes() {
    let (bodies, period) = circular_pair();
    let cfg = config(bodies, 1.0, period, 101);
    let traj = simulate(&cfg, &tight_params()).unwrap();

    let drift = max_relative_energy_drift(&traj, 1.0, &cfg.masses());
    assert!(drift < 1e-8, "energy drift {drift:e}");

    let closure = (&traj.last().unwrap().state - &traj.first().unwrap().state).amax();
    assert!(closure < 1e-6, "orbit did not close: {closure:e}");
}

#[test]
fn eccentric_pair_conserves_momenta_and_center_of_mass() {
    let masses = [3.0, 1.0];
    let bodies = vec![
        Body::new(masses[0], vec![0.0, 0.0], vec![0.0, -0.1]),
        Body::new(masses[1], vec![1.0, 0.0], vec![0.0, 0.5]),
    ];
    let cfg = config(bodies, 1.0, 20.0, 41);
    let traj = simulate(&cfg, &tight_params()).unwrap();

    let first = &traj.first().unwrap().state;
    let p0 = linear_momentum(first, &masses).unwrap();
    let l0 = angular_momentum(first, &masses).unwrap();
    let (c0, w0) = center_of_mass(first, &masses).unwrap();

    for sample in &traj {
        let p = linear_momentum(&sample.state, &masses).unwrap();
        assert!((&p - &p0).amax() < 1e-10, "momentum drift at t = {}", sample.t);

        let l = angular_momentum(&sample.state, &masses).unwrap();
        assert!((&l - &l0).amax() < 1e-7, "angular momentum drift at t = {}", sample.t);

        // uniform motion of the centre of mass
        let (c, _) = center_of_mass(&sample.state, &masses).unwrap();
        let expected = &c0 + &w0 * sample.t;
        assert!((&c - &expected).amax() < 1e-9, "centre of mass drift at t = {}", sample.t);
    }
}

#[test]
fn figure_eight_returns_after_one_period() {
    let cfg = figure_eight(1.0, 3).unwrap();
    let (traj, stats) = simulate_with_stats(&cfg, &tight_params()).unwrap();

    let first = &traj.first().unwrap().state;
    let last = &traj.last().unwrap().state;
    let error = (last - first).amax();
    assert!(error < 1e-5, "return error {error:e}");

    let drift = max_relative_energy_drift(&traj, 1.0, &cfg.masses());
    assert!(drift < 1e-7, "energy drift {drift:e}");

    let masses = cfg.masses();
    let l0 = angular_momentum(first, &masses).unwrap();
    let l1 = angular_momentum(last, &masses).unwrap();
    assert!((l1 - l0).amax() < 1e-7);

    assert!(stats.accepted_steps > 0);
    assert!(stats.derivative_evals >= stats.accepted_steps);
}

#[test]
fn long_figure_eight_stays_on_adams() {
    let cfg = figure_eight(20.0, 50).unwrap();
    let (traj, stats) = simulate_with_stats(&cfg, &IntegratorParameters::default()).unwrap();
    assert_eq!(stats.method_switches, 0, "{stats:?}");
    assert_eq!(stats.jacobian_evals, 0);

    let error = (&traj.last().unwrap().state - &traj.first().unwrap().state).amax();
    assert!(error < 5e-3, "return error {error:e}");

    let drift = max_relative_energy_drift(&traj, 1.0, &cfg.masses());
    assert!(drift < 1e-4, "energy drift {drift:e}");
}

#[test]
fn figure_eight_needs_two_samples() {
    assert!(matches!(figure_eight(1.0, 1), Err(SimError::InvalidConfiguration(_))));
}

#[test]
fn stiff_only_run_conserves_energy_loosely() {
    let (bodies, period) = circular_pair();
    let cfg = config(bodies, 1.0, period, 2);
    let params = IntegratorParameters {
        method: Method::Rosenbrock,
        ..IntegratorParameters::with_tolerance(Tolerance::new(1e-6, 1e-6))
    };
    let (traj, stats) = simulate_with_stats(&cfg, &params).unwrap();

    let drift = max_relative_energy_drift(&traj, 1.0, &cfg.masses());
    assert!(drift < 1e-3, "energy drift {drift:e}");
    assert!(stats.jacobian_evals > 0);
    assert_eq!(stats.method_switches, 0);
}

// ==================================================================================
// Singularities and divergence
// ==================================================================================

#[test]
fn coincident_bodies_are_a_singularity() {
    let bodies = vec![
        Body::new(1.0, vec![0.3, 0.3], vec![0.0, 0.0]),
        Body::new(1.0, vec![1.0, 0.0], vec![0.0, 0.0]),
        Body::new(1.0, vec![0.3, 0.3], vec![0.1, 0.0]),
    ];
    let res = simulate(&config(bodies, 1.0, 1.0, 3), &IntegratorParameters::default());
    assert!(
        matches!(res, Err(SimError::NumericalSingularity { first: 0, second: 2, .. })),
        "{res:?}"
    );
}

#[test]
fn coincident_raw_state_is_a_singularity_through_integrate() {
    let field = threebody::NewtonianGravity::new(1.0, vec![1.0, 1.0]);
    let y0 = StateVector::from_vec(vec![0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 1.0, 0.0]);
    let res = integrate(&y0, &[0.0, 1.0], &field, &Tolerance::default());
    assert!(
        matches!(res, Err(SimError::NumericalSingularity { first: 0, second: 1, .. })),
        "{res:?}"
    );
}

#[test]
fn head_on_collision_diverges_near_impact() {
    // free fall from rest: impact at t = pi / 4
    let bodies = two_body_system(1.0, 1.0, 1.0, [0.0, 0.0], [0.0, 0.0]);
    let res = simulate(&config(bodies, 1.0, 2.0, 3), &IntegratorParameters::default());
    match res {
        Err(SimError::IntegrationDivergence { t, .. }) => {
            assert!((t - PI / 4.0).abs() < 1e-3, "diverged at t = {t}")
        }
        other => panic!("expected divergence, got {other:?}"),
    }
}

// ==================================================================================
// Validation
// ==================================================================================

#[test]
fn bad_masses_are_rejected() {
    for m in [0.0, -1.0, f64::NAN] {
        let bodies = two_body_system(1.0, 1.0, m, [0.0, 0.0], [0.0, 0.0]);
        let res = simulate(&config(bodies, 1.0, 1.0, 3), &IntegratorParameters::default());
        assert!(matches!(res, Err(SimError::InvalidConfiguration(_))), "mass {m}: {res:?}");
    }
}

#[test]
fn mixed_dimensions_are_rejected() {
    let bodies = vec![
        Body::new(1.0, vec![0.0, 0.0], vec![0.0, 0.0]),
        Body::new(1.0, vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]),
    ];
    let res = simulate(&config(bodies, 1.0, 1.0, 3), &IntegratorParameters::default());
    assert!(matches!(res, Err(SimError::InvalidConfiguration(_))));
}

#[test]
fn bad_sample_times_never_touch_the_field() {
    let calls = Cell::new(0usize);
    let field = |_t: f64, y: &StateVector| -> threebody::SimResult<StateVector> {
        calls.set(calls.get() + 1);
        Ok(y.clone())
    };
    let y0 = StateVector::from_element(2, 1.0);

    for times in [vec![0.0], vec![], vec![0.0, 1.0, 1.0], vec![1.0, 0.5], vec![0.0, f64::NAN]] {
        let res = integrate(&y0, &times, &field, &Tolerance::default());
        assert!(matches!(res, Err(SimError::InvalidConfiguration(_))), "{times:?}: {res:?}");
    }

    let res = integrate(&y0, &[0.0, 1.0], &field, &Tolerance::new(-1.0, 1e-6));
    assert!(matches!(res, Err(SimError::InvalidConfiguration(_))));

    assert_eq!(calls.get(), 0);
}

// ==================================================================================
// Determinism and sampling
// ==================================================================================

#[test]
fn runs_are_deterministic_across_threads() {
    let cfg = figure_eight(0.5, 25).unwrap();
    let params = IntegratorParameters::default();
    let reference = simulate(&cfg, &params).unwrap();

    let results: Vec<Trajectory> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| simulate(&cfg, &params).unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for traj in results {
        assert_eq!(traj, reference);
    }
}

#[test]
fn reshape_then_reconstruct_is_lossless() {
    let cfg = figure_eight(0.25, 9).unwrap();
    let traj = simulate(&cfg, &IntegratorParameters::default()).unwrap();

    let series = reshape(&traj, 3, 2).unwrap();
    assert_eq!(series.bodies.len(), 3);
    assert_eq!(series.bodies[2].positions[1].len(), 9);
    assert_eq!(series.bodies[2].position_at(0), Some(vec![0.0, 0.0]));

    assert_eq!(reconstruct(&series).unwrap(), traj);
}

// ==================================================================================
// Scenario files
// ==================================================================================

#[test]
fn bundled_scenarios_build() {
    let files = [
        include_str!("../scenarios/figure_eight.yaml"),
        include_str!("../scenarios/two_body_xy.yaml"),
        include_str!("../scenarios/two_body_xyz.yaml"),
        include_str!("../scenarios/three_body_xy.yaml"),
        include_str!("../scenarios/three_body_xyz.yaml"),
    ];
    for text in files {
        let cfg = ScenarioConfig::from_yaml_str(text).unwrap();
        let scenario = Scenario::build_scenario(cfg).unwrap();
        assert_eq!(scenario.labels.len(), scenario.config.body_count());
    }
}

#[test]
fn two_body_scenario_runs() {
    let cfg = ScenarioConfig::from_yaml_str(include_str!("../scenarios/two_body_xy.yaml")).unwrap();
    let scenario = Scenario::build_scenario(cfg).unwrap();
    let traj = scenario.run().unwrap();
    assert_eq!(traj.len(), scenario.config.sample_times.len());

    let series = scenario.series(&traj).unwrap();
    assert_eq!(series.dimension, 2);
    assert!(series.bodies[1].final_position().unwrap().iter().all(|c| c.is_finite()));
}
