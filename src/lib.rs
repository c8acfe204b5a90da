pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{SimError, SimResult};

pub use simulation::states::{Body, SimulationConfig, StateVector, Tolerance, Sample, Trajectory, linspace};
pub use simulation::registry::validate_and_flatten;
pub use simulation::forces::{derivative, NewtonianGravity, VectorField};
pub use simulation::params::{IntegratorParameters, Method};
pub use simulation::integrator::{integrate, integrate_with_stats, IntegrationStats};
pub use simulation::sampler::{reshape, reconstruct, BodySeries, PerBodySeries};
pub use simulation::engine::{simulate, simulate_with_stats};
pub use simulation::scenario::Scenario;

pub use configuration::config::{ScenarioConfig, ParametersConfig, BodyConfig, MethodConfig};

pub use benchmark::benchmark::{bench_tolerance_sweep, figure_eight, FIGURE_EIGHT_PERIOD};
