pub mod states;
pub mod params;
pub mod registry;
pub mod forces;
pub(crate) mod adams;
pub(crate) mod rosenbrock;
pub mod integrator;
pub mod sampler;
pub mod diagnostics;
pub mod engine;
pub mod scenario;
