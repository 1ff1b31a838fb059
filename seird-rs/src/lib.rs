//! Deterministic SEIRD epidemic model.
//!
//! A homogeneous population moves through Susceptible, Exposed, Infected,
//! Recovered and Dead compartments. [`simulate`] integrates the model with
//! an adaptive Runge–Kutta solver, samples it once per day and derives the
//! peak infected count and total deaths.
//!
//! ```
//! use seird::{Parameters, simulate};
//!
//! let output = simulate(&Parameters::default()).unwrap();
//! assert_eq!(output.trajectory.len(), 180);
//! assert!(output.summary.peak_infected > 10);
//! ```

pub mod error;
pub mod model;
pub mod output;
pub mod parameters;
pub mod simulation;
pub mod solver;
pub mod sweep;

pub use error::{IntegrationError, ParameterError, SimulationError};
pub use model::{Compartments, SeirdModel, State};
pub use output::{SimulationOutput, Summary, Trajectory};
pub use parameters::Parameters;
pub use simulation::{simulate, simulate_with};
pub use solver::{SolverOptions, SolverStats};
pub use sweep::{sweep, sweep_with};
