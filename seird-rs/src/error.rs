use thiserror::Error;

/// A precondition on [`Parameters`](crate::parameters::Parameters) that does
/// not hold. Detected before the solver is invoked.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("population must be positive")]
    EmptyPopulation,

    #[error("simulation horizon must be at least one day")]
    EmptyHorizon,

    #[error(
        "initial infected ({infected}) plus initial exposed ({exposed}) exceeds population ({population})"
    )]
    SeedExceedsPopulation {
        infected: u64,
        exposed: u64,
        population: u64,
    },

    #[error("rate `{name}` must be finite and non-negative, got {value}")]
    InvalidRate { name: &'static str, value: f64 },

    #[error("fatality rate must lie in [0, 1), got {0}")]
    FatalityRateOutOfRange(f64),
}

/// The adaptive solver gave up before reaching the end of the interval.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("step budget of {max_steps} exhausted at t = {t}")]
    MaxStepsExceeded { t: f64, max_steps: usize },

    #[error("step size fell below the resolution of t = {t}")]
    StepSizeTooSmall { t: f64 },

    #[error("problem became stiff at t = {t}")]
    StiffnessDetected { t: f64 },

    #[error("non-finite value encountered at t = {t}")]
    NonFiniteState { t: f64 },

    #[error("invalid solver options: {0}")]
    InvalidOptions(String),

    #[error("solver produced {produced} daily samples, expected {expected}")]
    MissingSamples { expected: usize, produced: usize },
}

/// Everything that can go wrong in a single simulation run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ParameterError),

    #[error("integration failed: {0}")]
    Integration(#[from] IntegrationError),

    #[error("could not build thread pool: {0}")]
    ThreadPool(String),
}
