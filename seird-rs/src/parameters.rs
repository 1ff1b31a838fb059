use serde::{Deserialize, Serialize};

use crate::error::ParameterError;
use crate::model::{Compartments, State};

/// Inputs for one simulation run.
///
/// Rates are per day. Missing fields deserialize to the values of
/// [`Parameters::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Total population N.
    pub population: u64,
    /// Transmission rate β.
    pub beta: f64,
    /// Incubation rate σ, the reciprocal of the mean incubation period.
    pub sigma: f64,
    /// Recovery rate γ, the reciprocal of the mean infectious period.
    pub gamma: f64,
    /// Fraction of infectious outflow that ends in death.
    pub fatality_rate: f64,
    pub initial_infected: u64,
    pub initial_exposed: u64,
    /// Simulation horizon. The trajectory is sampled on days `0..days`.
    pub days: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            population: 1_000_000,
            beta: 0.3,
            sigma: 1.0 / 5.0,
            gamma: 1.0 / 10.0,
            fatality_rate: 0.02,
            initial_infected: 10,
            initial_exposed: 5,
            days: 180,
        }
    }
}

impl Parameters {
    /// Sets σ and γ from mean incubation and infectious periods in days.
    #[must_use]
    pub fn with_periods(mut self, incubation_days: f64, infectious_days: f64) -> Self {
        self.sigma = 1.0 / incubation_days;
        self.gamma = 1.0 / infectious_days;
        self
    }

    /// R0 = β/γ. Infinite when γ is zero.
    pub fn basic_reproduction_number(&self) -> f64 {
        self.beta / self.gamma
    }

    pub fn initial_susceptible(&self) -> f64 {
        self.population as f64 - self.initial_infected as f64 - self.initial_exposed as f64
    }

    /// The state at t = 0: seeded E and I, nobody recovered or dead.
    pub fn initial_state(&self) -> State {
        Compartments {
            susceptible: self.initial_susceptible(),
            exposed: self.initial_exposed as f64,
            infected: self.initial_infected as f64,
            recovered: 0.0,
            dead: 0.0,
        }
        .into()
    }

    /// Checks every precondition of a run. Callers that want to clip an
    /// oversized seed must do so before calling this.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.population == 0 {
            return Err(ParameterError::EmptyPopulation);
        }
        if self.days == 0 {
            return Err(ParameterError::EmptyHorizon);
        }
        let seeded = self.initial_infected.checked_add(self.initial_exposed);
        if seeded.is_none_or(|seeded| seeded > self.population) {
            return Err(ParameterError::SeedExceedsPopulation {
                infected: self.initial_infected,
                exposed: self.initial_exposed,
                population: self.population,
            });
        }
        for (name, value) in [
            ("beta", self.beta),
            ("sigma", self.sigma),
            ("gamma", self.gamma),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ParameterError::InvalidRate { name, value });
            }
        }
        if !(0.0..1.0).contains(&self.fatality_rate) {
            return Err(ParameterError::FatalityRateOutOfRange(self.fatality_rate));
        }
        Ok(())
    }
}
