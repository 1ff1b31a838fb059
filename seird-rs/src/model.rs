//! The SEIRD right-hand side.
//!
//! The state vector is ordered `(S, E, I, R, D)`. The infectious outflow
//! `γ·I` is split between `R` and `D` by the fatality rate, so the five
//! derivatives always sum to zero and the total population is conserved.

use nalgebra::SVector;
use ode_solvers::dop_shared::System;
use serde::{Deserialize, Serialize};

use crate::parameters::Parameters;

pub const COMPARTMENTS: usize = 5;

/// `(S, E, I, R, D)` as a column vector.
pub type State = SVector<f64, COMPARTMENTS>;

/// Named view of a [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compartments {
    pub susceptible: f64,
    pub exposed: f64,
    pub infected: f64,
    pub recovered: f64,
    pub dead: f64,
}

impl Compartments {
    pub fn total(&self) -> f64 {
        self.susceptible + self.exposed + self.infected + self.recovered + self.dead
    }
}

impl From<Compartments> for State {
    fn from(c: Compartments) -> Self {
        State::new(c.susceptible, c.exposed, c.infected, c.recovered, c.dead)
    }
}

impl From<State> for Compartments {
    fn from(y: State) -> Self {
        Compartments {
            susceptible: y[0],
            exposed: y[1],
            infected: y[2],
            recovered: y[3],
            dead: y[4],
        }
    }
}

/// Rate constants bound for the lifetime of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeirdModel {
    population: f64,
    beta: f64,
    sigma: f64,
    gamma: f64,
    fatality_rate: f64,
}

impl SeirdModel {
    pub fn new(parameters: &Parameters) -> SeirdModel {
        SeirdModel {
            population: parameters.population as f64,
            beta: parameters.beta,
            sigma: parameters.sigma,
            gamma: parameters.gamma,
            fatality_rate: parameters.fatality_rate,
        }
    }

    /// `dy/dt` at state `y`. The model is autonomous, so time does not appear.
    pub fn derivative(&self, y: &State) -> State {
        let (s, e, i) = (y[0], y[1], y[2]);
        let infection = self.beta * s * i / self.population;
        let incubation = self.sigma * e;
        let outflow = self.gamma * i;
        let deaths = outflow * self.fatality_rate;
        State::new(
            -infection,
            infection - incubation,
            incubation - outflow,
            outflow - deaths,
            deaths,
        )
    }
}

impl System<f64, State> for SeirdModel {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        *dy = self.derivative(y);
    }
}
