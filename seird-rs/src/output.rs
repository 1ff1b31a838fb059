use serde::{Deserialize, Serialize};

use crate::model::{Compartments, State};
use crate::solver::SolverStats;

/// Compartment sizes sampled once per day, in columns aligned by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<usize>,
    pub susceptible: Vec<f64>,
    pub exposed: Vec<f64>,
    pub infected: Vec<f64>,
    pub recovered: Vec<f64>,
    pub dead: Vec<f64>,
}

impl Trajectory {
    pub fn with_capacity(len: usize) -> Trajectory {
        Trajectory {
            times: Vec::with_capacity(len),
            susceptible: Vec::with_capacity(len),
            exposed: Vec::with_capacity(len),
            infected: Vec::with_capacity(len),
            recovered: Vec::with_capacity(len),
            dead: Vec::with_capacity(len),
        }
    }

    /// Builds a trajectory from states sampled on days `0..samples.len()`.
    pub fn from_samples(samples: &[State]) -> Trajectory {
        let mut trajectory = Trajectory::with_capacity(samples.len());
        for (day, y) in samples.iter().enumerate() {
            trajectory.times.push(day);
            trajectory.susceptible.push(y[0]);
            trajectory.exposed.push(y[1]);
            trajectory.infected.push(y[2]);
            trajectory.recovered.push(y[3]);
            trajectory.dead.push(y[4]);
        }
        trajectory
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Compartments> {
        (index < self.len()).then(|| Compartments {
            susceptible: self.susceptible[index],
            exposed: self.exposed[index],
            infected: self.infected[index],
            recovered: self.recovered[index],
            dead: self.dead[index],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Compartments)> + '_ {
        (0..self.len()).filter_map(|i| self.get(i).map(|c| (self.times[i], c)))
    }

    /// S+E+I+R+D at every sample.
    pub fn totals(&self) -> Vec<f64> {
        self.iter().map(|(_, c)| c.total()).collect()
    }
}

/// Headline numbers derived from a [`Trajectory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Largest sampled infected count, truncated to a whole number.
    pub peak_infected: u64,
    /// First day on which the sampled peak occurs.
    pub peak_day: usize,
    /// Dead count at the last sampled day, truncated to a whole number.
    pub total_deaths: u64,
}

impl Summary {
    /// Reads the summary off the sampled values only, so it does not depend
    /// on where the solver happened to step.
    pub fn from_trajectory(trajectory: &Trajectory) -> Summary {
        let mut peak: Option<(usize, f64)> = None;
        for (index, &infected) in trajectory.infected.iter().enumerate() {
            if peak.is_none_or(|(_, best)| infected > best) {
                peak = Some((index, infected));
            }
        }
        let (peak_day, peak_infected) = peak
            .map(|(index, value)| (trajectory.times[index], value))
            .unwrap_or_default();
        let total_deaths = trajectory.dead.last().copied().unwrap_or_default();
        Summary {
            peak_infected: peak_infected.trunc() as u64,
            peak_day,
            total_deaths: total_deaths.trunc() as u64,
        }
    }
}

/// Everything one successful run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub trajectory: Trajectory,
    pub summary: Summary,
    pub stats: SolverStats,
}
