use log::debug;

use crate::error::SimulationError;
use crate::model::SeirdModel;
use crate::output::{SimulationOutput, Summary, Trajectory};
use crate::parameters::Parameters;
use crate::solver::{SolverOptions, solve_daily};

/// Runs one simulation with the default solver options.
pub fn simulate(parameters: &Parameters) -> Result<SimulationOutput, SimulationError> {
    simulate_with(parameters, &SolverOptions::default())
}

/// Integrates the model over `[0, days]` and samples it on days
/// `0, 1, ..., days - 1`.
///
/// Parameters are validated before the solver runs. On failure no
/// trajectory is returned.
pub fn simulate_with(
    parameters: &Parameters,
    options: &SolverOptions,
) -> Result<SimulationOutput, SimulationError> {
    parameters.validate()?;
    debug!(
        "simulating {} days for population {} (R0 = {:.3})",
        parameters.days,
        parameters.population,
        parameters.basic_reproduction_number()
    );

    let model = SeirdModel::new(parameters);
    let solution = solve_daily(model, parameters.initial_state(), parameters.days, options)?;

    let trajectory = Trajectory::from_samples(&solution.samples);
    let summary = Summary::from_trajectory(&trajectory);
    Ok(SimulationOutput {
        trajectory,
        summary,
        stats: solution.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IntegrationError, ParameterError};
    use crate::model::Compartments;
    use approx::assert_relative_eq;

    /// Slack for quantities that are monotone in the exact solution.
    const MONOTONE_SLACK: f64 = 1e-6;

    #[test]
    fn test_reference_scenario() {
        let parameters = Parameters::default();
        let output = simulate(&parameters).unwrap();
        let trajectory = &output.trajectory;
        assert_eq!(trajectory.len(), 180);
        assert_eq!(trajectory.times.first(), Some(&0));
        assert_eq!(trajectory.times.last(), Some(&179));

        // Susceptibles start at N - I0 - E0 and end far below N.
        assert_eq!(trajectory.susceptible[0], 999_985.0);
        assert!(trajectory.susceptible[179] < 500_000.0);

        // A single peak strictly inside the horizon.
        let summary = output.summary;
        assert!(summary.peak_infected > parameters.initial_infected);
        assert!(summary.peak_day > 0 && summary.peak_day < 179);
        let infected = &trajectory.infected;
        for day in 1..=summary.peak_day {
            assert!(infected[day] >= infected[day - 1] - MONOTONE_SLACK);
        }
        for day in summary.peak_day + 1..infected.len() {
            assert!(infected[day] <= infected[day - 1] + MONOTONE_SLACK);
        }
        assert!(infected[179] < infected[summary.peak_day] / 10.0);

        // Deaths are the fatality share of everyone who left I.
        let last = trajectory.get(179).unwrap();
        assert_eq!(trajectory.dead[0], 0.0);
        assert!(last.dead > 0.0);
        assert_relative_eq!(
            last.dead,
            parameters.fatality_rate * (last.recovered + last.dead),
            max_relative = 1e-6
        );
        assert_eq!(summary.total_deaths, last.dead.trunc() as u64);
    }

    #[test]
    fn test_population_is_conserved() {
        for parameters in [
            Parameters::default(),
            Parameters {
                beta: 0.9,
                fatality_rate: 0.08,
                days: 365,
                ..Parameters::default()
            }
            .with_periods(2.0, 4.0),
            Parameters {
                population: 1000,
                initial_infected: 1,
                initial_exposed: 1,
                ..Parameters::default()
            },
        ] {
            let output = simulate(&parameters).unwrap();
            let n = parameters.population as f64;
            for total in output.trajectory.totals() {
                assert_relative_eq!(total, n, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_deaths_never_decrease_and_susceptibles_never_grow() {
        let parameters = Parameters {
            beta: 0.6,
            fatality_rate: 0.05,
            days: 300,
            ..Parameters::default()
        };
        let trajectory = simulate(&parameters).unwrap().trajectory;
        for pair in trajectory.dead.windows(2) {
            assert!(pair[1] >= pair[0] - MONOTONE_SLACK);
        }
        for pair in trajectory.susceptible.windows(2) {
            assert!(pair[1] <= pair[0] + MONOTONE_SLACK);
        }
    }

    #[test]
    fn test_no_transmission() {
        let parameters = Parameters {
            beta: 0.0,
            initial_infected: 100,
            initial_exposed: 50,
            days: 365,
            ..Parameters::default()
        };
        let trajectory = simulate(&parameters).unwrap().trajectory;
        let s0 = parameters.initial_susceptible();
        for s in &trajectory.susceptible {
            assert_eq!(*s, s0);
        }
        for pair in trajectory.exposed.windows(2) {
            assert!(pair[1] <= pair[0] + MONOTONE_SLACK);
        }
        // I may rise briefly while exposed individuals finish incubating,
        // but must not exceed the initial seed and must die out.
        let seeded = (parameters.initial_infected + parameters.initial_exposed) as f64;
        assert!(trajectory.infected.iter().all(|&i| i <= seeded));
        let last = trajectory.get(364).unwrap();
        assert!(last.exposed < 1e-6);
        assert!(last.infected < 1e-3);
    }

    #[test]
    fn test_no_transmission_without_exposed() {
        let parameters = Parameters {
            beta: 0.0,
            initial_infected: 100,
            initial_exposed: 0,
            ..Parameters::default()
        };
        let trajectory = simulate(&parameters).unwrap().trajectory;
        for pair in trajectory.infected.windows(2) {
            assert!(pair[1] <= pair[0] + MONOTONE_SLACK);
        }
        assert_eq!(trajectory.exposed.iter().copied().fold(0.0, f64::max), 0.0);
    }

    #[test]
    fn test_small_negative_values_are_not_clipped() {
        // Once I has decayed to the size of the absolute tolerance the
        // solution wanders slightly below zero; it must come back as is.
        let mut found_negative = false;
        for infectious_days in [0.5, 0.25, 0.1] {
            let parameters = Parameters {
                beta: 0.0,
                initial_infected: 100,
                days: 365,
                ..Parameters::default()
            }
            .with_periods(1.0, infectious_days);
            let trajectory = simulate(&parameters).unwrap().trajectory;
            assert!(trajectory.infected.iter().all(|i| i.abs() <= 100.0));
            found_negative |= trajectory
                .exposed
                .iter()
                .chain(&trajectory.infected)
                .any(|&v| v < 0.0);
        }
        assert!(found_negative);
    }

    #[test]
    fn test_single_day_is_initial_condition() {
        let parameters = Parameters {
            days: 1,
            ..Parameters::default()
        };
        let output = simulate(&parameters).unwrap();
        assert_eq!(output.trajectory.times, vec![0]);
        assert_eq!(
            output.trajectory.get(0).unwrap(),
            Compartments::from(parameters.initial_state())
        );
        assert_eq!(output.summary.peak_infected, 10);
        assert_eq!(output.summary.total_deaths, 0);
    }

    #[test]
    fn test_rejects_oversized_seed_before_solving() {
        let parameters = Parameters {
            population: 10,
            initial_infected: 8,
            initial_exposed: 3,
            ..Parameters::default()
        };
        assert_eq!(
            simulate(&parameters),
            Err(SimulationError::InvalidParameter(
                ParameterError::SeedExceedsPopulation {
                    infected: 8,
                    exposed: 3,
                    population: 10,
                }
            ))
        );
    }

    #[test]
    fn test_rejects_negative_rate() {
        let parameters = Parameters {
            sigma: -1.0,
            ..Parameters::default()
        };
        assert!(matches!(
            simulate(&parameters),
            Err(SimulationError::InvalidParameter(
                ParameterError::InvalidRate { name: "sigma", .. }
            ))
        ));
    }

    #[test]
    fn test_integration_failure_is_reported() {
        let options = SolverOptions {
            max_steps: 5,
            ..SolverOptions::default()
        };
        assert!(matches!(
            simulate_with(&Parameters::default(), &options),
            Err(SimulationError::Integration(
                IntegrationError::MaxStepsExceeded { max_steps: 5, .. }
            ))
        ));
    }

    #[test]
    fn test_fast_dynamics_exhaust_step_budget() {
        // An infectious period of a fraction of a second forces tiny steps.
        let parameters = Parameters::default().with_periods(5.0, 1e-7);
        let options = SolverOptions {
            max_steps: 10_000,
            ..SolverOptions::default()
        };
        assert!(matches!(
            simulate_with(&parameters, &options),
            Err(SimulationError::Integration(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let parameters = Parameters {
            beta: 0.45,
            ..Parameters::default()
        };
        assert_eq!(simulate(&parameters), simulate(&parameters));
    }

    #[test]
    fn test_looser_tolerance_gives_similar_summary() {
        let parameters = Parameters::default();
        let fine = simulate(&parameters).unwrap();
        let coarse = simulate_with(
            &parameters,
            &SolverOptions {
                rtol: 1e-3,
                atol: 1e-6,
                ..SolverOptions::default()
            },
        )
        .unwrap();
        assert!(coarse.stats.accepted_steps < fine.stats.accepted_steps);
        assert_relative_eq!(
            coarse.summary.peak_infected as f64,
            fine.summary.peak_infected as f64,
            max_relative = 1e-2
        );
    }
}
