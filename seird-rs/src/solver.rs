//! Adaptive integration on a daily grid.
//!
//! [`solve_daily`] hands the system to the `ode_solvers` Dormand–Prince 5(4)
//! stepper with an output interval of one day and reads the solution off its
//! dense output. Every stage, the update and the interpolant are linear
//! combinations of right-hand-side evaluations, so any linear invariant of
//! the system (total population, for instance) is preserved up to rounding.

use log::debug;
use ode_solvers::dop_shared::{IntegrationError as StepperError, OutputType, System};
use ode_solvers::dopri5::Dopri5;
use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;
use crate::model::State;

const SAFETY_FACTOR: f64 = 0.9;
const STEP_BETA: f64 = 0.04;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const STIFFNESS_CHECK_INTERVAL: u32 = 1000;

/// Error tolerances and step limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// First step size. Chosen by the stepper when `None`.
    pub first_step: Option<f64>,
    /// Upper bound on the step size.
    pub max_step: f64,
    /// Upper bound on steps taken by the stepper.
    pub max_steps: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            first_step: None,
            max_step: f64::INFINITY,
            max_steps: 100_000,
        }
    }
}

impl SolverOptions {
    fn validate(&self) -> Result<u32, IntegrationError> {
        let invalid = |msg: &str| Err(IntegrationError::InvalidOptions(msg.to_string()));
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return invalid("rtol must be finite and > 0");
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return invalid("atol must be finite and > 0");
        }
        if self.max_step.is_nan() || self.max_step <= 0.0 {
            return invalid("max_step must be > 0");
        }
        if let Some(h) = self.first_step
            && (!h.is_finite() || h <= 0.0)
        {
            return invalid("first_step must be finite and > 0");
        }
        match u32::try_from(self.max_steps) {
            Ok(0) => invalid("max_steps must be > 0"),
            Ok(n) => Ok(n),
            Err(_) => invalid("max_steps does not fit in 32 bits"),
        }
    }
}

/// Work done by one call to [`solve_daily`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub function_evaluations: usize,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

/// Solution values on days `0..days`.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub samples: Vec<State>,
    pub stats: SolverStats,
}

fn is_finite(y: &State) -> bool {
    y.iter().all(|x| x.is_finite())
}

/// Integrates `system` from `y0` at day 0 to day `days` and returns the
/// solution at days `0..days`. The endpoint is integrated but not sampled.
///
/// The sample at day 0 is `y0` itself. Solution values are returned as
/// computed; nothing is clipped.
pub fn solve_daily<F>(
    system: F,
    y0: State,
    days: usize,
    options: &SolverOptions,
) -> Result<SolverOutput, IntegrationError>
where
    F: System<f64, State>,
{
    let max_steps = options.validate()?;
    if days == 0 {
        return Ok(SolverOutput {
            samples: Vec::new(),
            stats: SolverStats::default(),
        });
    }

    let mut f0 = State::zeros();
    system.system(0.0, &y0, &mut f0);
    if !is_finite(&y0) || !is_finite(&f0) {
        return Err(IntegrationError::NonFiniteState { t: 0.0 });
    }

    let t_end = days as f64;
    let mut stepper = Dopri5::from_param(
        system,
        0.0,
        t_end,
        1.0,
        y0,
        options.rtol,
        options.atol,
        SAFETY_FACTOR,
        STEP_BETA,
        MIN_FACTOR,
        MAX_FACTOR,
        options.max_step.min(t_end),
        options.first_step.unwrap_or(0.0),
        max_steps,
        STIFFNESS_CHECK_INTERVAL,
        OutputType::Dense,
    );

    let stats = match stepper.integrate() {
        Ok(stats) => SolverStats {
            function_evaluations: stats.num_eval as usize,
            accepted_steps: stats.accepted_steps as usize,
            rejected_steps: stats.rejected_steps as usize,
        },
        Err(StepperError::MaxNumStepReached { x, .. }) => {
            return Err(IntegrationError::MaxStepsExceeded {
                t: x,
                max_steps: options.max_steps,
            });
        }
        Err(StepperError::StepSizeUnderflow { x }) => {
            return Err(IntegrationError::StepSizeTooSmall { t: x });
        }
        Err(StepperError::StiffnessDetected { x }) => {
            return Err(IntegrationError::StiffnessDetected { t: x });
        }
    };

    let samples: Vec<State> = stepper
        .x_out()
        .iter()
        .zip(stepper.y_out())
        .take_while(|(t, _)| **t < t_end)
        .map(|(_, y)| *y)
        .collect();
    if samples.len() != days {
        return Err(IntegrationError::MissingSamples {
            expected: days,
            produced: samples.len(),
        });
    }
    if let Some(day) = samples.iter().position(|y| !is_finite(y)) {
        return Err(IntegrationError::NonFiniteState { t: day as f64 });
    }

    debug!(
        "integrated [0, {days}]: {} accepted, {} rejected, {} evaluations",
        stats.accepted_steps, stats.rejected_steps, stats.function_evaluations
    );
    Ok(SolverOutput { samples, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Each component decays at its own rate `k + 1`.
    struct Decay;

    impl System<f64, State> for Decay {
        fn system(&self, _t: f64, y: &State, dy: &mut State) {
            for (k, (d, v)) in dy.iter_mut().zip(y.iter()).enumerate() {
                *d = -(k as f64 + 1.0) * v;
            }
        }
    }

    /// y' = -k (y - cos t) in every component: stiff for large k.
    struct Stiff(f64);

    impl System<f64, State> for Stiff {
        fn system(&self, t: f64, y: &State, dy: &mut State) {
            *dy = y.map(|v| -self.0 * (v - t.cos()));
        }
    }

    struct Broken;

    impl System<f64, State> for Broken {
        fn system(&self, _t: f64, _y: &State, dy: &mut State) {
            *dy = State::repeat(f64::NAN);
        }
    }

    #[test]
    fn test_exponential_decay_on_daily_grid() {
        let output = solve_daily(Decay, State::repeat(1.0), 6, &SolverOptions::default()).unwrap();
        assert_eq!(output.samples.len(), 6);
        for (day, y) in output.samples.iter().enumerate() {
            for (k, v) in y.iter().enumerate() {
                let expected = (-(k as f64 + 1.0) * day as f64).exp();
                assert_relative_eq!(*v, expected, max_relative = 1e-4, epsilon = 1e-8);
            }
        }
        assert!(output.stats.accepted_steps > 0);
        assert!(output.stats.function_evaluations > output.stats.accepted_steps);
    }

    #[test]
    fn test_first_sample_is_initial_value() {
        let y0 = State::new(3.25, 1.0, 0.5, 0.0, 2.0);
        let output = solve_daily(Decay, y0, 3, &SolverOptions::default()).unwrap();
        assert_eq!(output.samples[0], y0);
    }

    #[test]
    fn test_zero_days_is_empty() {
        let output = solve_daily(Decay, State::repeat(1.0), 0, &SolverOptions::default()).unwrap();
        assert!(output.samples.is_empty());
        assert_eq!(output.stats, SolverStats::default());
    }

    #[test]
    fn test_max_step_bounds_step_count() {
        let options = SolverOptions {
            max_step: 0.1,
            ..SolverOptions::default()
        };
        let output = solve_daily(Decay, State::repeat(1.0), 2, &options).unwrap();
        assert!(output.stats.accepted_steps >= 20);
    }

    #[test]
    fn test_stiff_problem_fails() {
        let options = SolverOptions {
            max_steps: 1000,
            ..SolverOptions::default()
        };
        let result = solve_daily(Stiff(1e6), State::zeros(), 10, &options);
        assert!(matches!(
            result,
            Err(IntegrationError::MaxStepsExceeded {
                max_steps: 1000,
                ..
            }) | Err(IntegrationError::StiffnessDetected { .. })
        ));
    }

    #[test]
    fn test_non_finite_derivative() {
        let result = solve_daily(Broken, State::repeat(1.0), 1, &SolverOptions::default());
        assert_eq!(result.unwrap_err(), IntegrationError::NonFiniteState { t: 0.0 });
    }

    #[test]
    fn test_rejects_bad_options() {
        for options in [
            SolverOptions {
                rtol: 0.0,
                ..SolverOptions::default()
            },
            SolverOptions {
                atol: f64::NAN,
                ..SolverOptions::default()
            },
            SolverOptions {
                first_step: Some(-1.0),
                ..SolverOptions::default()
            },
            SolverOptions {
                max_steps: 0,
                ..SolverOptions::default()
            },
            SolverOptions {
                max_steps: usize::MAX,
                ..SolverOptions::default()
            },
        ] {
            assert!(matches!(
                solve_daily(Decay, State::repeat(1.0), 1, &options),
                Err(IntegrationError::InvalidOptions(_))
            ));
        }
    }
}
