//! Process simulator
//!
//! Stands in for the real vehicle. The model's ODE is integrated with an
//! adaptive Runge-Kutta-Fehlberg 7(8) scheme, finer than the fixed RK4 steps
//! the solver predicts with.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;

use log::trace;
use rkf78::{OdeSystem, Rkf78, Tolerances};
use thiserror::Error;

use crate::vehicle::{Control, ModelError, State, VehicleModel, STATE_DIM};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A process which can be advanced under a held control.
pub trait Process {
    /// Advance `state` by `dt_s` seconds holding `control`.
    fn advance(&mut self, state: &State, control: &Control, dt_s: f64) -> Result<State, SimError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Adaptive step simulator of the vehicle.
#[derive(Debug, Clone)]
pub struct Simulator {
    model: VehicleModel,
    params: Params,
    stats: SimStats
}

/// Running integration statistics, summed over every call to `advance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub fn_evals: usize
}

/// The plant ODE under a zero-order held control.
struct HeldControlPlant<'a> {
    model: &'a VehicleModel,
    control: Control
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while simulating.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("The integrator failed: {0}")]
    Integration(String),

    #[error("The state became non-finite: {0:?}")]
    NonFiniteState(State),

    #[error("Cannot build the plant model: {0}")]
    PlantModel(#[from] ModelError),

    #[error("Invalid simulator parameters: {0}")]
    InvalidParams(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Simulator {
    /// Create a simulator of `model`, with the plant's wheelbase overriden by
    /// the parameters if set.
    pub fn new(model: &VehicleModel, params: Params) -> Result<Self, SimError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !(positive(params.rel_tolerance) || positive(params.abs_tolerance)) {
            return Err(SimError::InvalidParams("a positive tolerance is required".into()))
        }
        if params.rel_tolerance < 0.0 || params.abs_tolerance < 0.0 {
            return Err(SimError::InvalidParams("tolerances must be non-negative".into()))
        }
        if !positive(params.initial_step_s) {
            return Err(SimError::InvalidParams("the initial step must be positive".into()))
        }

        let model = match params.wheelbase_m {
            Some(l) => model.with_wheelbase(l)?,
            None => model.clone()
        };

        Ok(Self {
            model,
            params,
            stats: SimStats::default()
        })
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// The plant model being integrated.
    pub fn model(&self) -> &VehicleModel {
        &self.model
    }
}

impl Process for Simulator {
    fn advance(&mut self, state: &State, control: &Control, dt_s: f64) -> Result<State, SimError> {
        if !state.iter().all(|v| v.is_finite()) {
            return Err(SimError::NonFiniteState(*state))
        }

        let plant = HeldControlPlant {
            model: &self.model,
            control: *control
        };
        let y0 = [state[0], state[1], state[2]];

        let mut solver = Rkf78::new(Tolerances::with_components(
            [self.params.abs_tolerance; STATE_DIM],
            [self.params.rel_tolerance; STATE_DIM]
        ));
        let result = solver.integrate(
            &plant, 0.0, &y0, dt_s, self.params.initial_step_s.min(dt_s)
        );

        self.stats.accepted_steps += solver.stats.accepted_steps as usize;
        self.stats.rejected_steps += solver.stats.rejected_steps as usize;
        self.stats.fn_evals += solver.stats.fn_evals as usize;

        let (_, y) = result.map_err(|e| SimError::Integration(format!("{:?}", e)))?;
        let next = State::new(y[0], y[1], y[2]);

        if !next.iter().all(|v| v.is_finite()) {
            return Err(SimError::NonFiniteState(next))
        }

        trace!(
            "Advanced {} s in {} accepted steps",
            dt_s, solver.stats.accepted_steps
        );

        Ok(next)
    }
}

impl<'a> OdeSystem<STATE_DIM> for HeldControlPlant<'a> {
    fn rhs(&self, _t: f64, y: &[f64; STATE_DIM], dydt: &mut [f64; STATE_DIM]) {
        let d = self.model.derivative(&State::new(y[0], y[1], y[2]), &self.control);
        dydt.copy_from_slice(d.as_slice());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::Params as VehicleParams;
    use approx::assert_abs_diff_eq;

    fn model() -> VehicleModel {
        VehicleModel::new(VehicleParams::default()).unwrap()
    }

    #[test]
    fn test_straight_line() {
        let mut sim = Simulator::new(&model(), Params::default()).unwrap();
        let next = sim.advance(&State::new(10.0, 20.0, 0.0), &Control::new(2.0, 0.0), 7.5).unwrap();
        assert_abs_diff_eq!(next, State::new(25.0, 20.0, 0.0), epsilon = 1e-9);
        assert!(sim.stats().accepted_steps > 0);
    }

    #[test]
    fn test_matches_circular_arc() {
        let mut sim = Simulator::new(&model(), Params::default()).unwrap();
        let steer = 0.5f64;
        let speed = 3.0;
        let dt = 70.0 / 9.0;
        let radius = 10.0 / steer.tan();

        let next = sim.advance(&State::new(100.0, 100.0, 0.0), &Control::new(speed, steer), dt)
            .unwrap();

        let ang = speed * dt / radius;
        let expected = State::new(
            100.0 + radius * ang.sin(),
            100.0 + radius * (1.0 - ang.cos()),
            ang
        );
        assert_abs_diff_eq!(next, expected, epsilon = 1e-6);
        assert!(sim.stats().fn_evals > sim.stats().accepted_steps);
    }

    #[test]
    fn test_plant_wheelbase_override() {
        let params = Params {
            wheelbase_m: Some(5.0),
            ..Default::default()
        };
        let mut sim = Simulator::new(&model(), params).unwrap();
        assert_abs_diff_eq!(sim.model().wheelbase_m(), 5.0);

        let next = sim.advance(&State::new(100.0, 100.0, 0.0), &Control::new(1.0, 0.2), 1.0)
            .unwrap();
        assert_abs_diff_eq!(next[2], 0.2f64.tan() / 5.0, epsilon = 1e-9);

        let params = Params {
            wheelbase_m: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(Simulator::new(&model(), params), Err(SimError::PlantModel(_))));
    }

    #[test]
    fn test_stats_accumulate() {
        let mut sim = Simulator::new(&model(), Params::default()).unwrap();
        let state = State::new(100.0, 100.0, 0.0);
        let control = Control::new(2.0, 0.3);

        sim.advance(&state, &control, 1.0).unwrap();
        let first = sim.stats();
        assert!(first.accepted_steps > 0);

        sim.advance(&state, &control, 1.0).unwrap();
        let second = sim.stats();
        assert_eq!(second.accepted_steps, 2 * first.accepted_steps);
        assert_eq!(second.fn_evals, 2 * first.fn_evals);
    }

    #[test]
    fn test_invalid_params() {
        let params = Params {
            initial_step_s: 0.0,
            ..Default::default()
        };
        assert!(matches!(Simulator::new(&model(), params), Err(SimError::InvalidParams(_))));

        let params = Params {
            rel_tolerance: 0.0,
            abs_tolerance: 0.0,
            ..Default::default()
        };
        assert!(matches!(Simulator::new(&model(), params), Err(SimError::InvalidParams(_))));
    }

    #[test]
    fn test_non_finite_state() {
        let mut sim = Simulator::new(&model(), Params::default()).unwrap();
        let res = sim.advance(&State::new(f64::NAN, 0.0, 0.0), &Control::new(1.0, 0.0), 1.0);
        assert!(matches!(res, Err(SimError::NonFiniteState(_))));
    }
}
