//! Per-step problem instance

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Vector3, Vector5};
use util::maths::phase_unwrap;

use super::{HorizonGrid, OcpError, Params};
use crate::reference::ReferenceTrajectory;
use crate::vehicle::{Control, State, VehicleModel};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Snapshot of the tracking problem for one control step.
///
/// The stage cost on interval `k` is
///
/// ```text
/// l_k(s, u) = sum_i W_i * r_i^2,    r = [s - ref_k, u]
/// ```
///
/// with the heading error measured along the shorter arc. If terminal
/// weights are configured `s_N` is also pulled towards the reference at the
/// end of the horizon.
#[derive(Debug, Clone)]
pub struct OcpInstance {
    initial_state: State,
    grid: HorizonGrid,

    /// Reference samples `ref_0..ref_{N-1}`, one per shooting interval
    references: Vec<State>,

    terminal_reference: Option<State>,

    stage_weights: Vector5<f64>,
    terminal_weights: Option<Vector3<f64>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OcpInstance {
    /// Build an instance by sampling the reference on the grid.
    ///
    /// `bounds_tolerance` is the slack allowed when checking the initial
    /// state against the path bounds.
    pub fn new(
        initial_state: State,
        grid: HorizonGrid,
        reference: &ReferenceTrajectory,
        params: &Params,
        model: &VehicleModel,
        bounds_tolerance: f64
    ) -> Result<Self, OcpError> {
        let n = grid.num_intervals();

        let references = (0..n)
            .map(|k| reference.value_at(grid.node_time(k)))
            .collect();

        let terminal_reference = params.terminal_weights
            .map(|_| reference.value_at(grid.node_time(n)));

        Self::from_samples(
            initial_state,
            grid,
            references,
            terminal_reference,
            params,
            model,
            bounds_tolerance
        )
    }

    /// Build an instance from already sampled reference values.
    pub fn from_samples(
        initial_state: State,
        grid: HorizonGrid,
        mut references: Vec<State>,
        terminal_reference: Option<State>,
        params: &Params,
        model: &VehicleModel,
        bounds_tolerance: f64
    ) -> Result<Self, OcpError> {
        let n = grid.num_intervals();

        if n < 1 {
            return Err(OcpError::InfeasibleHorizon(
                "at least one shooting interval is required".into()
            ))
        }

        if references.len() < n {
            return Err(OcpError::InfeasibleHorizon(format!(
                "{} reference samples are needed but only {} are available",
                n, references.len()
            )))
        }
        references.truncate(n);

        check_weights(&params.stage_weights)?;
        if let Some(ref w) = params.terminal_weights {
            check_weights(w)?;
        }

        if params.terminal_weights.is_some() && terminal_reference.is_none() {
            return Err(OcpError::InfeasibleHorizon(
                "a terminal cost is configured but no terminal reference was given".into()
            ))
        }

        if !model.state_in_bounds(&initial_state, bounds_tolerance) {
            return Err(OcpError::InitialStateOutOfBounds(initial_state))
        }

        Ok(Self {
            initial_state,
            grid,
            references,
            terminal_reference: params.terminal_weights.and(terminal_reference),
            stage_weights: Vector5::from(params.stage_weights),
            terminal_weights: params.terminal_weights.map(Vector3::from)
        })
    }

    pub fn initial_state(&self) -> &State {
        &self.initial_state
    }

    pub fn grid(&self) -> &HorizonGrid {
        &self.grid
    }

    pub fn num_intervals(&self) -> usize {
        self.grid.num_intervals()
    }

    /// Reference sample for interval `k`.
    pub fn reference(&self, k: usize) -> &State {
        &self.references[k]
    }

    pub fn terminal_reference(&self) -> Option<&State> {
        self.terminal_reference.as_ref()
    }

    pub fn stage_weights(&self) -> &Vector5<f64> {
        &self.stage_weights
    }

    pub fn terminal_weights(&self) -> Option<&Vector3<f64>> {
        self.terminal_weights.as_ref()
    }

    /// Residual of interval `k` at the given state and control.
    pub fn stage_residual(&self, k: usize, state: &State, control: &Control) -> Vector5<f64> {
        let e = state_error(state, &self.references[k]);
        Vector5::new(e[0], e[1], e[2], control[0], control[1])
    }

    /// Residual of the terminal cost, if there is one.
    pub fn terminal_residual(&self, state: &State) -> Option<Vector3<f64>> {
        self.terminal_reference.as_ref().map(|r| state_error(state, r))
    }

    pub fn stage_cost(&self, k: usize, state: &State, control: &Control) -> f64 {
        let r = self.stage_residual(k, state, control);
        r.component_mul(&r).dot(&self.stage_weights)
    }

    pub fn terminal_cost(&self, state: &State) -> f64 {
        match (self.terminal_residual(state), self.terminal_weights.as_ref()) {
            (Some(r), Some(w)) => r.component_mul(&r).dot(w),
            _ => 0.0
        }
    }

    /// Total cost of a trajectory with `N + 1` states and `N` controls.
    ///
    /// Missing entries are treated as absent terms.
    pub fn objective(&self, states: &[State], controls: &[Control]) -> f64 {
        let n = self.num_intervals();

        let stage: f64 = states.iter()
            .zip(controls)
            .take(n)
            .enumerate()
            .map(|(k, (s, u))| self.stage_cost(k, s, u))
            .sum();

        let terminal = states.get(n).map(|s| self.terminal_cost(s)).unwrap_or(0.0);

        stage + terminal
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Error of a state against a reference, with the heading error taken along
/// the shorter arc.
pub fn state_error(state: &State, reference: &State) -> Vector3<f64> {
    Vector3::new(
        state[0] - reference[0],
        state[1] - reference[1],
        state[2] - phase_unwrap(state[2], reference[2])
    )
}

fn check_weights(weights: &[f64]) -> Result<(), OcpError> {
    if weights.iter().all(|w| w.is_finite() && *w >= 0.0) {
        Ok(())
    }
    else {
        Err(OcpError::InvalidWeights(weights.to_vec()))
    }
}
