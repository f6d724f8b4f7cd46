//! Real-time iteration solver state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace};
use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Instant;
use util::maths::{clamp, phase_unwrap, wrap_to_pi};

use super::qp::{control_idx, state_idx, QpProblem};
use super::*;
use crate::ocp::{HorizonGrid, OcpError, OcpInstance, Params as OcpParams};
use crate::reference::ReferenceTrajectory;
use crate::vehicle::{Control, State, VehicleModel, CONTROL_DIM, HEADING_IDX, STATE_DIM};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Receding horizon tracking solver.
///
/// Owns the warm start buffer, which persists between calls and is only
/// cleared by `reset`.
pub struct RtiSolver {
    model: VehicleModel,
    ocp_params: OcpParams,
    params: Params,
    reference: Arc<ReferenceTrajectory>,

    warm_start: Option<WarmStart>
}

/// Predicted trajectory from the previous call.
#[derive(Debug, Clone)]
struct WarmStart {
    window_start_s: f64,
    states: Vec<State>,
    controls: Vec<Control>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RtiSolver {
    /// Create a new solver tracking `reference`.
    ///
    /// The shooting interval is the reference sampling interval so that the
    /// window advances at the same cadence as the reference.
    pub fn new(
        model: VehicleModel,
        ocp_params: OcpParams,
        params: Params,
        reference: Arc<ReferenceTrajectory>
    ) -> Result<Self, SolverError> {
        if ocp_params.horizon_intervals < 1 {
            return Err(SolverError::Ocp(OcpError::InfeasibleHorizon(
                "at least one shooting interval is required".into()
            )))
        }
        if params.max_iterations < 1 {
            return Err(SolverError::InvalidParams(
                "max_iterations must be at least 1".into()
            ))
        }
        if params.integrator_steps < 1 {
            return Err(SolverError::InvalidParams(
                "integrator_steps must be at least 1".into()
            ))
        }
        if !(params.levenberg_marquardt >= 0.0 && params.levenberg_marquardt.is_finite()) {
            return Err(SolverError::InvalidParams(format!(
                "levenberg_marquardt must be non-negative, found {}", params.levenberg_marquardt
            )))
        }
        if !(params.feasibility_tolerance >= 0.0) {
            return Err(SolverError::InvalidParams(format!(
                "feasibility_tolerance must be non-negative, found {}",
                params.feasibility_tolerance
            )))
        }

        Ok(Self {
            model,
            ocp_params,
            params,
            reference,
            warm_start: None
        })
    }

    pub fn horizon_intervals(&self) -> usize {
        self.ocp_params.horizon_intervals
    }

    /// Length of one shooting interval.
    pub fn interval_s(&self) -> f64 {
        self.reference.sampling_interval_s()
    }

    pub fn model(&self) -> &VehicleModel {
        &self.model
    }

    /// Forget the warm start, the next call initialises from the reference.
    pub fn reset(&mut self) {
        self.warm_start = None;
    }

    /// Whether a warm start from a previous call is held.
    pub fn is_warm(&self) -> bool {
        self.warm_start.is_some()
    }

    /// State trajectory predicted by the last successful call.
    pub fn predicted_states(&self) -> Option<&[State]> {
        self.warm_start.as_ref().map(|w| w.states.as_slice())
    }

    /// Control trajectory predicted by the last successful call.
    pub fn predicted_controls(&self) -> Option<&[Control]> {
        self.warm_start.as_ref().map(|w| w.controls.as_slice())
    }

    /// The measured state as the solver sees it, with the heading wrapped into
    /// (-pi, pi] when heading wrapping is enabled.
    pub fn normalise_state(&self, state: &State) -> State {
        let mut normalised = *state;
        if self.params.wrap_heading {
            normalised[HEADING_IDX] = wrap_to_pi(normalised[HEADING_IDX]);
        }
        normalised
    }

    /// Compute the feedback control for the measured `state` at `time_s`.
    ///
    /// The horizon window starts at `time_s`. Returns the first control of
    /// the optimised trajectory, clamped into the control bounds, and a report
    /// of the solve.
    pub fn compute_feedback(
        &mut self, state: &State, time_s: f64
    ) -> Result<(Control, SolveReport), SolverError> {
        let start_time = Instant::now();

        // ---- PREPARE ----

        let measured = self.normalise_state(state);

        let grid = HorizonGrid::new(time_s, self.interval_s(), self.horizon_intervals())?;

        let ocp = OcpInstance::new(
            measured,
            grid,
            &self.reference,
            &self.ocp_params,
            &self.model,
            self.params.feasibility_tolerance
        ).map_err(|e| match e {
            OcpError::InitialStateOutOfBounds(s) => SolverError::InfeasibleQp(format!(
                "the measured state {:?} at t = {:.3} s lies outside the path bounds",
                s, time_s
            )),
            e => SolverError::Ocp(e)
        })?;

        let (mut states, mut controls) = self.initial_guess(&ocp);

        // ---- ITERATE ----

        let n = ocp.num_intervals();
        let mut iterations = 0;
        let mut converged = false;
        let mut kkt_residual = f64::INFINITY;
        let mut qp_status = QpStatus::Solved;
        let mut qp_iterations = 0;

        while iterations < self.params.max_iterations {
            iterations += 1;

            // Linearise every interval about the current iterate
            let lins: Vec<IntervalLinearisation> = (0..n)
                .map(|k| integrate_with_sensitivities(
                    &self.model,
                    &states[k],
                    &controls[k],
                    grid.interval_s(),
                    self.params.integrator_steps
                ))
                .collect();

            let defect = lins.iter()
                .zip(states.iter().skip(1))
                .map(|(l, s)| (l.end_state - s).amax())
                .fold((ocp.initial_state() - states[0]).amax(), f64::max);

            let qp = QpProblem::assemble(
                &ocp,
                &self.model,
                &states,
                &controls,
                &lins,
                self.params.levenberg_marquardt
            );
            let sol = qp.solve(self.params.max_qp_iterations)?;
            qp_status = qp_status.max(sol.status);
            qp_iterations += sol.iterations;

            // Full Gauss-Newton step
            for k in 0..=n {
                states[k] += sol.step.fixed_rows::<STATE_DIM>(state_idx(k));
            }
            for k in 0..n {
                controls[k] += sol.step.fixed_rows::<CONTROL_DIM>(control_idx(k));
            }

            kkt_residual = sol.step.amax().max(defect);

            trace!(
                "t = {:.3} s, iteration {}: step {:.3e}, defect {:.3e}",
                time_s, iterations, sol.step.amax(), defect
            );

            if kkt_residual < self.params.kkt_tolerance {
                converged = true;
                break;
            }
        }

        // ---- EXTRACT ----

        let feedback = self.model.clamp_control(&controls[0]);
        let objective = ocp.objective(&states, &controls);

        self.warm_start = Some(WarmStart {
            window_start_s: time_s,
            states,
            controls
        });

        let report = SolveReport {
            time_s,
            iterations,
            converged,
            kkt_residual,
            objective,
            qp_status,
            qp_iterations,
            solve_time_s: start_time.elapsed().as_secs_f64()
        };

        debug!(
            "t = {:.3} s: u = [{:.4}, {:.4}], {} iterations, KKT {:.3e}, objective {:.4e}",
            time_s, feedback[0], feedback[1], iterations, kkt_residual, objective
        );

        Ok((feedback, report))
    }

    /// Initial guess for the iterations.
    ///
    /// The previous prediction is shifted by the number of whole intervals
    /// elapsed since its window started, or the guess is built from the
    /// reference if there's no usable prediction. Node 0 is always the
    /// measured state, other headings are moved by whole turns to lie close
    /// to it.
    fn initial_guess(&self, ocp: &OcpInstance) -> (Vec<State>, Vec<Control>) {
        let measured = *ocp.initial_state();

        let (mut states, controls) = match self.shifted_guess(ocp) {
            Some(g) => g,
            None => self.cold_guess(ocp)
        };

        let turns = ((measured[HEADING_IDX] - states[0][HEADING_IDX]) / TAU).round();
        if turns != 0.0 {
            for s in states.iter_mut() {
                s[HEADING_IDX] += turns * TAU;
            }
        }
        states[0] = measured;

        (states, controls)
    }

    /// Shift the previous prediction forward to the current window.
    fn shifted_guess(&self, ocp: &OcpInstance) -> Option<(Vec<State>, Vec<Control>)> {
        let prev = self.warm_start.as_ref()?;
        let grid = ocp.grid();
        let n = grid.num_intervals();

        if prev.controls.len() != n || prev.states.len() != grid.num_nodes() {
            return None
        }

        let shift = ((grid.start_s() - prev.window_start_s) / grid.interval_s()).round();
        if !(shift >= 0.0 && shift < n as f64) {
            return None
        }
        let shift = shift as usize;

        let mut states = prev.states[shift..].to_vec();
        let mut controls = prev.controls[shift..].to_vec();

        // Hold the last control over the freed intervals
        for _ in 0..shift {
            let last_u = controls.last().copied().unwrap_or_else(Control::zeros);
            let last_s = states.last().copied().unwrap_or(*ocp.initial_state());
            states.push(integrate(
                &self.model, &last_s, &last_u, grid.interval_s(), self.params.integrator_steps
            ));
            controls.push(last_u);
        }

        Some((states, controls))
    }

    /// Build a guess from the reference window.
    ///
    /// Speeds are seeded from the reference progress along each interval so
    /// the first linearisation isn't made at standstill, where steering has
    /// no effect.
    fn cold_guess(&self, ocp: &OcpInstance) -> (Vec<State>, Vec<Control>) {
        let grid = ocp.grid();
        let n = grid.num_intervals();
        let dt = grid.interval_s();
        let speed_bounds = self.model.params().speed_bounds_ms;

        let mut states = Vec::with_capacity(grid.num_nodes());
        states.push(*ocp.initial_state());

        for k in 1..=n {
            let r = if k < n {
                *ocp.reference(k)
            }
            else {
                self.reference.value_at(grid.node_time(n))
            };
            let prev_heading = states[k - 1][HEADING_IDX];
            states.push(State::new(r[0], r[1], phase_unwrap(prev_heading, r[2])));
        }

        let controls = (0..n)
            .map(|k| {
                let (sin_h, cos_h) = states[k][HEADING_IDX].sin_cos();
                let delta = states[k + 1] - states[k];
                let speed = (delta[0] * cos_h + delta[1] * sin_h) / dt;
                Control::new(clamp(speed, speed_bounds[0], speed_bounds[1]), 0.0)
            })
            .collect();

        (states, controls)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle::Params as VehicleParams;
    use approx::assert_abs_diff_eq;

    fn line_reference() -> Arc<ReferenceTrajectory> {
        let wps = (0..10)
            .map(|i| State::new(100.0 * i as f64 / 9.0, 50.0, 0.0))
            .collect();
        Arc::new(ReferenceTrajectory::from_waypoints_over(wps, 70.0).unwrap())
    }

    fn solver(reference: Arc<ReferenceTrajectory>, params: Params) -> RtiSolver {
        let ocp_params = OcpParams {
            horizon_intervals: 5,
            ..Default::default()
        };
        RtiSolver::new(
            VehicleModel::new(VehicleParams::default()).unwrap(),
            ocp_params,
            params,
            reference
        ).unwrap()
    }

    #[test]
    fn test_first_step_tracks_reference_speed() {
        let r = line_reference();
        let speed = 100.0 / 70.0;
        let mut s = solver(r.clone(), Params::default());

        let (u, report) = s.compute_feedback(&r.value_at(0.0), 0.0).unwrap();
        assert_abs_diff_eq!(u[0], speed, epsilon = 1e-3);
        assert_abs_diff_eq!(u[1], 0.0, epsilon = 1e-4);
        assert!(report.iterations >= 1);
        assert!(s.is_warm());
        assert_eq!(s.predicted_states().map(|p| p.len()), Some(6));
        assert_eq!(s.predicted_controls().map(|p| p.len()), Some(5));
    }

    #[test]
    fn test_warm_start_idempotence() {
        let r = line_reference();
        let params = Params {
            max_iterations: 30,
            ..Default::default()
        };
        let mut s = solver(r.clone(), params);
        let state = State::new(12.0, 51.0, 0.1);
        let t = r.sampling_interval_s();

        let (u1, _) = s.compute_feedback(&state, t).unwrap();
        let (u2, report) = s.compute_feedback(&state, t).unwrap();

        assert_abs_diff_eq!(u1, u2, epsilon = 1e-5);
        assert!(report.kkt_residual.is_finite());
    }

    #[test]
    fn test_shift_and_reset() {
        let r = line_reference();
        let mut s = solver(r.clone(), Params::default());
        let dt = r.sampling_interval_s();

        s.compute_feedback(&r.value_at(0.0), 0.0).unwrap();
        let prev = s.predicted_states().unwrap().to_vec();

        // Shifted guess starts where the old prediction's node 1 was
        let grid = HorizonGrid::new(dt, dt, 5).unwrap();
        let ocp = OcpInstance::new(
            prev[1], grid, &r, &s.ocp_params, &s.model, 1e-6
        ).unwrap();
        let (states, controls) = s.shifted_guess(&ocp).unwrap();
        assert_abs_diff_eq!(states[0], prev[1], epsilon = 1e-12);
        assert_abs_diff_eq!(states[4], prev[5], epsilon = 1e-12);
        assert_eq!(controls.len(), 5);
        assert_eq!(controls[4], controls[3]);

        s.reset();
        assert!(!s.is_warm());
        assert!(s.shifted_guess(&ocp).is_none());
    }

    #[test]
    fn test_heading_wrap() {
        let wps = (0..10)
            .map(|i| State::new(150.0 - 100.0 * i as f64 / 9.0, 50.0, std::f64::consts::PI))
            .collect();
        let r = Arc::new(ReferenceTrajectory::from_waypoints_over(wps, 70.0).unwrap());
        let mut s = solver(r, Params::default());

        // Same pose as the reference start, heading given a whole turn out
        let (u, _) = s.compute_feedback(
            &State::new(150.0, 50.0, -std::f64::consts::PI + 2.0 * TAU), 0.0
        ).unwrap();
        assert!(u[0] > 0.0);
        assert!(u[1].abs() < 1e-3);
    }

    #[test]
    fn test_measured_state_out_of_bounds() {
        let r = line_reference();
        let mut s = solver(r, Params::default());
        let res = s.compute_feedback(&State::new(50.0, -1.0, 0.0), 0.0);
        assert!(matches!(res, Err(SolverError::InfeasibleQp(_))));
        assert!(!s.is_warm());
    }

    #[test]
    fn test_invalid_params() {
        let r = line_reference();
        let model = VehicleModel::new(VehicleParams::default()).unwrap();
        let params = Params {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            RtiSolver::new(model.clone(), OcpParams::default(), params, r.clone()),
            Err(SolverError::InvalidParams(_))
        ));

        let ocp_params = OcpParams {
            horizon_intervals: 0,
            ..Default::default()
        };
        assert!(matches!(
            RtiSolver::new(model, ocp_params, Params::default(), r),
            Err(SolverError::Ocp(OcpError::InfeasibleHorizon(_)))
        ));
    }
}
