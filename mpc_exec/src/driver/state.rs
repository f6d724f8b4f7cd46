//! Closed loop driver state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{error, info};

use super::*;
use crate::rti::{RtiSolver, SolveReport};
use crate::sim::Process;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Orchestrates the solver and the process over a whole run.
pub struct Driver<P: Process> {
    solver: RtiSolver,
    process: P,

    /// Executing mode
    mode: Mode,

    /// Length of one control step, equal to the solver's shooting interval
    step_s: f64,

    /// Number of steps in a full run
    num_steps: usize,

    /// Index of the next step to run
    step_index: usize,

    current_state: State,

    samples: Vec<Sample>,
    reports: Vec<SolveReport>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<P: Process> Driver<P> {
    /// Create a new driver which runs for `total_time_s`.
    ///
    /// The step length is the solver's interval, the run lasts the smallest
    /// whole number of steps reaching `total_time_s` (rounded to absorb
    /// floating point error in the division).
    pub fn new(solver: RtiSolver, process: P, total_time_s: f64) -> Self {
        let step_s = solver.interval_s();
        let ratio = total_time_s / step_s;
        let num_steps = if ratio.is_finite() && ratio > 0.0 {
            let rounded = ratio.round();
            if (ratio - rounded).abs() < 1e-9 { rounded as usize } else { ratio.ceil() as usize }
        }
        else {
            0
        };

        Self {
            solver,
            process,
            mode: Mode::Idle,
            step_s,
            num_steps,
            step_index: 0,
            current_state: State::zeros(),
            samples: Vec::new(),
            reports: Vec::new()
        }
    }

    /// Initialise a run from `initial_state`.
    ///
    /// The state, with its heading wrapped the same way the solver wraps
    /// measurements, must lie within the path bounds exactly. Any previous
    /// run's samples and the solver's warm start are discarded.
    pub fn init(&mut self, initial_state: State) -> Result<(), DriverError> {
        let checked = self.solver.normalise_state(&initial_state);
        if !self.solver.model().state_in_bounds(&checked, 0.0) {
            error!("Initial state {:?} violates the path bounds", initial_state);
            return Err(DriverError::Initialisation(initial_state))
        }

        self.solver.reset();
        self.samples.clear();
        self.reports.clear();
        self.step_index = 0;
        self.current_state = initial_state;
        self.mode = if self.num_steps > 0 { Mode::Running } else { Mode::Finished };

        info!(
            "Driver initialised at {:?}: {} steps of {:.3} s",
            initial_state, self.num_steps, self.step_s
        );

        Ok(())
    }

    /// Run one control step: compute the feedback, advance the process,
    /// record the sample and advance the clock.
    ///
    /// Returns the mode after the step. Any failure halts the run, samples
    /// recorded before the failure are kept.
    pub fn step(&mut self) -> Result<Mode, DriverError> {
        match self.mode {
            Mode::Idle => return Err(DriverError::NotInitialised),
            Mode::Finished | Mode::Halted => return Err(DriverError::RunEnded(self.mode)),
            Mode::Running => ()
        }

        let step = self.step_index;
        let time_s = self.time_s();

        // ---- FEEDBACK ----

        let (control, report) = match self.solver.compute_feedback(&self.current_state, time_s) {
            Ok(r) => r,
            Err(e) => {
                self.mode = Mode::Halted;
                error!("Halting at step {}: {}", step, e);
                return Err(DriverError::Solver { step, time_s, source: e })
            }
        };
        self.reports.push(report);

        // ---- ADVANCE ----

        let next_state = match self.process.advance(&self.current_state, &control, self.step_s) {
            Ok(s) => s,
            Err(e) => {
                self.mode = Mode::Halted;
                error!("Halting at step {}: {}", step, e);
                return Err(DriverError::Process { step, time_s, source: e })
            }
        };

        // ---- RECORD ----

        self.step_index += 1;
        self.current_state = next_state;
        self.samples.push(Sample {
            time_s: self.time_s(),
            state: next_state,
            control
        });

        if self.step_index >= self.num_steps {
            self.mode = Mode::Finished;
        }

        Ok(self.mode)
    }

    /// Run every remaining step.
    pub fn run(&mut self) -> Result<RunSummary, DriverError> {
        while self.step()? == Mode::Running {}

        let summary = RunSummary {
            num_steps: self.step_index,
            final_time_s: self.time_s(),
            final_state: self.current_state,
            num_converged: self.reports.iter().filter(|r| r.converged).count(),
            max_kkt_residual: self.reports.iter().map(|r| r.kkt_residual).fold(0.0, f64::max),
            total_solve_time_s: self.reports.iter().map(|r| r.solve_time_s).sum()
        };

        info!(
            "Run complete: {} steps, final state {:?}, {} of {} solves converged",
            summary.num_steps, summary.final_state, summary.num_converged, self.reports.len()
        );

        Ok(summary)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current simulation time.
    pub fn time_s(&self) -> f64 {
        self.step_index as f64 * self.step_s
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn current_state(&self) -> &State {
        &self.current_state
    }

    /// Samples recorded so far, one per completed step.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Solve reports, one per successful feedback computation.
    pub fn reports(&self) -> &[SolveReport] {
        &self.reports
    }

    pub fn process(&self) -> &P {
        &self.process
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ocp::Params as OcpParams;
    use crate::reference::ReferenceTrajectory;
    use crate::rti::{Params as RtiParams, SolverError};
    use crate::sim::{Params as SimParams, SimError, Simulator};
    use crate::vehicle::{Control, Params as VehicleParams, State, VehicleModel};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;
    use std::sync::Arc;

    /// Plant which is knocked out of the workspace after a number of steps.
    struct DriftingPlant {
        inner: Simulator,
        normal_steps: usize,
        calls: usize
    }

    impl Process for DriftingPlant {
        fn advance(&mut self, state: &State, control: &Control, dt_s: f64) -> Result<State, SimError> {
            self.calls += 1;
            let mut next = self.inner.advance(state, control, dt_s)?;
            if self.calls > self.normal_steps {
                next[1] = -5.0;
            }
            Ok(next)
        }
    }

    fn build(
        waypoints: Vec<State>, horizon: usize
    ) -> (Arc<ReferenceTrajectory>, RtiSolver, Simulator) {
        let reference = Arc::new(ReferenceTrajectory::from_waypoints_over(waypoints, 70.0).unwrap());
        let model = VehicleModel::new(VehicleParams::default()).unwrap();
        let ocp_params = OcpParams {
            horizon_intervals: horizon,
            ..Default::default()
        };
        let solver = RtiSolver::new(
            model.clone(), ocp_params, RtiParams::default(), reference.clone()
        ).unwrap();
        let sim = Simulator::new(&model, SimParams::default()).unwrap();

        (reference, solver, sim)
    }

    fn straight_line(y: f64) -> Vec<State> {
        (0..10).map(|i| State::new(100.0 * i as f64 / 9.0, y, 0.0)).collect()
    }

    #[test]
    fn test_straight_line_tracking() {
        let (reference, solver, sim) = build(straight_line(0.0), 5);
        let mut driver = Driver::new(solver, sim, reference.total_duration());
        assert_eq!(driver.num_steps(), 9);

        driver.init(reference.value_at(0.0)).unwrap();
        let summary = driver.run().unwrap();

        assert_eq!(driver.mode(), Mode::Finished);
        assert_eq!(summary.num_steps, 9);
        assert_eq!(driver.samples().len(), 9);
        assert_eq!(driver.reports().len(), 9);
        assert_abs_diff_eq!(summary.final_time_s, 70.0, epsilon = 1e-9);

        let end = summary.final_state;
        assert!((end[0] - 100.0).abs() <= 5.0, "final x {}", end[0]);
        assert!(end[1].abs() < 2.0, "final y {}", end[1]);
        assert!(end[2].abs() < 0.1, "final heading {}", end[2]);

        // Sample times advance by one interval per step
        let dt = reference.sampling_interval_s();
        for (i, s) in driver.samples().iter().enumerate() {
            assert_abs_diff_eq!(s.time_s, (i + 1) as f64 * dt, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_initial_state_out_of_bounds() {
        let (reference, solver, sim) = build(straight_line(250.0), 5);
        let mut driver = Driver::new(solver, sim, reference.total_duration());

        let res = driver.init(reference.value_at(0.0));
        assert!(matches!(res, Err(DriverError::Initialisation(_))));
        assert_eq!(driver.mode(), Mode::Idle);
        assert!(driver.samples().is_empty());
        assert!(matches!(driver.step(), Err(DriverError::NotInitialised)));
    }

    #[test]
    fn test_halts_when_plant_leaves_bounds() {
        let (reference, solver, sim) = build(straight_line(50.0), 5);
        let plant = DriftingPlant {
            inner: sim,
            normal_steps: 2,
            calls: 0
        };
        let mut driver = Driver::new(solver, plant, reference.total_duration());
        driver.init(reference.value_at(0.0)).unwrap();

        match driver.run() {
            Err(DriverError::Solver { step, source: SolverError::InfeasibleQp(_), .. }) => {
                assert_eq!(step, 3)
            },
            r => panic!("Expected an infeasible QP, got {:?}", r)
        }

        assert_eq!(driver.mode(), Mode::Halted);
        assert_eq!(driver.samples().len(), 3);
        assert_eq!(driver.process().calls, 3);
        assert!(matches!(driver.step(), Err(DriverError::RunEnded(Mode::Halted))));

        // Reinitialising starts a clean run
        driver.init(reference.value_at(0.0)).unwrap();
        assert!(driver.samples().is_empty());
        assert_eq!(driver.mode(), Mode::Running);
    }

    #[test]
    fn test_init_wraps_heading_like_the_solver() {
        // 3.2 rad is outside [-pi, pi] but wraps to a valid heading
        let pose = State::new(150.0, 50.0, 3.2);

        let (reference, solver, sim) = build(straight_line(50.0), 5);
        let mut driver = Driver::new(solver, sim, reference.total_duration());
        driver.init(pose).unwrap();
        assert_eq!(driver.mode(), Mode::Running);
        assert_eq!(driver.current_state(), &pose);

        // Without wrapping the raw heading is checked and rejected
        let model = VehicleModel::new(VehicleParams::default()).unwrap();
        let rti_params = RtiParams {
            wrap_heading: false,
            ..Default::default()
        };
        let solver = RtiSolver::new(
            model.clone(),
            OcpParams { horizon_intervals: 5, ..Default::default() },
            rti_params,
            reference.clone()
        ).unwrap();
        let sim = Simulator::new(&model, SimParams::default()).unwrap();
        let mut driver = Driver::new(solver, sim, reference.total_duration());
        assert!(matches!(driver.init(pose), Err(DriverError::Initialisation(_))));
        assert_eq!(driver.mode(), Mode::Idle);
    }

    #[test]
    fn test_tight_circle_saturates_steering() {
        // Radius 3 needs more steering than pi/3 allows with a 10 m wheelbase,
        // the linearised problem stays feasible and the steering saturates
        let radius = 3.0;
        let waypoints: Vec<State> = (0..40)
            .map(|i| {
                let ang = 2.0 * PI * i as f64 / 39.0;
                State::new(
                    100.0 + radius * ang.cos(),
                    100.0 + radius * ang.sin(),
                    util::maths::wrap_to_pi(ang + PI / 2.0)
                )
            })
            .collect();
        let (reference, solver, sim) = build(waypoints, 10);
        let model = solver.model().clone();
        let mut driver = Driver::new(solver, sim, reference.total_duration());
        driver.init(reference.value_at(0.0)).unwrap();

        let summary = driver.run().unwrap();
        assert_eq!(summary.num_steps, 39);
        assert_eq!(driver.samples().len(), 39);
        assert_eq!(driver.mode(), Mode::Finished);

        for s in driver.samples() {
            assert!(model.control_in_bounds(&s.control, 1e-12));
        }

        let max_steer = driver.samples().iter()
            .map(|s| s.control[1].abs())
            .fold(0.0, f64::max);
        assert_abs_diff_eq!(max_steer, PI / 3.0, epsilon = 1e-9);
    }
}
