//! Gauss-Newton QP subproblem
//!
//! The QP is posed in the step `dz` from the current linearisation point:
//!
//! ```text
//! min  1/2 dz' P dz + q' dz
//! s.t. A_eq dz = b_eq        (initial value and continuity)
//!      A_in dz <= b_in       (path and control bounds)
//! ```
//!
//! with `P = diag(W) + lambda I` and `q = W h`, where `h` is the stacked
//! residual at the linearisation point.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT}
};
use log::warn;
use nalgebra::{DMatrix, DVector};

use super::{IntervalLinearisation, QpStatus, SolverError};
use crate::ocp::OcpInstance;
use crate::vehicle::{Control, State, VehicleModel, CONTROL_DIM, STATE_DIM};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Size of one `(s_k, u_k)` block of the decision vector.
const NODE_BLOCK: usize = STATE_DIM + CONTROL_DIM;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One assembled QP subproblem.
pub(crate) struct QpProblem {
    hessian_diag: DVector<f64>,
    gradient: DVector<f64>,
    eq_mat: DMatrix<f64>,
    eq_rhs: DVector<f64>,
    ineq_mat: DMatrix<f64>,
    ineq_rhs: DVector<f64>
}

/// Solution of a QP subproblem.
pub(crate) struct QpSolution {
    pub step: DVector<f64>,
    pub status: QpStatus,
    pub iterations: u32
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Length of the decision vector for `n` intervals.
pub(crate) fn num_decision_vars(n: usize) -> usize {
    NODE_BLOCK * n + STATE_DIM
}

/// Offset of `s_k` in the decision vector.
pub(crate) fn state_idx(k: usize) -> usize {
    NODE_BLOCK * k
}

/// Offset of `u_k` in the decision vector.
pub(crate) fn control_idx(k: usize) -> usize {
    NODE_BLOCK * k + STATE_DIM
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl QpProblem {
    /// Assemble the QP about the trajectory `(states, controls)`.
    ///
    /// `lins[k]` must be the linearisation of interval `k` about
    /// `(states[k], controls[k])`.
    pub fn assemble(
        ocp: &OcpInstance,
        model: &VehicleModel,
        states: &[State],
        controls: &[Control],
        lins: &[IntervalLinearisation],
        levenberg_marquardt: f64
    ) -> Self {
        let n = ocp.num_intervals();
        let nz = num_decision_vars(n);

        // ---- COST ----

        let mut hessian_diag = DVector::from_element(nz, levenberg_marquardt);
        let mut gradient = DVector::zeros(nz);
        let w = ocp.stage_weights();

        for k in 0..n {
            let h = ocp.stage_residual(k, &states[k], &controls[k]);

            for i in 0..STATE_DIM {
                hessian_diag[state_idx(k) + i] += w[i];
                gradient[state_idx(k) + i] = w[i] * h[i];
            }
            for j in 0..CONTROL_DIM {
                hessian_diag[control_idx(k) + j] += w[STATE_DIM + j];
                gradient[control_idx(k) + j] = w[STATE_DIM + j] * h[STATE_DIM + j];
            }
        }

        if let (Some(h), Some(wt)) = (ocp.terminal_residual(&states[n]), ocp.terminal_weights()) {
            for i in 0..STATE_DIM {
                hessian_diag[state_idx(n) + i] += wt[i];
                gradient[state_idx(n) + i] = wt[i] * h[i];
            }
        }

        // ---- EQUALITIES ----

        let mut eq_mat = DMatrix::zeros(STATE_DIM * (n + 1), nz);
        let mut eq_rhs = DVector::zeros(STATE_DIM * (n + 1));

        // Initial value, ds_0 = s_meas - s_0
        eq_mat.fixed_view_mut::<STATE_DIM, STATE_DIM>(0, state_idx(0)).fill_with_identity();
        eq_rhs.fixed_rows_mut::<STATE_DIM>(0)
            .copy_from(&(ocp.initial_state() - states[0]));

        // Continuity, ds_{k+1} - G_x ds_k - G_u du_k = phi(s_k, u_k) - s_{k+1}
        for k in 0..n {
            let row = STATE_DIM * (k + 1);
            eq_mat.fixed_view_mut::<STATE_DIM, STATE_DIM>(row, state_idx(k + 1))
                .fill_with_identity();
            eq_mat.fixed_view_mut::<STATE_DIM, STATE_DIM>(row, state_idx(k))
                .copy_from(&(-lins[k].state_jac));
            eq_mat.fixed_view_mut::<STATE_DIM, CONTROL_DIM>(row, control_idx(k))
                .copy_from(&(-lins[k].control_jac));
            eq_rhs.fixed_rows_mut::<STATE_DIM>(row)
                .copy_from(&(lins[k].end_state - states[k + 1]));
        }

        // ---- INEQUALITIES ----

        // Box bounds on s_1..s_N and u_0..u_{N-1}, each as an upper and a
        // lower row. s_0 is pinned by the initial value constraint.
        let num_bounded = (STATE_DIM + CONTROL_DIM) * n;
        let mut ineq_mat = DMatrix::zeros(2 * num_bounded, nz);
        let mut ineq_rhs = DVector::zeros(2 * num_bounded);
        let mut row = 0;

        let s_lo = model.state_lower_bounds();
        let s_hi = model.state_upper_bounds();
        let u_lo = model.control_lower_bounds();
        let u_hi = model.control_upper_bounds();

        let mut add_box = |col: usize, value: f64, lo: f64, hi: f64| {
            ineq_mat[(row, col)] = 1.0;
            ineq_rhs[row] = hi - value;
            ineq_mat[(row + 1, col)] = -1.0;
            ineq_rhs[row + 1] = value - lo;
            row += 2;
        };

        for k in 1..=n {
            for i in 0..STATE_DIM {
                add_box(state_idx(k) + i, states[k][i], s_lo[i], s_hi[i]);
            }
        }
        for k in 0..n {
            for j in 0..CONTROL_DIM {
                add_box(control_idx(k) + j, controls[k][j], u_lo[j], u_hi[j]);
            }
        }

        Self {
            hessian_diag,
            gradient,
            eq_mat,
            eq_rhs,
            ineq_mat,
            ineq_rhs
        }
    }

    /// Solve the QP.
    ///
    /// Primal infeasibility is reported as `SolverError::InfeasibleQp`.
    /// Statuses which still carry a finite step (iteration or time limits,
    /// slow progress) are accepted with a warning.
    pub fn solve(&self, max_iterations: u32) -> Result<QpSolution, SolverError> {
        let p = diag_to_csc(&self.hessian_diag);

        let num_eq = self.eq_mat.nrows();
        let num_ineq = self.ineq_mat.nrows();
        let mut a_all = DMatrix::zeros(num_eq + num_ineq, self.eq_mat.ncols());
        a_all.rows_mut(0, num_eq).copy_from(&self.eq_mat);
        a_all.rows_mut(num_eq, num_ineq).copy_from(&self.ineq_mat);
        let a = dmatrix_to_csc(&a_all);

        let mut b: Vec<f64> = Vec::with_capacity(num_eq + num_ineq);
        b.extend(self.eq_rhs.iter());
        b.extend(self.ineq_rhs.iter());

        let q: Vec<f64> = self.gradient.iter().copied().collect();

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if num_eq > 0 {
            cones.push(ZeroConeT(num_eq));
        }
        if num_ineq > 0 {
            cones.push(NonnegativeConeT(num_ineq));
        }

        let settings = DefaultSettingsBuilder::default()
            .max_iter(max_iterations)
            .verbose(false)
            .build()
            .map_err(|e| SolverError::InvalidParams(format!("{:?}", e)))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings)
            .map_err(|e| SolverError::QpFailure(format!("{:?}", e)))?;

        solver.solve();

        let sol = &solver.solution;

        let status = match sol.status {
            SolverStatus::Solved => QpStatus::Solved,
            SolverStatus::AlmostSolved => QpStatus::AlmostSolved,
            SolverStatus::MaxIterations
            | SolverStatus::MaxTime
            | SolverStatus::InsufficientProgress => {
                warn!("QP stopped early ({:?}), using its last iterate", sol.status);
                QpStatus::Inaccurate
            },
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(SolverError::InfeasibleQp(format!("{:?}", sol.status)))
            },
            ref s => return Err(SolverError::QpFailure(format!("{:?}", s)))
        };

        if sol.x.len() != self.gradient.len() || !sol.x.iter().all(|v| v.is_finite()) {
            return Err(SolverError::QpFailure(format!(
                "{:?} returned a non-finite step", sol.status
            )))
        }

        Ok(QpSolution {
            step: DVector::from_column_slice(&sol.x),
            status,
            iterations: sol.iterations
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a dense matrix to compressed sparse column form, dropping zeros.
fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Diagonal matrix in compressed sparse column form. The diagonal is its own
/// upper triangle.
fn diag_to_csc(d: &DVector<f64>) -> CscMatrix<f64> {
    let n = d.len();

    CscMatrix::new(
        n,
        n,
        (0..=n).collect(),
        (0..n).collect(),
        d.iter().copied().collect()
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_layout() {
        assert_eq!(num_decision_vars(25), 128);
        assert_eq!(state_idx(0), 0);
        assert_eq!(control_idx(0), 3);
        assert_eq!(state_idx(2), 10);
        assert_eq!(control_idx(2), 13);
        assert_eq!(state_idx(25), 125);
    }

    #[test]
    fn test_dmatrix_to_csc() {
        let m = DMatrix::from_row_slice(2, 3, &[
            1.0, 0.0, 2.0,
            0.0, 3.0, 0.0
        ]);
        let csc = dmatrix_to_csc(&m);
        assert_eq!(csc.colptr, vec![0, 1, 2, 3]);
        assert_eq!(csc.rowval, vec![0, 1, 0]);
        assert_eq!(csc.nzval, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_box_qp() {
        // min 1/2 (x - 2)^2 + 1/2 (y + 1)^2, x + y = 0, x <= 1
        let qp = QpProblem {
            hessian_diag: DVector::from_vec(vec![1.0, 1.0]),
            gradient: DVector::from_vec(vec![-2.0, 1.0]),
            eq_mat: DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            eq_rhs: DVector::from_vec(vec![0.0]),
            ineq_mat: DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            ineq_rhs: DVector::from_vec(vec![1.0])
        };

        let sol = qp.solve(200).unwrap();
        assert_eq!(sol.status, QpStatus::Solved);
        assert_abs_diff_eq!(sol.step[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.step[1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible_qp() {
        // x <= -1 and -x <= -1 cannot both hold
        let qp = QpProblem {
            hessian_diag: DVector::from_vec(vec![1.0]),
            gradient: DVector::from_vec(vec![0.0]),
            eq_mat: DMatrix::zeros(0, 1),
            eq_rhs: DVector::zeros(0),
            ineq_mat: DMatrix::from_row_slice(2, 1, &[1.0, -1.0]),
            ineq_rhs: DVector::from_vec(vec![-1.0, -1.0])
        };

        assert!(matches!(qp.solve(200), Err(SolverError::InfeasibleQp(_))));
    }
}
