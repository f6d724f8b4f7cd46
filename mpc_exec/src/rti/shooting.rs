//! Shooting interval integration
//!
//! Fixed step RK4 is used for the solver's own predictions. Alongside the end
//! state the sensitivities of the end state to the start state and the
//! control are propagated through the same RK4 stages, giving the exact
//! derivative of the discrete map rather than a finite difference.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3, Matrix3x2, SMatrix};

use crate::vehicle::{Control, State, VehicleModel};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sensitivity of a state to `[state, control]`, 3 rows by 5 columns.
type Sensitivity = SMatrix<f64, 3, 5>;

/// Linearisation of one shooting interval about a state and control.
#[derive(Debug, Clone)]
pub struct IntervalLinearisation {
    /// State at the end of the interval.
    pub end_state: State,

    /// Partial derivative of the end state with respect to the start state.
    pub state_jac: Matrix3<f64>,

    /// Partial derivative of the end state with respect to the control.
    pub control_jac: Matrix3x2<f64>
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Integrate the model over `dt_s` holding `control`, using `num_steps` RK4
/// steps.
pub fn integrate(
    model: &VehicleModel,
    state: &State,
    control: &Control,
    dt_s: f64,
    num_steps: usize
) -> State {
    let h = dt_s / num_steps.max(1) as f64;
    let mut y = *state;

    for _ in 0..num_steps.max(1) {
        let k1 = model.derivative(&y, control) * h;
        let k2 = model.derivative(&(y + 0.5 * k1), control) * h;
        let k3 = model.derivative(&(y + 0.5 * k2), control) * h;
        let k4 = model.derivative(&(y + k3), control) * h;
        y += (k1 + 2.0 * (k2 + k3) + k4) / 6.0;
    }

    y
}

/// Integrate the model over `dt_s` and propagate the sensitivities of the
/// end state.
pub fn integrate_with_sensitivities(
    model: &VehicleModel,
    state: &State,
    control: &Control,
    dt_s: f64,
    num_steps: usize
) -> IntervalLinearisation {
    let h = dt_s / num_steps.max(1) as f64;
    let mut y = *state;

    // S = [dy/ds0 | dy/du], starting from [I | 0]
    let mut sens = Sensitivity::zeros();
    sens.fixed_view_mut::<3, 3>(0, 0).fill_with_identity();

    // Derivative of the augmented system (y, S)
    let f = |y: &State, s: &Sensitivity| -> (State, Sensitivity) {
        let (a, b) = model.jacobians(y, control);
        let mut ds = a * s;
        let mut ds_u = ds.fixed_view_mut::<3, 2>(0, 3);
        ds_u += b;
        (model.derivative(y, control), ds)
    };

    for _ in 0..num_steps.max(1) {
        let (k1, l1) = f(&y, &sens);
        let (k2, l2) = f(&(y + 0.5 * h * k1), &(sens + 0.5 * h * l1));
        let (k3, l3) = f(&(y + 0.5 * h * k2), &(sens + 0.5 * h * l2));
        let (k4, l4) = f(&(y + h * k3), &(sens + h * l3));

        y += (k1 + 2.0 * (k2 + k3) + k4) * (h / 6.0);
        sens += (l1 + 2.0 * (l2 + l3) + l4) * (h / 6.0);
    }

    IntervalLinearisation {
        end_state: y,
        state_jac: sens.fixed_view::<3, 3>(0, 0).into_owned(),
        control_jac: sens.fixed_view::<3, 2>(0, 3).into_owned()
    }
}
