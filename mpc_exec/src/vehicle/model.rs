//! Vehicle model evaluation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3, Matrix3x2};
use thiserror::Error;

use super::{Control, Params, State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The kinematic bicycle model together with its path and control bounds.
#[derive(Debug, Clone)]
pub struct VehicleModel {
    params: Params
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised when building a model from invalid parameters.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("The wheelbase must be positive and finite, found {0}")]
    InvalidWheelbase(f64),

    #[error("The {0} bounds must be finite and ordered as [min, max], found {1:?}")]
    InvalidBounds(&'static str, [f64; 2])
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleModel {
    /// Create a new model, checking the parameters.
    pub fn new(params: Params) -> Result<Self, ModelError> {
        if !(params.wheelbase_m.is_finite() && params.wheelbase_m > 0.0) {
            return Err(ModelError::InvalidWheelbase(params.wheelbase_m))
        }

        let named = [
            ("x", params.x_bounds_m),
            ("y", params.y_bounds_m),
            ("heading", params.heading_bounds_rad),
            ("speed", params.speed_bounds_ms),
            ("steer", params.steer_bounds_rad)
        ];
        for (name, b) in named.iter() {
            if !(b[0].is_finite() && b[1].is_finite() && b[0] <= b[1]) {
                return Err(ModelError::InvalidBounds(*name, *b))
            }
        }

        Ok(Self { params })
    }

    /// Get a copy of this model with a different wheelbase but the same
    /// bounds.
    pub fn with_wheelbase(&self, wheelbase_m: f64) -> Result<Self, ModelError> {
        let mut params = self.params.clone();
        params.wheelbase_m = wheelbase_m;
        Self::new(params)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn wheelbase_m(&self) -> f64 {
        self.params.wheelbase_m
    }

    /// Continuous time state derivative for the given state and control.
    pub fn derivative(&self, state: &State, control: &Control) -> State {
        let speed_ms = control[0];
        let steer_rad = control[1];
        let heading_rad = state[2];

        State::new(
            speed_ms * heading_rad.cos(),
            speed_ms * heading_rad.sin(),
            speed_ms * steer_rad.tan() / self.params.wheelbase_m
        )
    }

    /// Partial derivatives of `derivative` with respect to the state and the
    /// control, returned as `(A, B)`.
    pub fn jacobians(&self, state: &State, control: &Control) -> (Matrix3<f64>, Matrix3x2<f64>) {
        let speed_ms = control[0];
        let steer_rad = control[1];
        let (sin_h, cos_h) = state[2].sin_cos();
        let cos_steer = steer_rad.cos();
        let l = self.params.wheelbase_m;

        let a = Matrix3::new(
            0.0, 0.0, -speed_ms * sin_h,
            0.0, 0.0,  speed_ms * cos_h,
            0.0, 0.0,  0.0
        );

        let b = Matrix3x2::new(
            cos_h,                 0.0,
            sin_h,                 0.0,
            steer_rad.tan() / l,   speed_ms / (l * cos_steer * cos_steer)
        );

        (a, b)
    }

    /// Lower bounds of the state, `[x, y, heading]`.
    pub fn state_lower_bounds(&self) -> State {
        State::new(
            self.params.x_bounds_m[0],
            self.params.y_bounds_m[0],
            self.params.heading_bounds_rad[0]
        )
    }

    /// Upper bounds of the state, `[x, y, heading]`.
    pub fn state_upper_bounds(&self) -> State {
        State::new(
            self.params.x_bounds_m[1],
            self.params.y_bounds_m[1],
            self.params.heading_bounds_rad[1]
        )
    }

    /// Lower bounds of the control, `[speed, steer]`.
    pub fn control_lower_bounds(&self) -> Control {
        Control::new(self.params.speed_bounds_ms[0], self.params.steer_bounds_rad[0])
    }

    /// Upper bounds of the control, `[speed, steer]`.
    pub fn control_upper_bounds(&self) -> Control {
        Control::new(self.params.speed_bounds_ms[1], self.params.steer_bounds_rad[1])
    }

    /// Largest amount by which any element of the state lies outside its
    /// bounds. Zero if the state is inside, infinite if it isn't finite.
    pub fn state_bound_violation(&self, state: &State) -> f64 {
        bound_violation(
            state.as_slice(),
            self.state_lower_bounds().as_slice(),
            self.state_upper_bounds().as_slice()
        )
    }

    /// Check the state against the path bounds, allowing `tolerance` of
    /// slack.
    pub fn state_in_bounds(&self, state: &State, tolerance: f64) -> bool {
        self.state_bound_violation(state) <= tolerance
    }

    /// Check the control against the control bounds, allowing `tolerance` of
    /// slack.
    pub fn control_in_bounds(&self, control: &Control, tolerance: f64) -> bool {
        bound_violation(
            control.as_slice(),
            self.control_lower_bounds().as_slice(),
            self.control_upper_bounds().as_slice()
        ) <= tolerance
    }

    /// Clamp a control into the control bounds.
    pub fn clamp_control(&self, control: &Control) -> Control {
        control.sup(&self.control_lower_bounds()).inf(&self.control_upper_bounds())
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn bound_violation(values: &[f64], lower: &[f64], upper: &[f64]) -> f64 {
    let mut violation = 0f64;

    for ((v, lo), hi) in values.iter().zip(lower).zip(upper) {
        if !v.is_finite() {
            return f64::INFINITY
        }
        violation = violation.max(lo - v).max(v - hi);
    }

    violation
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn model() -> VehicleModel {
        VehicleModel::new(Params::default()).unwrap()
    }

    #[test]
    fn test_derivative_straight() {
        let m = model();
        let d = m.derivative(&State::new(10.0, 10.0, 0.0), &Control::new(2.0, 0.0));
        assert_abs_diff_eq!(d, State::new(2.0, 0.0, 0.0), epsilon = 1e-12);

        let d = m.derivative(&State::new(10.0, 10.0, PI / 2.0), &Control::new(2.0, 0.0));
        assert_abs_diff_eq!(d, State::new(0.0, 2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_derivative_finite_within_bounds() {
        let m = model();
        let n = 24;

        for i in 0..=n {
            let heading = -PI + 2.0 * PI * (i as f64) / (n as f64);
            for j in 0..=n {
                let speed = -10.0 + 20.0 * (j as f64) / (n as f64);
                for k in 0..=n {
                    let steer = -PI / 3.0 + 2.0 * PI / 3.0 * (k as f64) / (n as f64);
                    let d = m.derivative(
                        &State::new(100.0, 50.0, heading),
                        &Control::new(speed, steer)
                    );
                    assert!(d.iter().all(|v| v.is_finite()));
                }
            }
        }
    }

    #[test]
    fn test_jacobians_match_finite_difference() {
        let m = model();
        let s = State::new(20.0, 30.0, 0.7);
        let u = Control::new(3.0, 0.4);
        let (a, b) = m.jacobians(&s, &u);
        let h = 1e-6;

        for j in 0..3 {
            let mut sp = s;
            let mut sm = s;
            sp[j] += h;
            sm[j] -= h;
            let col = (m.derivative(&sp, &u) - m.derivative(&sm, &u)) / (2.0 * h);
            assert_abs_diff_eq!(col, a.column(j).into_owned(), epsilon = 1e-6);
        }

        for j in 0..2 {
            let mut up = u;
            let mut um = u;
            up[j] += h;
            um[j] -= h;
            let col = (m.derivative(&s, &up) - m.derivative(&s, &um)) / (2.0 * h);
            assert_abs_diff_eq!(col, b.column(j).into_owned(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_bounds() {
        let m = model();
        assert!(m.state_in_bounds(&State::new(0.0, 200.0, PI), 0.0));
        assert!(!m.state_in_bounds(&State::new(0.0, 250.0, 0.0), 0.0));
        assert_abs_diff_eq!(m.state_bound_violation(&State::new(-1.0, 250.0, 0.0)), 50.0);
        assert!(!m.state_in_bounds(&State::new(f64::NAN, 0.0, 0.0), 1.0));

        assert!(m.control_in_bounds(&Control::new(10.0, -PI / 3.0), 1e-12));
        assert!(!m.control_in_bounds(&Control::new(11.0, 0.0), 0.0));

        let c = m.clamp_control(&Control::new(-20.0, 2.0));
        assert_abs_diff_eq!(c, Control::new(-10.0, PI / 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        let mut p = Params::default();
        p.wheelbase_m = 0.0;
        assert!(matches!(VehicleModel::new(p), Err(ModelError::InvalidWheelbase(_))));

        let mut p = Params::default();
        p.steer_bounds_rad = [1.0, -1.0];
        assert!(matches!(VehicleModel::new(p), Err(ModelError::InvalidBounds("steer", _))));
    }
}
