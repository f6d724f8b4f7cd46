//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Linearly interpolate between `a` and `b` by the fraction `frac`.
///
/// `frac` is not clamped, values outside [0, 1] extrapolate.
pub fn lin_interp<T: Float>(a: T, b: T, frac: T) -> T {
    a + (b - a) * frac
}

/// Clamp a value into `[min, max]`.
///
/// NaN values are passed through unchanged.
pub fn clamp<T: Float>(value: T, min: T, max: T) -> T {
    if value > max {
        max
    }
    else if value < min {
        min
    }
    else {
        value
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
pub fn rem_euclid<T: Float>(lhs: T, rhs: T) -> T {
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_to_pi<T: Float + FloatConst>(angle: T) -> T {
    if !angle.is_finite() {
        return angle;
    }

    let wrapped = T::PI() - rem_euclid(T::PI() - angle, T::TAU());

    // The upper bound is inclusive, -pi maps to pi
    if wrapped <= -T::PI() {
        wrapped + T::TAU()
    }
    else {
        wrapped
    }
}

/// Get the signed shortest angular distance going from `a` to `b`.
///
/// The result lies in (-pi, pi].
pub fn ang_dist<T: Float + FloatConst>(a: T, b: T) -> T {
    wrap_to_pi(b - a)
}

/// Shift `b` by whole turns so that it lies within pi of `a`.
///
/// Infinite inputs are returned untouched.
pub fn phase_unwrap<T: Float + FloatConst>(a: T, b: T) -> T {
    if a.is_infinite() || b.is_infinite() {
        return b;
    }

    a + ang_dist(a, b)
}

/// Interpolate between two angles along the shortest arc, returning a value
/// wrapped into (-pi, pi].
pub fn ang_interp<T: Float + FloatConst>(a: T, b: T, frac: T) -> T {
    wrap_to_pi(a + ang_dist(a, b) * frac)
}
