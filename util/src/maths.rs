//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Linearly interpolate between `a` and `b` by the fraction `t`.
///
/// `t = 0` gives exactly `a` and `t = 1` gives exactly `b`.
pub fn lerp<T>(a: T, b: T, t: T) -> T
where
    T: Float
{
    if t <= T::zero() {
        a
    }
    else if t >= T::one() {
        b
    }
    else {
        a + (b - a) * t
    }
}

/// Return the euclidian norm (distance between) of two points.
///
/// If the points do not have the same number of dimentions then `None` is
/// returned.
pub fn norm<T>(point_0: &[T], point_1: &[T]) -> Option<T>
where
    T: Float + std::ops::AddAssign
{
    // Check that the dimentions match
    if point_0.len() != point_1.len() {
        return None;
    }

    let mut sum = T::zero();

    for (a, b) in point_0.iter().zip(point_1.iter()) {
        sum += (*a - *b).powi(2);
    }

    Some(sum.sqrt())
}

pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t: T = pi_t + pi_t;

    rem_euclid(angle + pi_t, tau_t) - pi_t
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(0.5f64) - 0.5).abs() < 1e-12);
        assert!((wrap_pi(-0.5f64) + 0.5).abs() < 1e-12);
        assert!((wrap_pi(1.5 * PI) + 0.5 * PI).abs() < 1e-12);
        assert!((wrap_pi(-1.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((wrap_pi(4.0 * PI + 0.25) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_lerp_endpoints_are_exact() {
        let a = 0.1f64;
        let b = 0.7f64;

        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
        assert!((lerp(a, b, 0.5) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_and_norm() {
        assert_eq!(clamp(&2.0f64, &-1.0, &1.0), 1.0);
        assert_eq!(clamp(&-2.0f64, &-1.0, &1.0), -1.0);
        assert_eq!(norm(&[0f64, 0f64], &[3.0, 4.0]), Some(5.0));
        assert_eq!(norm(&[0f64], &[3.0, 4.0]), None);
    }
}
