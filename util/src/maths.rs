//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Saturate a value to the closed range `[min, max]`.
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        // Servo pulse mapping, angle over actuation range to pulse width
        assert_eq!(lin_map((0f64, 180f64), (750f64, 2250f64), 0f64), 750f64);
        assert_eq!(lin_map((0f64, 180f64), (750f64, 2250f64), 180f64), 2250f64);
        assert_eq!(lin_map((0f64, 180f64), (750f64, 2250f64), 90f64), 1500f64);

        // Throttle over [-1, 1], zero maps to the middle of the range
        assert_eq!(lin_map((-1f64, 1f64), (750f64, 2250f64), 0f64), 1500f64);

        // Inverted target ranges are allowed
        assert_eq!(lin_map((0f64, 1f64), (1f64, 0f64), 0.25f64), 0.75f64);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&0.5f64, &0f64, &1f64), 0.5f64);
        assert_eq!(clamp(&-2f64, &0f64, &1f64), 0f64);
        assert_eq!(clamp(&2f64, &0f64, &1f64), 1f64);

        // Values on the bound stay on the bound
        assert_eq!(clamp(&1f64, &0f64, &1f64), 1f64);
    }
}
