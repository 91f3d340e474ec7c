/// Magnitude from which every `f64` is a whole number (2^53).
const WHOLE_NUMBERS_FROM: f64 = 9_007_199_254_740_992.0;

/// Final normalisation applied to every calculated value.
///
/// Non-finite results (typically a division by a zero tonnage) become `0`,
/// finite results are rounded to two decimals with ties away from zero.
pub fn sanitize(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    if value.abs() >= WHOLE_NUMBERS_FROM {
        // scaling by 100 could overflow and there is nothing to round
        return value;
    }
    // adding 0.0 folds -0.0 into 0.0
    (value * 100.0).round() / 100.0 + 0.0
}

#[cfg(test)]
mod tests {
    use super::sanitize;

    #[test]
    fn degenerate_values_become_zero() {
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(f64::NEG_INFINITY), 0.0);
        assert_eq!(sanitize(0.0 / 0.0), 0.0);
    }

    #[test]
    fn huge_finite_values_pass_through() {
        assert_eq!(sanitize(f64::MAX), f64::MAX);
        assert_eq!(sanitize(-f64::MAX), -f64::MAX);
        assert_eq!(sanitize(1e300), 1e300);
        assert_eq!(sanitize(1e16 + 2.0), 1e16 + 2.0);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(sanitize(12.423), 12.42);
        assert_eq!(sanitize(0.125), 0.13);
        assert_eq!(sanitize(-0.125), -0.13);
        assert_eq!(sanitize(33.0), 33.0);
        assert_eq!(sanitize(-12.4449), -12.44);
    }

    #[test]
    fn negative_zero_is_normalised() {
        let value = sanitize(-0.001);
        assert_eq!(value, 0.0);
        assert!(value.is_sign_positive());
    }

    #[test]
    fn rounded_values_print_with_at_most_two_decimals() {
        for raw in [1.0 / 3.0, 2.0 / 3.0, 1234.56789, -98.7654, 0.1 + 0.2] {
            let printed = sanitize(raw).to_string();
            let decimals = printed.split('.').nth(1).map(str::len).unwrap_or(0);
            assert!(decimals <= 2, "{raw} -> {printed}");
        }
    }
}
