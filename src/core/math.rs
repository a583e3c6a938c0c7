//! Rounding helpers shared by billing and statistics

/// Round to `decimals` places, halves away from zero
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round to 2 decimal places (money, most statistics)
pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Round to 3 decimal places (correlation)
pub fn round3(value: f64) -> f64 {
    round_to(value, 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(52.800000000000004), 52.8);
        assert_eq!(round2(660.0 * 0.08), 52.8);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(-1.234), -1.23);
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.99999999), 1.0);
        assert_eq!(round3(0.12345), 0.123);
    }
}
