/// Share of observed transactions that came through the relay, clamped to [0, 1].
/// With nothing observed yet any relayed transaction saturates the score.
pub fn anomaly_score(relayed: u64, total: u64) -> f64 {
    if total == 0 {
        return if relayed == 0 { 0.0 } else { 1.0 };
    }
    (relayed as f64 / total as f64).clamp(0.0, 1.0)
}

/// Two decimal places, except a score that rounds to zero is written as `"0"`.
pub fn format_score(score: f64) -> String {
    let formatted = format!("{:.2}", score);
    if formatted == "0.00" {
        "0".to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_zero_formats_as_zero() {
        assert_eq!(format_score(anomaly_score(1, 1000)), "0");
        assert_eq!(format_score(anomaly_score(0, 1000)), "0");
    }

    #[test]
    fn test_two_decimal_precision() {
        assert_eq!(format_score(anomaly_score(500, 1000)), "0.50");
        assert_eq!(format_score(anomaly_score(1, 3)), "0.33");
        assert_eq!(format_score(anomaly_score(6, 1000)), "0.01");
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(anomaly_score(5, 2), 1.0);
        assert_eq!(format_score(anomaly_score(5, 2)), "1.00");
        assert_eq!(anomaly_score(3, 0), 1.0);
    }
}
