// Clock-style time formatting for the player labels

/// Format a position in seconds as a zero-padded `MM:SS` string.
///
/// Minutes are not capped at 59, so an hour-long resource formats as
/// `61:02` rather than rolling over. Negative and non-finite inputs
/// format as `00:00`.
pub fn clock_format(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return String::from("00:00");
    }

    let total = seconds.floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_subsecond() {
        assert_eq!(clock_format(0.0), "00:00");
        assert_eq!(clock_format(0.9), "00:00");
    }

    #[test]
    fn test_padding() {
        assert_eq!(clock_format(5.0), "00:05");
        assert_eq!(clock_format(65.0), "01:05");
        assert_eq!(clock_format(600.0), "10:00");
    }

    #[test]
    fn test_minutes_not_capped() {
        // 1h 1m 2s keeps accumulating minutes
        assert_eq!(clock_format(3662.0), "61:02");
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(clock_format(-3.0), "00:00");
        assert_eq!(clock_format(f64::NAN), "00:00");
        assert_eq!(clock_format(f64::INFINITY), "00:00");
    }
}
