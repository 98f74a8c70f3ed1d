/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Milliseconds in one day
pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Longest term, in days, accepted for a license or a device
pub const MAX_TERM_DAYS: i64 = 36_500;

/// `now + days`, in milliseconds; `None` when the result does not fit in `i64`
pub fn millis_after_days(now: i64, days: i64) -> Option<i64> {
    days.checked_mul(DAY_MILLIS)
        .and_then(|span| now.checked_add(span))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_after_days() {
        assert_eq!(millis_after_days(0, 1), Some(DAY_MILLIS));
        assert_eq!(millis_after_days(1_000, 0), Some(1_000));
        assert_eq!(millis_after_days(0, -2), Some(-2 * DAY_MILLIS));
    }

    #[test]
    fn test_millis_after_days_overflow() {
        assert_eq!(millis_after_days(0, i64::MAX / 2), None);
        assert_eq!(millis_after_days(i64::MAX - 10, 1), None);
        assert!(millis_after_days(1_760_000_000_000, MAX_TERM_DAYS).is_some());
    }
}
