//! Rental clock: countdown and overdue fee math.
//!
//! Pure functions of `(now, rental_end)`. They are recomputed every tick and
//! must never carry state between calls; calling them redundantly is safe.

use chrono::{DateTime, Utc};

/// Overdue fee in currency units per elapsed hour, partial hours billed whole
pub const OVERDUE_RATE: f64 = 0.5;

const HOUR_MS: i64 = 3_600_000;

/// Milliseconds until the rental window closes; negative once overdue
pub fn remaining_millis(now: DateTime<Utc>, rental_end: DateTime<Utc>) -> i64 {
    (rental_end - now).num_milliseconds()
}

/// Fee accrued so far. Zero while time remains, then
/// `OVERDUE_RATE * ceil(overdue / 1h)`, non-decreasing as `now` advances.
pub fn overdue_fee(now: DateTime<Utc>, rental_end: DateTime<Utc>) -> f64 {
    let overdue_ms = -remaining_millis(now, rental_end);
    if overdue_ms <= 0 {
        return 0.0;
    }
    let overdue_hours = (overdue_ms + HOUR_MS - 1) / HOUR_MS;
    OVERDUE_RATE * overdue_hours as f64
}

/// Render a remaining-time value as zero-padded `HH:MM:SS`.
/// Anything at or past the deadline renders as `00:00:00`.
pub fn format_hms(ms: i64) -> String {
    if ms <= 0 {
        return "00:00:00".to_string();
    }
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn remaining_is_exact_difference() {
        let now = at(1_000_000);
        let end = at(1_003_600);
        assert_eq!(remaining_millis(now, end), 3_600_000);
        assert_eq!(remaining_millis(end, now), -3_600_000);
        assert_eq!(remaining_millis(now, now), 0);
    }

    #[test]
    fn no_fee_while_time_remains() {
        let now = at(1_000_000);
        assert_eq!(overdue_fee(now, at(1_000_001)), 0.0);
        assert_eq!(overdue_fee(now, now), 0.0);
    }

    #[test]
    fn partial_hours_bill_as_full_hours() {
        let end = at(1_000_000);
        // one second overdue already bills a whole hour
        assert_eq!(overdue_fee(at(1_000_001), end), 0.5);
        // exactly one hour overdue is still one hour
        assert_eq!(overdue_fee(at(1_003_600), end), 0.5);
        // one hour and one second rolls into the second hour
        assert_eq!(overdue_fee(at(1_003_601), end), 1.0);
    }

    #[test]
    fn fee_is_non_decreasing() {
        let end = at(1_000_000);
        let mut last = 0.0;
        for offset in (0..20_000).step_by(700) {
            let fee = overdue_fee(at(1_000_000 + offset), end);
            assert!(fee >= last, "fee regressed at offset {}", offset);
            last = fee;
        }
    }

    #[test]
    fn formats_zero_padded_hms() {
        assert_eq!(format_hms(3_661_000), "01:01:01");
        assert_eq!(format_hms(59_000), "00:00:59");
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(-5_000), "00:00:00");
    }
}
