use chrono::{DateTime, Days, Utc};
use serde::Serialize;

/// Length of a subscription period, in calendar days.
pub const SUBSCRIPTION_PERIOD_DAYS: u64 = 30;

/// A renewal is "soon" when at most this many days remain.
pub const EXPIRING_SOON_DAYS: i64 = 7;

/// The renewal window derived from a subscription start date.
///
/// Never stored: it is only valid for the `now` it was computed against.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenewalWindow {
    pub end_date: DateTime<Utc>,
    pub days_remaining: i64,
    pub is_expiring_soon: bool,
}

impl RenewalWindow {
    /// Computes the window for a subscription that started at `start`, as seen at `now`.
    pub fn compute(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let end_date = renewal_end_date(start);
        let days_remaining = days_between(now, end_date);
        Self {
            end_date,
            days_remaining,
            is_expiring_soon: (0..=EXPIRING_SOON_DAYS).contains(&days_remaining),
        }
    }
}

/// `start` plus one subscription period in calendar days.
pub fn renewal_end_date(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_days(Days::new(SUBSCRIPTION_PERIOD_DAYS))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// Whole days from `from` to `to`, truncated toward zero
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.signed_duration_since(from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 14, 30, 0).unwrap()
    }

    #[test]
    fn fresh_subscription_has_full_period() {
        let window = RenewalWindow::compute(now(), now());
        assert_eq!(window.days_remaining, 30);
        assert!(!window.is_expiring_soon);
        assert_eq!(window.end_date, Utc.with_ymd_and_hms(2025, 4, 9, 14, 30, 0).unwrap());
    }

    #[test]
    fn twenty_five_days_in_is_expiring_soon() {
        let window = RenewalWindow::compute(now() - Duration::days(25), now());
        assert_eq!(window.days_remaining, 5);
        assert!(window.is_expiring_soon);
    }

    #[test]
    fn boundaries_of_expiring_soon() {
        let seven_left = RenewalWindow::compute(now() - Duration::days(23), now());
        assert_eq!(seven_left.days_remaining, 7);
        assert!(seven_left.is_expiring_soon);

        let eight_left = RenewalWindow::compute(now() - Duration::days(22), now());
        assert_eq!(eight_left.days_remaining, 8);
        assert!(!eight_left.is_expiring_soon);

        let due_today = RenewalWindow::compute(now() - Duration::days(30), now());
        assert_eq!(due_today.days_remaining, 0);
        assert!(due_today.is_expiring_soon);
    }

    #[test]
    fn expired_subscription_goes_negative() {
        let window = RenewalWindow::compute(now() - Duration::days(40), now());
        assert_eq!(window.days_remaining, -10);
        assert!(!window.is_expiring_soon);
    }

    #[test]
    fn partial_days_truncate() {
        // 29 days and 23 hours left still reads as 29
        let start = now() - Duration::hours(1);
        let window = RenewalWindow::compute(start, now());
        assert_eq!(window.days_remaining, 29);
    }
}
