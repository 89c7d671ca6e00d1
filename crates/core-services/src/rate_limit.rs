//! Windowed rate-limit arithmetic (C6), kept free of storage so both the sqlx repository and
//! the in-memory fake share the exact same rollover decision.
use chrono::{DateTime, Duration, Utc};
use domain::models::RateLimitWindow;

/// What `increment` should do to the persisted row, decided purely from its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverDecision {
    /// No window exists yet, or the existing one has aged past `window`: start a fresh one.
    Reset,
    /// The window is still live: bump `attempts` in place.
    Increment,
}

pub fn decide_rollover(
    existing: Option<&RateLimitWindow>,
    now: DateTime<Utc>,
    window: Duration,
) -> RolloverDecision {
    match existing {
        None => RolloverDecision::Reset,
        Some(w) => {
            if now - w.window_start > window {
                RolloverDecision::Reset
            } else {
                RolloverDecision::Increment
            }
        }
    }
}

pub fn is_rate_limited(
    window: &RateLimitWindow,
    now: DateTime<Utc>,
    threshold: i32,
    window_duration: Duration,
) -> bool {
    window.attempts >= threshold && now < window.retry_at(window_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window_at(start: DateTime<Utc>, attempts: i32) -> RateLimitWindow {
        RateLimitWindow {
            identity_key: "bob@x".to_string(),
            attempts,
            window_start: start,
        }
    }

    #[test]
    fn no_existing_window_resets() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(decide_rollover(None, now, Duration::hours(1)), RolloverDecision::Reset);
    }

    #[test]
    fn stale_window_resets() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let now = start + Duration::hours(2);
        let w = window_at(start, 3);
        assert_eq!(decide_rollover(Some(&w), now, Duration::hours(1)), RolloverDecision::Reset);
    }

    #[test]
    fn live_window_increments() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let now = start + Duration::minutes(30);
        let w = window_at(start, 2);
        assert_eq!(
            decide_rollover(Some(&w), now, Duration::hours(1)),
            RolloverDecision::Increment
        );
    }
}
