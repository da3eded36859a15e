//! Remaining-validity classification

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::ExpiryThresholds;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Expiry classification of a certificate at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryState {
    Ok,
    ExpiringSoon,
    Expired,
}

/// Result of one expiry check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryAssessment {
    pub state: ExpiryState,
    /// Signed time left until `not_after`, negative once expired
    #[serde(serialize_with = "serialize_seconds")]
    pub remaining: Duration,
    /// Remaining time is below the critical threshold
    pub critical: bool,
    /// `now` is before the certificate's `not_before`
    pub not_yet_valid: bool,
}

impl ExpiryAssessment {
    /// Whole days remaining, rounded down, negative once expired
    #[must_use]
    pub fn remaining_days(&self) -> i64 {
        self.remaining.num_seconds().div_euclid(SECONDS_PER_DAY)
    }
}

/// Classifies remaining validity against configured thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationMonitor {
    thresholds: ExpiryThresholds,
}

impl ExpirationMonitor {
    #[must_use]
    pub fn new(thresholds: ExpiryThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> ExpiryThresholds {
        self.thresholds
    }

    /// Assess a validity window at `now`
    ///
    /// Expired when `now >= not_after`; expiring soon when less than
    /// `warn_days` remain.
    #[must_use]
    pub fn assess(
        &self,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ExpiryAssessment {
        let remaining = not_after - now;
        let warn = Duration::days(i64::from(self.thresholds.warn_days()));
        let critical = Duration::days(i64::from(self.thresholds.critical_days()));

        let state = if now >= not_after {
            ExpiryState::Expired
        } else if remaining < warn {
            ExpiryState::ExpiringSoon
        } else {
            ExpiryState::Ok
        };

        ExpiryAssessment {
            state,
            remaining,
            critical: remaining < critical,
            not_yet_valid: now < not_before,
        }
    }
}

fn serialize_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> ExpirationMonitor {
        ExpirationMonitor::new(ExpiryThresholds::default())
    }

    #[test]
    fn expired_one_day_ago() {
        let now = Utc::now();
        let a = monitor().assess(now - Duration::days(90), now - Duration::days(1), now);
        assert_eq!(a.state, ExpiryState::Expired);
        assert_eq!(a.remaining_days(), -1);
        assert!(a.critical);
    }

    #[test]
    fn expired_exactly_at_not_after() {
        let now = Utc::now();
        let a = monitor().assess(now - Duration::days(90), now, now);
        assert_eq!(a.state, ExpiryState::Expired);
    }

    #[test]
    fn five_days_left_is_expiring_soon_and_critical() {
        let now = Utc::now();
        let a = monitor().assess(now - Duration::days(1), now + Duration::days(5), now);
        assert_eq!(a.state, ExpiryState::ExpiringSoon);
        assert_eq!(a.remaining_days(), 5);
        assert!(a.critical);
    }

    #[test]
    fn twenty_days_left_warns_without_critical() {
        let now = Utc::now();
        let a = monitor().assess(now - Duration::days(1), now + Duration::days(20), now);
        assert_eq!(a.state, ExpiryState::ExpiringSoon);
        assert!(!a.critical);
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let now = Utc::now();
        let strict = ExpirationMonitor::new(ExpiryThresholds::new(90, 30).expect("thresholds"));
        let a = strict.assess(now - Duration::days(1), now + Duration::days(60), now);
        assert_eq!(a.state, ExpiryState::ExpiringSoon);
        let b = monitor().assess(now - Duration::days(1), now + Duration::days(60), now);
        assert_eq!(b.state, ExpiryState::Ok);
    }

    #[test]
    fn flags_not_yet_valid() {
        let now = Utc::now();
        let a = monitor().assess(now + Duration::days(1), now + Duration::days(365), now);
        assert!(a.not_yet_valid);
        assert_eq!(a.state, ExpiryState::Ok);
    }
}
