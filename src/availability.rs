use chrono::{DateTime, TimeDelta, Utc};

use crate::types::AvailabilityState;

pub const DEFAULT_UNAVAILABLE_THRESHOLD_SECS: i64 = 120;

/// Tracks poll outcomes. Failure duration is measured from the first failure
/// of an unbroken run, and any success clears it.
#[derive(Debug, Clone)]
pub struct Availability {
    threshold: TimeDelta,
    last_success: Option<DateTime<Utc>>,
    unavailable_since: Option<DateTime<Utc>>,
    state: AvailabilityState,
}

impl Default for Availability {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(DEFAULT_UNAVAILABLE_THRESHOLD_SECS))
    }
}

impl Availability {
    pub fn new(threshold: TimeDelta) -> Self {
        Self {
            threshold,
            last_success: None,
            unavailable_since: None,
            state: AvailabilityState::Healthy,
        }
    }

    pub fn state(&self) -> AvailabilityState {
        self.state
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn unavailable_since(&self) -> Option<DateTime<Utc>> {
        self.unavailable_since
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) -> AvailabilityState {
        if self.state == AvailabilityState::Unrecoverable {
            return self.state;
        }
        self.last_success = Some(now);
        self.unavailable_since = None;
        self.state = AvailabilityState::Healthy;
        self.state
    }

    /// Once `Unrecoverable` is reached it is terminal.
    pub fn record_failure(&mut self, now: DateTime<Utc>) -> AvailabilityState {
        self.state = match (self.state, self.unavailable_since) {
            (AvailabilityState::Unrecoverable, _) => AvailabilityState::Unrecoverable,
            (_, None) => {
                self.unavailable_since = Some(now);
                AvailabilityState::Degraded
            }
            (_, Some(since)) if now - since >= self.threshold => AvailabilityState::Unrecoverable,
            (_, Some(_)) => AvailabilityState::Degraded,
        };
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn success_keeps_healthy() {
        let mut a = Availability::default();
        assert_eq!(a.record_success(at(0)), AvailabilityState::Healthy);
        assert_eq!(a.last_success(), Some(at(0)));
        assert_eq!(a.unavailable_since(), None);
    }

    #[test]
    fn failures_within_threshold_stay_degraded() {
        let mut a = Availability::default();
        assert_eq!(a.record_failure(at(0)), AvailabilityState::Degraded);
        assert_eq!(a.record_failure(at(45)), AvailabilityState::Degraded);
        assert_eq!(a.record_failure(at(90)), AvailabilityState::Degraded);
        assert_eq!(a.unavailable_since(), Some(at(0)));
    }

    #[test]
    fn failure_past_threshold_is_unrecoverable() {
        let mut a = Availability::default();
        a.record_failure(at(0));
        a.record_failure(at(90));
        assert_eq!(a.record_failure(at(125)), AvailabilityState::Unrecoverable);
        assert_eq!(a.record_success(at(130)), AvailabilityState::Unrecoverable);
    }

    #[test]
    fn exact_threshold_counts() {
        let mut a = Availability::default();
        a.record_failure(at(0));
        assert_eq!(a.record_failure(at(120)), AvailabilityState::Unrecoverable);
    }

    #[test]
    fn success_resets_onset() {
        let mut a = Availability::default();
        a.record_failure(at(0));
        a.record_failure(at(100));
        assert_eq!(a.record_success(at(110)), AvailabilityState::Healthy);
        assert_eq!(a.record_failure(at(200)), AvailabilityState::Degraded);
        assert_eq!(a.unavailable_since(), Some(at(200)));
        assert_eq!(a.record_failure(at(300)), AvailabilityState::Degraded);
    }
}
