//! Ordered-threshold health classification.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. `unhealthy` if the failure count or the dead-letter queue size is over
//!    its limit.
//! 2. `degraded` if the failure count or the average processing time is over
//!    its limit.
//! 3. `healthy` otherwise.
//!
//! A `healthy` result is then downgraded to `degraded` when the last success
//! is older than the staleness window, or when there has never been one.
//! Staleness never moves a `degraded` or `unhealthy` result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{HealthSignals, HealthSnapshot, HealthStatus};

/// Classification limits. Every comparison is a strict `>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub unhealthy_failed_count: u64,
    pub unhealthy_dead_letter_size: usize,
    pub degraded_failed_count: u64,
    pub degraded_avg_processing_ms: f64,
    pub stale_after_secs: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            unhealthy_failed_count: 5,
            unhealthy_dead_letter_size: 10,
            degraded_failed_count: 2,
            degraded_avg_processing_ms: 5_000.0,
            stale_after_secs: 24 * 60 * 60,
        }
    }
}

impl HealthThresholds {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn classify(&self, signals: &HealthSignals, now: DateTime<Utc>) -> HealthStatus {
        let status = if signals.failed_count > self.unhealthy_failed_count
            || signals.dead_letter_size > self.unhealthy_dead_letter_size
        {
            HealthStatus::Unhealthy
        } else if signals.failed_count > self.degraded_failed_count
            || signals.average_processing_ms > self.degraded_avg_processing_ms
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        if status == HealthStatus::Healthy && self.is_stale(signals.last_successful_at, now) {
            return HealthStatus::Degraded;
        }
        status
    }

    fn is_stale(&self, last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last_success) = last_success else {
            return true;
        };
        let window = chrono::Duration::from_std(self.stale_after()).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(last_success) > window
    }

    pub fn snapshot(&self, signals: HealthSignals, now: DateTime<Utc>) -> HealthSnapshot {
        let status = self.classify(&signals, now);
        HealthSnapshot {
            last_successful_at: signals.last_successful_at,
            failed_count: signals.failed_count,
            dead_letter_size: signals.dead_letter_size,
            average_processing_ms: signals.average_processing_ms,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(now: DateTime<Utc>) -> HealthSignals {
        HealthSignals {
            last_successful_at: Some(now),
            ..Default::default()
        }
    }

    #[test]
    fn quiet_recent_success_is_healthy() {
        let now = Utc::now();
        assert_eq!(HealthThresholds::default().classify(&fresh(now), now), HealthStatus::Healthy);
    }

    #[test]
    fn failure_count_over_five_is_unhealthy_regardless_of_rest() {
        let now = Utc::now();
        let signals = HealthSignals {
            failed_count: 6,
            ..fresh(now)
        };
        assert_eq!(HealthThresholds::default().classify(&signals, now), HealthStatus::Unhealthy);
    }

    #[test]
    fn large_dead_letter_queue_is_unhealthy() {
        let now = Utc::now();
        let signals = HealthSignals {
            dead_letter_size: 11,
            ..fresh(now)
        };
        assert_eq!(HealthThresholds::default().classify(&signals, now), HealthStatus::Unhealthy);

        let at_limit = HealthSignals {
            dead_letter_size: 10,
            ..fresh(now)
        };
        assert_eq!(HealthThresholds::default().classify(&at_limit, now), HealthStatus::Healthy);
    }

    #[test]
    fn degraded_limits_are_strict() {
        let now = Utc::now();
        let thresholds = HealthThresholds::default();

        let two = HealthSignals { failed_count: 2, ..fresh(now) };
        let three = HealthSignals { failed_count: 3, ..fresh(now) };
        assert_eq!(thresholds.classify(&two, now), HealthStatus::Healthy);
        assert_eq!(thresholds.classify(&three, now), HealthStatus::Degraded);

        let slow = HealthSignals { average_processing_ms: 5_000.1, ..fresh(now) };
        let limit = HealthSignals { average_processing_ms: 5_000.0, ..fresh(now) };
        assert_eq!(thresholds.classify(&slow, now), HealthStatus::Degraded);
        assert_eq!(thresholds.classify(&limit, now), HealthStatus::Healthy);
    }

    #[test]
    fn stale_success_downgrades_healthy() {
        let now = Utc::now();
        let signals = HealthSignals {
            last_successful_at: Some(now - chrono::Duration::hours(25)),
            ..Default::default()
        };
        assert_eq!(HealthThresholds::default().classify(&signals, now), HealthStatus::Degraded);
    }

    #[test]
    fn never_succeeded_is_degraded() {
        let now = Utc::now();
        assert_eq!(
            HealthThresholds::default().classify(&HealthSignals::default(), now),
            HealthStatus::Degraded,
        );
    }

    #[test]
    fn staleness_does_not_touch_unhealthy() {
        let now = Utc::now();
        let signals = HealthSignals {
            failed_count: 6,
            last_successful_at: None,
            ..Default::default()
        };
        assert_eq!(HealthThresholds::default().classify(&signals, now), HealthStatus::Unhealthy);
    }

    #[test]
    fn exactly_at_window_is_not_stale() {
        let now = Utc::now();
        let signals = HealthSignals {
            last_successful_at: Some(now - chrono::Duration::hours(24)),
            ..Default::default()
        };
        assert_eq!(HealthThresholds::default().classify(&signals, now), HealthStatus::Healthy);
    }
}
