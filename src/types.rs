use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a dead-letter item.
///
/// Allocated monotonically by the monitor that created the item, so a
/// larger id always means a later failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeadLetterId(pub u64);

impl fmt::Display for DeadLetterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dlq-{}", self.0)
    }
}

/// One webhook delivery that failed processing and awaits retry.
///
/// The payload is opaque: the monitor stores and hands it back to the
/// retry handler but never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterItem {
    pub id: DeadLetterId,

    /// Raw webhook body as received.
    pub payload: Vec<u8>,

    /// When the delivery first failed.
    pub failed_at: DateTime<Utc>,

    /// Number of unsuccessful retry attempts so far.
    pub retry_count: u32,

    /// Most recent error, if the caller or a retry attempt supplied one.
    pub last_error: Option<String>,

    /// Earliest time the next retry may run. `None` means immediately.
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl DeadLetterItem {
    pub fn new(
        id: DeadLetterId,
        payload: impl Into<Vec<u8>>,
        failed_at: DateTime<Utc>,
        last_error: Option<String>,
    ) -> Self {
        Self {
            id,
            payload: payload.into(),
            failed_at,
            retry_count: 0,
            last_error,
            next_attempt_at: None,
        }
    }

    /// Whether a sweep running at `now` should attempt this item.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

/// Audit entry for a single observed failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub item_id: DeadLetterId,
    pub at: DateTime<Utc>,

    /// Retry count of the item after this failure (0 for the initial one).
    pub retry_count: u32,
    pub error: Option<String>,

    /// Set when this failure pushed the item over the retry ceiling.
    pub exhausted: bool,
}

/// Tri-state health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw inputs to the health classification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HealthSignals {
    pub last_successful_at: Option<DateTime<Utc>>,
    pub failed_count: u64,
    pub dead_letter_size: usize,
    pub average_processing_ms: f64,
}

/// Point-in-time health report.
///
/// Serializes to the JSON shape monitoring routes return:
/// `{lastSuccessfulWebhook, failedWebhookCount, deadLetterQueueSize,
/// avgProcessingTime, status}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    #[serde(rename = "lastSuccessfulWebhook")]
    pub last_successful_at: Option<DateTime<Utc>>,

    /// Decaying failure counter: incremented per failure, decremented
    /// (floored at zero) per success.
    #[serde(rename = "failedWebhookCount")]
    pub failed_count: u64,

    #[serde(rename = "deadLetterQueueSize")]
    pub dead_letter_size: usize,

    #[serde(rename = "avgProcessingTime")]
    pub average_processing_ms: f64,

    pub status: HealthStatus,
}

/// Result of one retry sweep over the dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetrySummary {
    /// Items handed to the handler in this sweep.
    #[serde(rename = "retried")]
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Failed items that reached the retry ceiling and were dropped.
    pub exhausted: usize,

    /// Items skipped because their backoff had not elapsed.
    pub deferred: usize,

    /// Queue length once the sweep finished.
    pub remaining: usize,
}

/// Flat counters for dashboards and alerting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Successes plus failures, including retry attempts.
    pub total_processed: u64,
    pub total_succeeded: u64,

    /// Lifetime failure count. Never decremented.
    pub total_failed: u64,
    pub total_retried: u64,
    pub total_exhausted: u64,

    /// Items dropped by the queue's capacity eviction.
    pub total_evicted: u64,

    /// Decaying counter used by the health classification.
    pub failed_webhook_count: u64,
    pub avg_processing_time_ms: f64,
    pub dead_letter_queue_size: usize,
    pub last_successful_webhook: Option<DateTime<Utc>>,
    pub status: HealthStatus,
    pub uptime_secs: u64,
    /// Resident memory of this process. `None` without the `metrics` feature.
    pub resident_memory_bytes: Option<u64>,
}
