//! Resilience layer for inbound webhooks.
//!
//! Sits between a webhook route and its handler and provides:
//! - A bounded dead-letter queue of failed payloads
//! - Retry sweeps with a retry ceiling, per-attempt timeouts and
//!   failure isolation between items
//! - A tri-state health classification (`healthy` / `degraded` /
//!   `unhealthy`) for gating downstream automation
//! - Flat counters for dashboards and alerting
//!
//! ## Guarantees
//! - Bounded memory: samples, failure records and the queue are capped
//! - Recording never fails and never blocks on a handler call
//! - One bad item never aborts a sweep
//!
//! ## Non-Guarantees
//! - Durability across restarts, unless a persistent [`Storage`] is supplied
//! - Exactly-once processing
//! - Signature verification or payload validation (the handler's job)
//!
//! ```no_run
//! use std::sync::Arc;
//! use webhook_health::{HandlerError, HealthMonitor, MonitorConfig};
//!
//! # async fn run() {
//! let monitor = HealthMonitor::new(MonitorConfig::default());
//! monitor.record_failure(br#"{"event":"holdings.updated"}"#.to_vec(), Some("upstream 503".into())).await;
//!
//! let handler = Arc::new(|_payload: Vec<u8>| async { Ok::<(), HandlerError>(()) });
//! let summary = monitor.retry_dead_letter_queue(handler).await;
//! assert_eq!(summary.remaining, 0);
//! # }
//! ```

mod clock;
mod dlq;
mod error;
mod health;
mod monitor;
mod samples;
mod scheduler;
mod storage;
mod telemetry;
mod types;
mod worker;

#[cfg(feature = "redis")]
mod storage_redis;

#[cfg(feature = "postgres")]
mod storage_postgres;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dlq::{DeadLetterQueue, Enqueued, FailedRetry};
pub use error::HandlerError;
pub use health::HealthThresholds;
pub use monitor::{HealthMonitor, MonitorConfig};
pub use samples::{RingBuffer, SampleStore};
pub use scheduler::RetryScheduler;
pub use storage::{InMemoryStorage, Storage};
pub use types::{
    DeadLetterId,
    DeadLetterItem,
    FailureRecord,
    HealthSignals,
    HealthSnapshot,
    HealthStatus,
    MetricsSnapshot,
    RetrySummary,
};
pub use worker::{RetryBackoff, WebhookHandler};

#[cfg(feature = "redis")]
pub use storage_redis::RedisStorage;

#[cfg(feature = "postgres")]
pub use storage_postgres::PostgresStorage;
