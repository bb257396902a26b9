use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::clock::{Clock, SystemClock};
use crate::dlq::{DeadLetterQueue, FailedRetry};
use crate::health::HealthThresholds;
use crate::samples::SampleStore;
use crate::storage::{InMemoryStorage, Storage};
use crate::telemetry::{
    metric_add, metric_gauge, metric_histogram, metric_inc, trace_item, trace_sweep, warn_evicted,
    warn_item,
};
use crate::types::{
    DeadLetterId, DeadLetterItem, FailureRecord, HealthSignals, HealthSnapshot, MetricsSnapshot,
    RetrySummary,
};
use crate::worker::{run_attempt, AttemptReport, RetryBackoff, WebhookHandler};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Processing-time samples and failure records kept before trimming.
    pub sample_capacity: usize,
    /// Entries left after a trim.
    pub sample_retain: usize,
    pub dead_letter_capacity: usize,
    /// Failed retries after which an item is dropped.
    pub retry_ceiling: u32,
    /// Items attempted at once during a sweep. 1 means strictly sequential.
    pub retry_concurrency: usize,
    pub attempt_timeout_ms: u64,
    /// `None` retries every queued item on every sweep.
    pub retry_backoff: Option<RetryBackoff>,
    pub thresholds: HealthThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_capacity: 100,
            sample_retain: 50,
            dead_letter_capacity: 100,
            retry_ceiling: 3,
            retry_concurrency: 1,
            attempt_timeout_ms: 5_000,
            retry_backoff: None,
            thresholds: HealthThresholds::default(),
        }
    }
}

impl MonitorConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms.max(1))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    processed: u64,
    succeeded: u64,
    failed: u64,
    retried: u64,
    exhausted: u64,
    evicted: u64,
}

struct MonitorState {
    samples: SampleStore,
    dlq: DeadLetterQueue,
    /// Decaying failure signal used for health classification.
    failed_count: u64,
    last_success_at: Option<DateTime<Utc>>,
    totals: Totals,
}

impl MonitorState {
    fn new(config: &MonitorConfig) -> Self {
        Self {
            samples: SampleStore::new(config.sample_capacity, config.sample_retain),
            dlq: DeadLetterQueue::new(config.dead_letter_capacity, config.retry_ceiling),
            failed_count: 0,
            last_success_at: None,
            totals: Totals::default(),
        }
    }

    fn note_success(&mut self, at: DateTime<Utc>) {
        self.failed_count = self.failed_count.saturating_sub(1);
        self.last_success_at = Some(at);
        self.totals.processed += 1;
        self.totals.succeeded += 1;
    }

    fn note_failure(&mut self, record: FailureRecord) {
        self.failed_count += 1;
        self.totals.processed += 1;
        self.totals.failed += 1;
        if record.exhausted {
            self.totals.exhausted += 1;
        }
        self.samples.record_failure(record);
    }

    fn signals(&self) -> HealthSignals {
        HealthSignals {
            last_successful_at: self.last_success_at,
            failed_count: self.failed_count,
            dead_letter_size: self.dlq.len(),
            average_processing_ms: self.samples.average_processing_time(),
        }
    }
}

/// How a single retry attempt changed the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Succeeded,
    Requeued,
    Exhausted,
    /// The item left the queue (eviction) while its attempt was in flight.
    Vanished,
}

/// Resilience layer for inbound webhooks.
///
/// Tracks processing outcomes, keeps failed payloads in a bounded
/// dead-letter queue, retries them through a [`WebhookHandler`] and
/// classifies overall health.
///
/// Create one per process and hand out clones: clones share state.
#[derive(Clone)]
pub struct HealthMonitor {
    state: Arc<Mutex<MonitorState>>,
    sweep: Arc<Mutex<()>>,
    /// Held from a queue mutation until its storage write returns, so
    /// storage sees membership changes in queue order. Taken before `state`.
    persist: Arc<Mutex<()>>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    started: std::time::Instant,
}

impl HealthMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        Self::new_with_storage_inner(config, storage)
    }

    /// Build a monitor backed by `storage`, restoring any persisted
    /// dead-letter items.
    pub async fn new_with_storage(config: MonitorConfig, storage: Arc<dyn Storage>) -> Self {
        let monitor = Self::new_with_storage_inner(config, storage.clone());
        let persisted = storage.load_dead_letters().await;
        if persisted.is_empty() {
            return monitor;
        }

        let _persist = monitor.persist.lock().await;
        let (exhausted, evicted) = {
            let mut state = monitor.state.lock().await;
            let (exhausted, evicted) = state.dlq.restore(persisted);
            state.totals.exhausted += exhausted.len() as u64;
            state.totals.evicted += evicted.len() as u64;
            metric_gauge("webhook.dlq.size", state.dlq.len() as f64);
            (exhausted, evicted)
        };

        for item in exhausted.iter().chain(evicted.iter()) {
            storage.remove_dead_letter(item.id).await;
        }
        drop(_persist);
        monitor
    }

    fn new_with_storage_inner(config: MonitorConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState::new(&config))),
            sweep: Arc::new(Mutex::new(())),
            persist: Arc::new(Mutex::new(())),
            storage,
            clock: Arc::new(SystemClock),
            config,
            started: std::time::Instant::now(),
        }
    }

    /// Read wall-clock time from `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub async fn record_success(&self) {
        let now = self.clock.now();
        self.state.lock().await.note_success(now);
        metric_inc("webhook.health.success");
    }

    /// Record a failed delivery and queue its payload for retry.
    pub async fn record_failure(
        &self,
        payload: impl Into<Vec<u8>>,
        error: Option<String>,
    ) -> DeadLetterItem {
        let _persist = self.persist.lock().await;
        let now = self.clock.now();
        let enqueued = {
            let mut state = self.state.lock().await;
            let enqueued = state.dlq.enqueue(payload.into(), error, now);
            state.note_failure(FailureRecord {
                item_id: enqueued.item.id,
                at: now,
                retry_count: 0,
                error: enqueued.item.last_error.clone(),
                exhausted: false,
            });
            state.totals.evicted += enqueued.evicted.len() as u64;
            metric_gauge("webhook.dlq.size", state.dlq.len() as f64);
            enqueued
        };

        let item = enqueued.item;
        warn_item(
            "webhook processing failed, queued for retry",
            item.id.0,
            0,
            item.last_error.as_deref(),
        );
        metric_inc("webhook.health.failure");
        metric_inc("webhook.dlq.enqueued");

        if !enqueued.evicted.is_empty() {
            warn_evicted(enqueued.evicted.len(), self.config.dead_letter_capacity);
            metric_add("webhook.dlq.evicted", enqueued.evicted.len() as u64);
            for evicted in &enqueued.evicted {
                self.storage.remove_dead_letter(evicted.id).await;
            }
        }

        self.storage.record_dead_letter(&item).await;
        item
    }

    pub async fn record_processing_time(&self, duration: Duration) {
        self.state.lock().await.samples.record_processing_time(duration);
        metric_histogram("webhook.processing_time_ms", duration.as_secs_f64() * 1_000.0);
    }

    pub async fn health(&self) -> HealthSnapshot {
        let signals = self.state.lock().await.signals();
        self.config.thresholds.snapshot(signals, self.clock.now())
    }

    /// Snapshot copy of the dead-letter queue, oldest first.
    pub async fn dead_letter_queue(&self) -> Vec<DeadLetterItem> {
        self.state.lock().await.dlq.list()
    }

    /// Recent failures, including exhausted retries, oldest first.
    pub async fn recent_failures(&self) -> Vec<FailureRecord> {
        self.state.lock().await.samples.recent_failures()
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        let (totals, signals) = {
            let state = self.state.lock().await;
            (state.totals, state.signals())
        };
        let status = self.config.thresholds.classify(&signals, self.clock.now());

        MetricsSnapshot {
            total_processed: totals.processed,
            total_succeeded: totals.succeeded,
            total_failed: totals.failed,
            total_retried: totals.retried,
            total_exhausted: totals.exhausted,
            total_evicted: totals.evicted,
            failed_webhook_count: signals.failed_count,
            avg_processing_time_ms: signals.average_processing_ms,
            dead_letter_queue_size: signals.dead_letter_size,
            last_successful_webhook: signals.last_successful_at,
            status,
            uptime_secs: self.started.elapsed().as_secs(),
            resident_memory_bytes: resident_memory_bytes(),
        }
    }

    /// Retry every due dead-letter item through `handler`.
    ///
    /// Handler calls run outside the state lock, at most
    /// `retry_concurrency` at a time, each bounded by the attempt timeout.
    /// A failing, hung or panicking attempt only affects its own item.
    /// Concurrent sweeps run one after another.
    pub async fn retry_dead_letter_queue(&self, handler: Arc<dyn WebhookHandler>) -> RetrySummary {
        let _sweep = self.sweep.lock().await;

        let now = self.clock.now();
        let (due, deferred) = self.state.lock().await.dlq.due(now);
        let mut summary = RetrySummary {
            attempted: due.len(),
            deferred,
            ..Default::default()
        };

        let permits = Arc::new(Semaphore::new(self.config.retry_concurrency.max(1)));
        let timeout = self.config.attempt_timeout();
        let mut attempts = JoinSet::new();

        for item in due {
            let Ok(permit) = permits.clone().acquire_owned().await else { break };
            let monitor = self.clone();
            let handler = handler.clone();
            attempts.spawn(async move {
                let report = run_attempt(handler, item, timeout).await;
                drop(permit);
                monitor.apply_attempt(report).await
            });
        }

        while let Some(joined) = attempts.join_next().await {
            match joined {
                Ok(Applied::Succeeded) => summary.succeeded += 1,
                Ok(Applied::Requeued) => summary.failed += 1,
                Ok(Applied::Exhausted) => {
                    summary.failed += 1;
                    summary.exhausted += 1;
                }
                Ok(Applied::Vanished) => summary.failed += 1,
                Err(_) => summary.failed += 1,
            }
        }

        let persist = self.persist.lock().await;
        let stale = {
            let mut state = self.state.lock().await;
            let stale = state.dlq.purge_exhausted();
            state.totals.exhausted += stale.len() as u64;
            summary.remaining = state.dlq.len();
            metric_gauge("webhook.dlq.size", state.dlq.len() as f64);
            stale
        };
        summary.exhausted += stale.len();
        for item in &stale {
            self.storage.remove_dead_letter(item.id).await;
        }
        drop(persist);

        trace_sweep(&summary);
        summary
    }

    async fn apply_attempt(&self, report: AttemptReport) -> Applied {
        let now = self.clock.now();
        let AttemptReport { item_id, elapsed, result } = report;
        metric_inc("webhook.retry.attempted");
        metric_histogram("webhook.processing_time_ms", elapsed.as_secs_f64() * 1_000.0);

        let _persist = self.persist.lock().await;
        let error = match result {
            Ok(()) => {
                let removed = {
                    let mut state = self.state.lock().await;
                    state.samples.record_processing_time(elapsed);
                    state.totals.retried += 1;
                    state.note_success(now);
                    let removed = state.dlq.remove(item_id);
                    metric_gauge("webhook.dlq.size", state.dlq.len() as f64);
                    removed
                };
                metric_inc("webhook.retry.succeeded");
                metric_inc("webhook.health.success");
                if let Some(item) = removed {
                    trace_item("dead-letter item recovered", item.id.0, item.retry_count, None);
                    self.storage.remove_dead_letter(item.id).await;
                }
                return Applied::Succeeded;
            }
            Err(error) => error.to_string(),
        };

        let failed = {
            let mut state = self.state.lock().await;
            state.samples.record_processing_time(elapsed);
            state.totals.retried += 1;

            let next_attempt_at = match (&self.config.retry_backoff, state.dlq.get(item_id)) {
                (Some(backoff), Some(item)) => Some(backoff.next_attempt_at(item.retry_count + 1, now)),
                _ => None,
            };
            let failed = state.dlq.mark_failed(item_id, error.clone(), next_attempt_at);

            let (retry_count, exhausted) = match &failed {
                Some(FailedRetry::Requeued(item)) => (item.retry_count, false),
                Some(FailedRetry::Exhausted(item)) => (item.retry_count, true),
                None => (0, false),
            };
            state.note_failure(FailureRecord {
                item_id,
                at: now,
                retry_count,
                error: Some(error.clone()),
                exhausted,
            });
            metric_gauge("webhook.dlq.size", state.dlq.len() as f64);
            failed
        };
        metric_inc("webhook.health.failure");

        match failed {
            Some(FailedRetry::Requeued(item)) => {
                warn_item("dead-letter retry failed", item.id.0, item.retry_count, Some(error.as_str()));
                self.storage.record_dead_letter(&item).await;
                Applied::Requeued
            }
            Some(FailedRetry::Exhausted(item)) => {
                warn_item(
                    "dead-letter item exhausted its retries, dropping",
                    item.id.0,
                    item.retry_count,
                    Some(error.as_str()),
                );
                metric_inc("webhook.dlq.exhausted");
                self.storage.remove_dead_letter(item.id).await;
                Applied::Exhausted
            }
            None => {
                warn_item("dead-letter retry failed after eviction", item_id.0, 0, Some(error.as_str()));
                Applied::Vanished
            }
        }
    }

    /// Number of items currently queued.
    pub async fn dead_letter_len(&self) -> usize {
        self.state.lock().await.dlq.len()
    }

    /// Look up a single queued item.
    pub async fn dead_letter(&self, id: DeadLetterId) -> Option<DeadLetterItem> {
        self.state.lock().await.dlq.get(id).cloned()
    }
}

#[cfg(feature = "metrics")]
fn resident_memory_bytes() -> Option<u64> {
    use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    system.process(pid).map(|process| process.memory())
}

#[cfg(not(feature = "metrics"))]
fn resident_memory_bytes() -> Option<u64> {
    None
}
