//! Feature-gated logging and metrics hooks. Each helper compiles to a no-op
//! when its feature is disabled.

#[cfg(feature = "metrics")]
pub(crate) fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc(_name: &'static str) {}

#[cfg(feature = "metrics")]
pub(crate) fn metric_add(name: &'static str, value: u64) {
    metrics::counter!(name, value);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_add(_name: &'static str, _value: u64) {}

#[cfg(feature = "metrics")]
pub(crate) fn metric_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name, value);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_gauge(_name: &'static str, _value: f64) {}

#[cfg(feature = "metrics")]
pub(crate) fn metric_histogram(name: &'static str, value: f64) {
    metrics::histogram!(name, value);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_histogram(_name: &'static str, _value: f64) {}

#[cfg(feature = "tracing")]
pub(crate) fn trace_event(message: &'static str) {
    tracing::info!(message);
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn trace_event(_message: &'static str) {}

#[cfg(feature = "tracing")]
pub(crate) fn trace_item(message: &'static str, item_id: u64, retry_count: u32, error: Option<&str>) {
    tracing::info!(item_id, retry_count, error, "{}", message);
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn trace_item(_message: &'static str, _item_id: u64, _retry_count: u32, _error: Option<&str>) {}

#[cfg(feature = "tracing")]
pub(crate) fn warn_item(message: &'static str, item_id: u64, retry_count: u32, error: Option<&str>) {
    tracing::warn!(item_id, retry_count, error, "{}", message);
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn warn_item(_message: &'static str, _item_id: u64, _retry_count: u32, _error: Option<&str>) {}

#[cfg(feature = "tracing")]
#[cfg_attr(not(any(feature = "redis", feature = "postgres")), allow(dead_code))]
pub(crate) fn warn_storage(operation: &'static str, error: &dyn std::fmt::Display) {
    tracing::warn!(operation, error = %error, "dead-letter storage operation failed");
}

#[cfg(not(feature = "tracing"))]
#[cfg_attr(not(any(feature = "redis", feature = "postgres")), allow(dead_code))]
pub(crate) fn warn_storage(_operation: &'static str, _error: &dyn std::fmt::Display) {}

#[cfg(feature = "tracing")]
pub(crate) fn warn_evicted(count: usize, capacity: usize) {
    tracing::warn!(count, capacity, "dead-letter queue full, evicted oldest items");
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn warn_evicted(_count: usize, _capacity: usize) {}

#[cfg(feature = "tracing")]
pub(crate) fn trace_sweep(summary: &crate::types::RetrySummary) {
    tracing::info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        exhausted = summary.exhausted,
        deferred = summary.deferred,
        remaining = summary.remaining,
        "dead-letter retry sweep finished"
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn trace_sweep(_summary: &crate::types::RetrySummary) {}
