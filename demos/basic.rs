use std::sync::Arc;
use std::time::Duration;

use webhook_health::{HandlerError, HealthMonitor, MonitorConfig, WebhookHandler};

#[tokio::main]
async fn main() {
    let monitor = HealthMonitor::new(MonitorConfig {
        attempt_timeout_ms: 2_000,
        ..Default::default()
    });

    monitor.record_success().await;
    monitor.record_processing_time(Duration::from_millis(180)).await;
    monitor
        .record_failure(
            br#"{"type":"HOLDINGS.UPDATED","account":"acc_123"}"#.to_vec(),
            Some("balance service unavailable".to_string()),
        )
        .await;

    let handler: Arc<dyn WebhookHandler> = Arc::new(|payload: Vec<u8>| async move {
        if payload.is_empty() {
            return Err(HandlerError::failed("empty payload"));
        }
        Ok(())
    });

    let summary = monitor.retry_dead_letter_queue(handler).await;
    let health = monitor.health().await;

    println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    println!("{}", serde_json::to_string_pretty(&health).unwrap_or_default());
}
