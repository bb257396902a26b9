use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::monitor::HealthMonitor;
use crate::telemetry::trace_event;
use crate::worker::WebhookHandler;

/// Background task that sweeps the dead-letter queue on a fixed interval.
///
/// Sweeps are skipped while the queue is empty. Dropping the scheduler
/// without calling [`shutdown`](Self::shutdown) leaves the task running.
pub struct RetryScheduler {
    handle: Option<JoinHandle<()>>,
    stop: Arc<Notify>,
}

impl RetryScheduler {
    pub fn spawn(monitor: HealthMonitor, handler: Arc<dyn WebhookHandler>, every: Duration) -> Self {
        let stop = Arc::new(Notify::new());
        let task_stop = stop.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_stop.notified() => break,
                    _ = ticker.tick() => {
                        if monitor.dead_letter_len().await > 0 {
                            monitor.retry_dead_letter_queue(handler.clone()).await;
                        }
                    }
                }
            }
            trace_event("webhook.retry_scheduler.stopped");
        });

        Self {
            handle: Some(handle),
            stop,
        }
    }

    /// Stop the loop, waiting for an in-progress sweep to finish.
    pub async fn shutdown(mut self) {
        self.stop.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl HealthMonitor {
    /// Sweep the dead-letter queue every `every` until the returned
    /// scheduler is shut down.
    pub fn spawn_retry_scheduler(
        &self,
        handler: Arc<dyn WebhookHandler>,
        every: Duration,
    ) -> RetryScheduler {
        RetryScheduler::spawn(self.clone(), handler, every)
    }
}
