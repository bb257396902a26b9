use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::HandlerError;
use crate::types::{DeadLetterId, DeadLetterItem};

/// Processes one webhook payload.
///
/// This is the same handler the inbound route uses. A retry sweep calls it
/// once per due dead-letter item and treats `Err` as a failed attempt.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> WebhookHandler for F
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        (self)(payload.to_vec()).await
    }
}

/// Exponential backoff between retries of the same item.
///
/// After the n-th failed retry the item waits
/// `min(base_ms * 2^(n-1), max_ms) + uniform(0..=jitter_ms)` milliseconds
/// before a sweep will attempt it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBackoff {
    pub base_ms: u64,
    pub max_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            base_ms: 30_000,
            max_ms: 15 * 60 * 1_000,
            jitter_ms: 1_000,
        }
    }
}

impl RetryBackoff {
    /// Delay before the next attempt, without jitter.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let base = self.base_ms.max(1);
        let max = self.max_ms.max(base);
        let pow = 2u64.checked_pow(retry_count - 1).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(pow).min(max))
    }

    pub fn next_attempt_at(&self, retry_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=self.jitter_ms)
        };
        let delay = self.delay_for(retry_count) + Duration::from_millis(jitter);
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Outcome of one attempt at one item.
#[derive(Debug)]
pub(crate) struct AttemptReport {
    pub item_id: DeadLetterId,
    pub elapsed: Duration,
    pub result: Result<(), HandlerError>,
}

/// Run the handler for one item on its own task.
///
/// The attempt is aborted after `timeout`. A panic inside the handler is
/// contained to that task and reported as [`HandlerError::Panicked`].
pub(crate) async fn run_attempt(
    handler: Arc<dyn WebhookHandler>,
    item: DeadLetterItem,
    timeout: Duration,
) -> AttemptReport {
    let started = Instant::now();
    let payload = item.payload;

    let mut task = tokio::spawn(async move { handler.handle(&payload).await });

    let result = match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) if join_error.is_panic() => Err(HandlerError::Panicked),
        Ok(Err(_)) => Err(HandlerError::failed("handler task cancelled")),
        Err(_) => {
            task.abort();
            Err(HandlerError::Timeout(timeout))
        }
    };

    AttemptReport {
        item_id: item.id,
        elapsed: started.elapsed(),
        result,
    }
}
