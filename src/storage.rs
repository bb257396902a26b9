use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::types::{DeadLetterId, DeadLetterItem};

/// Durable home for dead-letter items.
///
/// Persistence is best-effort: implementations log and swallow backend
/// errors so that recording a webhook outcome never fails.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert or replace the stored copy of an item.
    async fn record_dead_letter(&self, item: &DeadLetterItem);
    async fn remove_dead_letter(&self, id: DeadLetterId);
    async fn load_dead_letters(&self) -> Vec<DeadLetterItem>;
}

/// Process-local storage. Contents are lost on restart, which suits hosts
/// whose upstream re-sends undelivered webhooks.
#[derive(Default)]
pub struct InMemoryStorage {
    items: Mutex<BTreeMap<DeadLetterId, DeadLetterItem>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn record_dead_letter(&self, item: &DeadLetterItem) {
        self.items.lock().await.insert(item.id, item.clone());
    }

    async fn remove_dead_letter(&self, id: DeadLetterId) {
        self.items.lock().await.remove(&id);
    }

    async fn load_dead_letters(&self) -> Vec<DeadLetterItem> {
        self.items.lock().await.values().cloned().collect()
    }
}
