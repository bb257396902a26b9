#[cfg(feature = "redis")]
use async_trait::async_trait;
#[cfg(feature = "redis")]
use redis::{AsyncCommands, RedisResult};

#[cfg(feature = "redis")]
use crate::storage::Storage;
#[cfg(feature = "redis")]
use crate::telemetry::warn_storage;
#[cfg(feature = "redis")]
use crate::types::{DeadLetterId, DeadLetterItem};

/// Dead-letter items stored as JSON values in a Redis hash keyed by item id.
#[cfg(feature = "redis")]
pub struct RedisStorage {
    client: redis::Client,
    prefix: String,
}

#[cfg(feature = "redis")]
impl RedisStorage {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn dead_letter_key(&self) -> String {
        format!("{}:dead_letters", self.prefix)
    }

    async fn connection(&self, operation: &'static str) -> Option<redis::aio::Connection> {
        match self.client.get_tokio_connection().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn_storage(operation, &err);
                None
            }
        }
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl Storage for RedisStorage {
    async fn record_dead_letter(&self, item: &DeadLetterItem) {
        let Some(mut conn) = self.connection("record_dead_letter").await else { return };
        let payload = match serde_json::to_string(item) {
            Ok(payload) => payload,
            Err(err) => return warn_storage("record_dead_letter", &err),
        };
        let result: RedisResult<()> = conn.hset(self.dead_letter_key(), item.id.0, payload).await;
        if let Err(err) = result {
            warn_storage("record_dead_letter", &err);
        }
    }

    async fn remove_dead_letter(&self, id: DeadLetterId) {
        let Some(mut conn) = self.connection("remove_dead_letter").await else { return };
        let result: RedisResult<()> = conn.hdel(self.dead_letter_key(), id.0).await;
        if let Err(err) = result {
            warn_storage("remove_dead_letter", &err);
        }
    }

    async fn load_dead_letters(&self) -> Vec<DeadLetterItem> {
        let Some(mut conn) = self.connection("load_dead_letters").await else { return Vec::new() };
        let values: RedisResult<Vec<String>> = conn.hvals(self.dead_letter_key()).await;
        match values {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| serde_json::from_str::<DeadLetterItem>(&v).ok())
                .collect(),
            Err(err) => {
                warn_storage("load_dead_letters", &err);
                Vec::new()
            }
        }
    }
}
