#[cfg(feature = "postgres")]
use async_trait::async_trait;
#[cfg(feature = "postgres")]
use tokio_postgres::Client;

#[cfg(feature = "postgres")]
use crate::storage::Storage;
#[cfg(feature = "postgres")]
use crate::telemetry::warn_storage;
#[cfg(feature = "postgres")]
use crate::types::{DeadLetterId, DeadLetterItem};

/// Dead-letter items stored as JSONB rows in `webhook_dead_letters`.
#[cfg(feature = "postgres")]
pub struct PostgresStorage {
    client: Client,
}

#[cfg(feature = "postgres")]
impl PostgresStorage {
    pub async fn new(client: Client) -> Result<Self, tokio_postgres::Error> {
        client
            .execute(
                "CREATE TABLE IF NOT EXISTS webhook_dead_letters (
                    id TEXT PRIMARY KEY,
                    payload JSONB NOT NULL
                )",
                &[],
            )
            .await?;

        Ok(Self { client })
    }

    fn row_id(id: DeadLetterId) -> String {
        id.0.to_string()
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl Storage for PostgresStorage {
    async fn record_dead_letter(&self, item: &DeadLetterItem) {
        let payload = match serde_json::to_value(item) {
            Ok(payload) => payload,
            Err(err) => return warn_storage("record_dead_letter", &err),
        };
        let result = self.client.execute(
            "INSERT INTO webhook_dead_letters (id, payload)
             VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload",
            &[&Self::row_id(item.id), &payload],
        ).await;
        if let Err(err) = result {
            warn_storage("record_dead_letter", &err);
        }
    }

    async fn remove_dead_letter(&self, id: DeadLetterId) {
        let result = self.client.execute(
            "DELETE FROM webhook_dead_letters WHERE id = $1",
            &[&Self::row_id(id)],
        ).await;
        if let Err(err) = result {
            warn_storage("remove_dead_letter", &err);
        }
    }

    async fn load_dead_letters(&self) -> Vec<DeadLetterItem> {
        let rows = match self.client
            .query("SELECT payload FROM webhook_dead_letters", &[])
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn_storage("load_dead_letters", &err);
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| row.try_get::<_, serde_json::Value>(0).ok())
            .filter_map(|v| serde_json::from_value::<DeadLetterItem>(v).ok())
            .collect()
    }
}
