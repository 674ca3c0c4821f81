//! Place-interaction storage.
//!
//! Each record lives under its own JSON key; a per-identity set indexes the
//! `{fingerprint}:{place_id}` members so records can be enumerated for the
//! filter query and for login migration. Index entries whose record is gone
//! are skipped lazily.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

use crate::models::PlaceInteraction;

/// Store for place view/save records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Create or replace a record.
    async fn upsert(&self, identity: &str, interaction: &PlaceInteraction) -> Result<()>;

    /// Get one record by (place, context fingerprint).
    async fn get(
        &self,
        identity: &str,
        place_id: &str,
        context_fingerprint: &str,
    ) -> Result<Option<PlaceInteraction>>;

    /// All records for an identity.
    async fn list(&self, identity: &str) -> Result<Vec<PlaceInteraction>>;

    /// Delete one record (returns true if it existed).
    async fn delete(
        &self,
        identity: &str,
        place_id: &str,
        context_fingerprint: &str,
    ) -> Result<bool>;
}

/// Redis implementation of InteractionStore.
#[derive(Clone)]
pub struct RedisInteractionStore {
    client: redis::Client,
}

impl RedisInteractionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn record_key(identity: &str, context_fingerprint: &str, place_id: &str) -> String {
        format!("interaction:{}:{}:{}", identity, context_fingerprint, place_id)
    }

    fn index_key(identity: &str) -> String {
        format!("interactions:{}", identity)
    }

    fn index_member(context_fingerprint: &str, place_id: &str) -> String {
        format!("{}:{}", context_fingerprint, place_id)
    }
}

#[async_trait]
impl InteractionStore for RedisInteractionStore {
    async fn upsert(&self, identity: &str, interaction: &PlaceInteraction) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::record_key(
            identity,
            &interaction.context_fingerprint,
            &interaction.place_id,
        );

        let _: () = conn.set(&key, serde_json::to_string(interaction)?).await?;
        let _: () = conn
            .sadd(
                Self::index_key(identity),
                Self::index_member(&interaction.context_fingerprint, &interaction.place_id),
            )
            .await?;

        Ok(())
    }

    async fn get(
        &self,
        identity: &str,
        place_id: &str,
        context_fingerprint: &str,
    ) -> Result<Option<PlaceInteraction>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::record_key(identity, context_fingerprint, place_id);

        let json: Option<String> = conn.get(&key).await?;

        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, identity: &str) -> Result<Vec<PlaceInteraction>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let members: Vec<String> = conn.smembers(Self::index_key(identity)).await?;

        let mut records = Vec::with_capacity(members.len());
        for member in members {
            let key = format!("interaction:{}:{}", identity, member);
            let json: Option<String> = conn.get(&key).await?;

            if let Some(j) = json
                && let Ok(record) = serde_json::from_str::<PlaceInteraction>(&j)
            {
                records.push(record);
            }
        }

        Ok(records)
    }

    async fn delete(
        &self,
        identity: &str,
        place_id: &str,
        context_fingerprint: &str,
    ) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::record_key(identity, context_fingerprint, place_id);

        let deleted: i64 = conn.del(&key).await?;
        let _: () = conn
            .srem(
                Self::index_key(identity),
                Self::index_member(context_fingerprint, place_id),
            )
            .await?;

        Ok(deleted > 0)
    }
}
