//! Search-lifecycle record storage.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

use crate::models::SearchState;

/// Records are kept for 30 days; a search older than that is not resumable.
const STATE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Store for search-lifecycle records, keyed by (identity, search id).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchStateStore: Send + Sync {
    /// Get a record, or None when the key was never written or has expired.
    async fn get(&self, identity: &str, search_id: &str) -> Result<Option<SearchState>>;

    /// Write a record (create or replace).
    async fn put(&self, identity: &str, state: &SearchState) -> Result<()>;
}

/// Redis implementation of SearchStateStore.
#[derive(Clone)]
pub struct RedisSearchStateStore {
    client: redis::Client,
}

impl RedisSearchStateStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn state_key(identity: &str, search_id: &str) -> String {
        format!("search:{}:{}", identity, search_id)
    }
}

#[async_trait]
impl SearchStateStore for RedisSearchStateStore {
    async fn get(&self, identity: &str, search_id: &str) -> Result<Option<SearchState>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::state_key(identity, search_id);

        let json: Option<String> = conn.get(&key).await?;

        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, identity: &str, state: &SearchState) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::state_key(identity, &state.search_id);

        let _: () = conn
            .set_ex(&key, serde_json::to_string(state)?, STATE_TTL_SECS)
            .await?;
        Ok(())
    }
}
