//! Login-migration markers.
//!
//! One marker per (address hash, user id) pair. Claiming is atomic
//! (SET NX), so a migration runs at most once per pair even when two
//! login requests race.

use anyhow::Result;
use async_trait::async_trait;

/// Store for migration-completed markers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Claim the marker. Returns false when the pair was already migrated.
    async fn try_claim(&self, address_hash: &str, user_id: &str) -> Result<bool>;
}

/// Redis implementation of MigrationStore.
#[derive(Clone)]
pub struct RedisMigrationStore {
    client: redis::Client,
}

impl RedisMigrationStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn marker_key(address_hash: &str, user_id: &str) -> String {
        format!("migrated:{}:{}", address_hash, user_id)
    }
}

#[async_trait]
impl MigrationStore for RedisMigrationStore {
    async fn try_claim(&self, address_hash: &str, user_id: &str) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let claimed: bool = redis::cmd("SET")
            .arg(Self::marker_key(address_hash, user_id))
            .arg(1)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        Ok(claimed)
    }
}
