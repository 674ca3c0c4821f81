//! Persistence stores (Redis).
//!
//! This module contains traits and implementations for the key-value
//! persistence layer. Each store is abstracted behind a trait to enable
//! mocking in tests.
//!
//! ## Stores
//!
//! - **rate_limit** - dual-dimension fixed-window counters
//! - **search_state** - search-lifecycle records (30 day TTL)
//! - **interactions** - place view/save records plus per-identity index
//! - **migration** - login-migration markers
//!
//! ## Redis Key Patterns
//!
//! ```text
//! ratelimit:{identity}                        → "{count}:{window_start}" (auto-expires)
//! ratelimit:ip-{address}                      → "{count}:{window_start}" (auto-expires)
//! search:{identity}:{search_id}               → SearchState JSON (30 day TTL)
//! interaction:{identity}:{fingerprint}:{id}   → PlaceInteraction JSON
//! interactions:{identity}                     → Set of "{fingerprint}:{place_id}"
//! migrated:{address_hash}:{user_id}           → marker (SET NX)
//! ```
//!
//! ## Usage in Handlers
//!
//! Stores are accessed via `state.stores`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     state.stores.search_states.put(&identity, &record).await?;
//!     let seen = state.stores.interactions.list(&identity).await?;
//! }
//! ```

mod interactions;
mod migration;
mod rate_limit;
mod search_state;

pub use interactions::{InteractionStore, RedisInteractionStore};
pub use migration::{MigrationStore, RedisMigrationStore};
pub use rate_limit::{
    BlockedBy, Counter, CounterStore, RateLimitDecision, RateLimiter, RedisCounterStore,
    window_active,
};
pub use search_state::{RedisSearchStateStore, SearchStateStore};

#[cfg(test)]
pub use interactions::MockInteractionStore;
#[cfg(test)]
pub use migration::MockMigrationStore;
#[cfg(test)]
pub use rate_limit::MockCounterStore;
#[cfg(test)]
pub use search_state::MockSearchStateStore;

use std::sync::Arc;

/// Collection of all persistence stores.
#[derive(Clone)]
pub struct Stores {
    pub counters: Arc<dyn CounterStore>,
    pub search_states: Arc<dyn SearchStateStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub migrations: Arc<dyn MigrationStore>,
}
