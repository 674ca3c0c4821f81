//! Shared test utilities for API handler tests.
//!
//! Provides common mock factories, a deterministic `ManualClock`, and a
//! flexible `TestStateBuilder` for constructing `AppState` instances with only
//! the mocks needed for each test.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, mock_search_state};
//!
//! let mut store = MockSearchStateStore::new();
//! store.expect_get().returning(|_, _| Ok(Some(mock_search_state("s1"))));
//!
//! let state = TestStateBuilder::new()
//!     .with_search_state_store(store)
//!     .build();
//! ```

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use shared::api::OriginPlacePayload;

use crate::cache::{CacheConfig, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::models::{PlaceInteraction, SearchContext, SearchParams, SearchState};
use crate::services::{MockLlmClient, MockSocialSearchClient, MockTokenVerifier};
use crate::state::{AppState, Caches};
use crate::stores::{
    MockCounterStore, MockInteractionStore, MockMigrationStore, MockSearchStateStore, RateLimiter,
    Stores,
};

/// Settable clock for TTL and window tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub fn advance(&self, delta: Duration) {
        *self.now.lock().unwrap() += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        redis_url: "redis://test".to_string(),
        ip_hash_salt: "test-salt".to_string(),
        auth_verify_url: "https://auth.test/v1/user".to_string(),
        auth_api_key: "test".to_string(),
        llm_api_url: "https://llm.test/v1/chat/completions".to_string(),
        llm_api_key: "test".to_string(),
        llm_model: "test-model".to_string(),
        social_api_url: "https://social.test".to_string(),
        rate_limit_max: 10,
        rate_limit_window_hours: 24,
        env: "test".to_string(),
        sentry_dsn: None,
    }
}

/// Creates a pending search record for the given id.
pub fn mock_search_state(search_id: &str) -> SearchState {
    SearchState::new(
        search_id.to_string(),
        SearchParams {
            origin_places: vec![OriginPlacePayload {
                place_id: "origin-1".to_string(),
                name: Some("Fábrica".to_string()),
            }],
            destination: "Lisbon".to_string(),
            vibes: vec!["cozy".to_string()],
            free_text: None,
        },
        Utc::now(),
    )
}

/// Creates a search context for the given destination.
pub fn mock_context(destination: &str) -> SearchContext {
    SearchContext {
        destination: destination.to_string(),
        vibes: vec!["cozy".to_string()],
        free_text: None,
        origin_place_ids: vec!["origin-1".to_string()],
    }
}

/// Creates a viewed-but-unsaved interaction in the given context.
pub fn mock_interaction(place_id: &str, context: SearchContext) -> PlaceInteraction {
    PlaceInteraction::viewed(
        place_id.to_string(),
        Some(format!("Café {}", place_id)),
        context,
        Utc::now(),
    )
}

/// Builder for constructing test `AppState` with custom mocks.
///
/// Uses default (empty) mocks for any store/service not explicitly set.
/// This allows tests to only configure the mocks they actually need.
pub struct TestStateBuilder {
    counter_store: Option<MockCounterStore>,
    search_state_store: Option<MockSearchStateStore>,
    interaction_store: Option<MockInteractionStore>,
    migration_store: Option<MockMigrationStore>,
    verifier: Option<MockTokenVerifier>,
    llm: Option<MockLlmClient>,
    social: Option<MockSocialSearchClient>,
    clock: Option<Arc<dyn Clock>>,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            counter_store: None,
            search_state_store: None,
            interaction_store: None,
            migration_store: None,
            verifier: None,
            llm: None,
            social: None,
            clock: None,
        }
    }

    pub fn with_counter_store(mut self, store: MockCounterStore) -> Self {
        self.counter_store = Some(store);
        self
    }

    pub fn with_search_state_store(mut self, store: MockSearchStateStore) -> Self {
        self.search_state_store = Some(store);
        self
    }

    pub fn with_interaction_store(mut self, store: MockInteractionStore) -> Self {
        self.interaction_store = Some(store);
        self
    }

    pub fn with_migration_store(mut self, store: MockMigrationStore) -> Self {
        self.migration_store = Some(store);
        self
    }

    pub fn with_verifier(mut self, verifier: MockTokenVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_llm(mut self, llm: MockLlmClient) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_social(mut self, social: MockSocialSearchClient) -> Self {
        self.social = Some(social);
        self
    }

    #[allow(dead_code)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let config = test_config();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let counters: Arc<dyn crate::stores::CounterStore> =
            Arc::new(self.counter_store.unwrap_or_else(MockCounterStore::new));

        let stores = Stores {
            counters: counters.clone(),
            search_states: Arc::new(
                self.search_state_store
                    .unwrap_or_else(MockSearchStateStore::new),
            ),
            interactions: Arc::new(
                self.interaction_store
                    .unwrap_or_else(MockInteractionStore::new),
            ),
            migrations: Arc::new(self.migration_store.unwrap_or_else(MockMigrationStore::new)),
        };

        let limiter = Arc::new(RateLimiter::new(
            counters,
            clock.clone(),
            config.rate_limit_max,
            config.rate_limit_window(),
        ));

        let caches = Caches {
            image_descriptions: Arc::new(ResponseCache::with_clock(
                CacheConfig {
                    ttl: Duration::hours(1),
                    sweep_threshold: 200,
                },
                clock.clone(),
            )),
            social_mentions: Arc::new(ResponseCache::with_clock(
                CacheConfig {
                    ttl: Duration::minutes(10),
                    sweep_threshold: 100,
                },
                clock.clone(),
            )),
            match_reasons: Arc::new(ResponseCache::with_clock(
                CacheConfig {
                    ttl: Duration::minutes(30),
                    sweep_threshold: 100,
                },
                clock,
            )),
        };

        AppState {
            config,
            stores,
            limiter,
            caches,
            verifier: Arc::new(self.verifier.unwrap_or_else(MockTokenVerifier::new)),
            llm: Arc::new(self.llm.unwrap_or_else(MockLlmClient::new)),
            social: Arc::new(self.social.unwrap_or_else(MockSocialSearchClient::new)),
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
