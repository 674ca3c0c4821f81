use std::sync::Arc;

use shared::api::{MatchReason, SocialPost};

use crate::{
    cache::ResponseCache,
    config::Config,
    services::{LlmClient, SocialSearchClient, TokenVerifier},
    stores::{RateLimiter, Stores},
};

/// Per-handler response caches. Process-local, best-effort.
#[derive(Clone)]
pub struct Caches {
    pub image_descriptions: Arc<ResponseCache<String>>,
    pub social_mentions: Arc<ResponseCache<Vec<SocialPost>>>,
    pub match_reasons: Arc<ResponseCache<Vec<MatchReason>>>,
}

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Persistence stores (Redis).
    pub stores: Stores,
    /// Dual-dimension quota enforcement.
    pub limiter: Arc<RateLimiter>,
    /// In-process response caches.
    pub caches: Caches,
    /// Bearer-token verifier.
    pub verifier: Arc<dyn TokenVerifier>,
    /// LLM provider.
    pub llm: Arc<dyn LlmClient>,
    /// Social-content search.
    pub social: Arc<dyn SocialSearchClient>,
}
