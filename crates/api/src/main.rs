mod cache;
mod clock;
mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{Router, http};
use chrono::Duration;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cache::{CacheConfig, ResponseCache},
    config::Config,
    services::{HttpLlmClient, HttpSocialSearch, HttpTokenVerifier},
    state::{AppState, Caches},
    stores::{
        RateLimiter, RedisCounterStore, RedisInteractionStore, RedisMigrationStore,
        RedisSearchStateStore, Stores,
    },
};

#[derive(Parser)]
#[command(name = "api")]
#[command(about = "Brewtrip API server")]
struct Args {
    /// Print the effective configuration (secrets redacted) and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = envy::prefixed("BREWTRIP_").from_env::<Config>()?;

    if args.check_config {
        println!(
            "host={} port={} redis={} env={} rate_limit={}/{}h",
            config.host,
            config.port,
            config.redis_url,
            config.env,
            config.rate_limit_max,
            config.rate_limit_window_hours,
        );
        return Ok(());
    }

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let redis = redis::Client::open(config.redis_url.as_str())?;

    // Build stores
    let counters = Arc::new(RedisCounterStore::new(redis.clone()));
    let stores = Stores {
        counters: counters.clone(),
        search_states: Arc::new(RedisSearchStateStore::new(redis.clone())),
        interactions: Arc::new(RedisInteractionStore::new(redis.clone())),
        migrations: Arc::new(RedisMigrationStore::new(redis)),
    };

    let limiter = Arc::new(RateLimiter::new(
        counters,
        Arc::new(clock::SystemClock),
        config.rate_limit_max,
        config.rate_limit_window(),
    ));

    // Per-handler response caches
    let caches = Caches {
        image_descriptions: Arc::new(ResponseCache::new(CacheConfig {
            ttl: Duration::hours(1),
            sweep_threshold: 200,
        })),
        social_mentions: Arc::new(ResponseCache::new(CacheConfig {
            ttl: Duration::minutes(10),
            sweep_threshold: 100,
        })),
        match_reasons: Arc::new(ResponseCache::new(CacheConfig {
            ttl: Duration::minutes(30),
            sweep_threshold: 100,
        })),
    };

    // Build upstream service clients
    let verifier = Arc::new(HttpTokenVerifier::new(
        config.auth_verify_url.clone(),
        config.auth_api_key.clone(),
    )?);
    let llm = Arc::new(HttpLlmClient::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    )?);
    let social = Arc::new(HttpSocialSearch::new(config.social_api_url.clone())?);

    let state = AppState {
        config: config.clone(),
        stores,
        limiter,
        caches,
        verifier,
        llm,
        social,
    };

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let app = Router::new()
        .nest("/health", handlers::health::router())
        .nest("/rate-limit", handlers::rate_limit::router())
        .nest("/search-state", handlers::search_state::router())
        .nest("/interactions", handlers::interactions::router())
        .nest("/insights", handlers::insights::router())
        .nest("/migrate", handlers::migrate::router())
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
