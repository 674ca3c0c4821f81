//! One-time merge of pre-login data into the authenticated identity.
//!
//! Before signing in, a caller accumulates place interactions and rate-limit
//! quota under the `ip:<hash>` identity. On login the client calls this
//! endpoint once; interaction records are re-keyed to `user:<id>` and the
//! address-keyed counter is folded into the user counter so a fresh identity
//! does not mean fresh quota.
//!
//! A marker claimed per (address hash, user id) pair makes re-invocation a
//! no-op - a partially failed run reports its errors but is not retried, so
//! records can never be double counted.
//!
//! Re-keying is best-effort: each record migrates independently and failures
//! are collected per record without aborting the batch.

use axum::{Json, Router, debug_handler, extract::State, http::HeaderMap, response::IntoResponse, routing::post};
use shared::api::MigrateResponse;

use crate::{
    error::AppError,
    middleware::identity::{AuthUser, client_address, hash_address},
    state::AppState,
    stores::Stores,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(migrate))
}

#[debug_handler]
async fn migrate(
    user: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let address = client_address(&headers);
    let address_hash = hash_address(&address, &state.config.ip_hash_salt);

    if !state
        .stores
        .migrations
        .try_claim(&address_hash, &user.id)
        .await?
    {
        tracing::info!(user_id = %user.id, "anonymous data already migrated, skipping");
        return Ok(Json(MigrateResponse {
            migrated_count: 0,
            errors: Vec::new(),
        }));
    }

    let anonymous_identity = format!("ip:{}", address_hash);
    let user_identity = format!("user:{}", user.id);

    let (migrated_count, mut errors) =
        migrate_interactions(&state.stores, &anonymous_identity, &user_identity).await;

    if let Err(err) = state.limiter.merge(&address, &user.id).await {
        tracing::error!(error = ?err, user_id = %user.id, "rate limit merge failed");
        errors.push("rate limit counter merge failed".to_string());
    }

    tracing::info!(
        user_id = %user.id,
        migrated = migrated_count,
        failed = errors.len(),
        "anonymous data migrated"
    );

    Ok(Json(MigrateResponse {
        migrated_count,
        errors,
    }))
}

/// Re-keys every interaction record from `from` to `to`. Each record migrates
/// independently; a failure is reported and the batch continues.
async fn migrate_interactions(stores: &Stores, from: &str, to: &str) -> (usize, Vec<String>) {
    let records = match stores.interactions.list(from).await {
        Ok(records) => records,
        Err(err) => {
            tracing::error!(error = ?err, "listing anonymous interactions failed");
            return (0, vec!["could not list anonymous interactions".to_string()]);
        }
    };

    let mut migrated = 0;
    let mut errors = Vec::new();

    for record in records {
        if let Err(err) = stores.interactions.upsert(to, &record).await {
            tracing::warn!(error = ?err, place_id = %record.place_id, "record migration failed");
            errors.push(format!("failed to migrate place {}", record.place_id));
            continue;
        }

        // Delete failures leave a stray anonymous record but never a lost one.
        if let Err(err) = stores
            .interactions
            .delete(from, &record.place_id, &record.context_fingerprint)
            .await
        {
            tracing::warn!(error = ?err, place_id = %record.place_id, "anonymous record cleanup failed");
        }

        migrated += 1;
    }

    (migrated, errors)
}
