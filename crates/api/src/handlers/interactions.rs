//! Place-interaction endpoints.
//!
//! The results UI reports which place cards a caller viewed and which they
//! saved, together with the search context that produced them. Later searches
//! with the same context ask the filter endpoint for places the caller already
//! saw but did not save, and deprioritize those.
//!
//! Saved is a strict superset of viewed: saving a never-seen place records the
//! view too, and unsaving keeps the view.
//!
//! Endpoints:
//! - POST /interactions - record a view/save/unsave action
//! - GET /interactions/filter - seen-but-unsaved place ids for a context

use axum::{
    Json, Router, debug_handler,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use garde::Validate;
use shared::api::{FilterQuery, FilterResponse, InteractionPayload, SuccessResponse};

use crate::{
    error::AppError,
    middleware::identity::Caller,
    models::{PlaceInteraction, SearchContext},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(record))
        .route("/filter", get(filter))
}

#[debug_handler]
async fn record(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<InteractionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let identity = caller.identity.key();
    let context = SearchContext::from(payload.search_context);
    let fingerprint = context.fingerprint();
    let now = Utc::now();

    let existing = state
        .stores
        .interactions
        .get(&identity, &payload.place_id, &fingerprint)
        .await?;

    let mut record = existing.unwrap_or_else(|| {
        PlaceInteraction::viewed(
            payload.place_id.clone(),
            payload.place_name.clone(),
            context,
            now,
        )
    });

    match payload.action.as_str() {
        "view" => {
            record.viewed = true;
        }
        "save" => {
            record.viewed = true;
            record.saved = true;
        }
        "unsave" => {
            record.saved = false;
        }
        // Unreachable past garde validation.
        other => {
            return Err(AppError::Validation(format!("unknown action: {}", other)));
        }
    }

    if payload.place_name.is_some() {
        record.place_name = payload.place_name;
    }
    record.updated_at = now;

    state.stores.interactions.upsert(&identity, &record).await?;

    tracing::info!(
        identity = %identity,
        place_id = %record.place_id,
        action = %payload.action,
        "interaction recorded"
    );

    Ok(Json(SuccessResponse { success: true }))
}

/// Splits a comma-separated query value into trimmed, non-empty items.
fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[debug_handler]
async fn filter(
    caller: Caller,
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.destination.trim().is_empty() {
        return Err(AppError::Validation("destination is required".to_string()));
    }

    let context = SearchContext {
        destination: query.destination,
        vibes: split_list(query.vibes),
        free_text: query.free_text.filter(|t| !t.trim().is_empty()),
        origin_place_ids: split_list(query.origin_place_ids),
    };
    let fingerprint = context.fingerprint();

    let records = state
        .stores
        .interactions
        .list(&caller.identity.key())
        .await?;

    let place_ids_to_penalize: Vec<String> = records
        .into_iter()
        .filter(|r| r.context_fingerprint == fingerprint && r.viewed && !r.saved)
        .map(|r| r.place_id)
        .collect();

    Ok(Json(FilterResponse {
        place_ids_to_penalize,
    }))
}
