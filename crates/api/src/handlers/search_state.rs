//! Search-lifecycle endpoints.
//!
//! A search is a multi-step pipeline driven by the client (geocode the
//! destination, search places, run AI analysis). The record created here lets
//! the client resume or observe a search across page loads.
//!
//! Status moves exactly once, pending to success or pending to failed; a second
//! terminal transition is rejected with 400 and leaves the record untouched.
//!
//! Endpoints:
//! - POST /search-state/initialize - create a pending record
//! - GET /search-state/{searchId} - read the record
//! - POST /search-state/{searchId} - replace the record (session restore)
//! - PATCH /search-state/{searchId} - partial update (pagination state)
//! - POST /search-state/fail - terminal fail transition
//! - POST /search-state/success - terminal success transition

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use garde::Validate;
use shared::api::{
    FailSearchPayload, InitializeSearchPayload, InitializeSearchResponse, SucceedSearchPayload,
    SuccessResponse, UpdateSearchPayload,
};

use crate::{
    error::AppError,
    middleware::identity::Caller,
    models::{FailureStage, SearchParams, SearchState},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize))
        .route("/fail", post(fail))
        .route("/success", post(succeed))
        .route("/{search_id}", get(get_state).post(save).patch(patch))
}

#[debug_handler]
async fn initialize(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<InitializeSearchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let identity = caller.identity.key();
    let params = SearchParams {
        origin_places: payload.origin_places,
        destination: payload.destination,
        vibes: payload.vibes,
        free_text: payload.free_text,
    };

    let record = SearchState::new(payload.search_id.clone(), params, Utc::now());
    state.stores.search_states.put(&identity, &record).await?;

    tracing::info!(identity = %identity, search_id = %payload.search_id, "search initialized");

    Ok((
        StatusCode::CREATED,
        Json(InitializeSearchResponse {
            success: true,
            search_id: payload.search_id,
        }),
    ))
}

#[debug_handler]
async fn get_state(
    caller: Caller,
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .stores
        .search_states
        .get(&caller.identity.key(), &search_id)
        .await?;

    match record {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::External(
            StatusCode::NOT_FOUND,
            "Search not found",
        )),
    }
}

/// Full replace, used by clients restoring a persisted session. The path
/// search id wins over whatever the body carries.
#[debug_handler]
async fn save(
    caller: Caller,
    State(state): State<AppState>,
    Path(search_id): Path<String>,
    Json(mut record): Json<SearchState>,
) -> Result<impl IntoResponse, AppError> {
    record.search_id = search_id;
    state
        .stores
        .search_states
        .put(&caller.identity.key(), &record)
        .await?;

    Ok(Json(SuccessResponse { success: true }))
}

#[debug_handler]
async fn patch(
    caller: Caller,
    State(state): State<AppState>,
    Path(search_id): Path<String>,
    Json(payload): Json<UpdateSearchPayload>,
) -> Result<impl IntoResponse, AppError> {
    let identity = caller.identity.key();

    let mut record = state
        .stores
        .search_states
        .get(&identity, &search_id)
        .await?
        .ok_or(AppError::External(
            StatusCode::NOT_FOUND,
            "Search not found",
        ))?;

    record.apply_update(payload, Utc::now());
    state.stores.search_states.put(&identity, &record).await?;

    Ok(Json(SuccessResponse { success: true }))
}

#[debug_handler]
async fn fail(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<FailSearchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let stage = FailureStage::parse(&payload.stage).ok_or_else(|| {
        AppError::Validation(format!(
            "stage must be one of rate_limit, geocoding, place_search, ai_analysis, unknown (got: {})",
            payload.stage
        ))
    })?;

    let identity = caller.identity.key();
    let mut record = state
        .stores
        .search_states
        .get(&identity, &payload.search_id)
        .await?
        .ok_or(AppError::External(
            StatusCode::NOT_FOUND,
            "Search not found",
        ))?;

    record
        .mark_failed(stage, payload.message, Utc::now())
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state.stores.search_states.put(&identity, &record).await?;

    tracing::info!(
        identity = %identity,
        search_id = %payload.search_id,
        stage = ?stage,
        "search failed"
    );

    Ok(Json(SuccessResponse { success: true }))
}

#[debug_handler]
async fn succeed(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<SucceedSearchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let identity = caller.identity.key();
    let mut record = state
        .stores
        .search_states
        .get(&identity, &payload.search_id)
        .await?
        .ok_or(AppError::External(
            StatusCode::NOT_FOUND,
            "Search not found",
        ))?;

    record
        .mark_successful(
            payload.results,
            payload.all_results,
            payload.has_more_pages,
            payload.next_page_token,
            Utc::now(),
        )
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state.stores.search_states.put(&identity, &record).await?;

    tracing::info!(identity = %identity, search_id = %payload.search_id, "search completed");

    Ok(Json(SuccessResponse { success: true }))
}
