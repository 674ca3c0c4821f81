//! Cache-fronted enrichment endpoints.
//!
//! These endpoints dress up result cards: an AI description of a café photo,
//! community mentions from the social platform, and one-line match reasons.
//! All three are best-effort; an upstream or parse failure returns 200 with an
//! empty default so the page renders without the enrichment instead of
//! breaking. Failures are never cached.
//!
//! Each endpoint memoizes by a semantic fingerprint of its inputs rather than
//! the raw body, so equivalent requests hit the same entry.

use axum::{
    Json, Router, debug_handler, extract::State, response::IntoResponse, routing::post,
};
use garde::Validate;
use shared::api::{
    ImageDescriptionPayload, ImageDescriptionResponse, MatchReasonsPayload, MatchReasonsResponse,
    SocialMentionsPayload, SocialMentionsResponse,
};

use crate::{
    cache::fingerprint, error::AppError, services::aggregate_mentions, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/image-description", post(image_description))
        .route("/social-mentions", post(social_mentions))
        .route("/match-reasons", post(match_reasons))
}

#[debug_handler]
async fn image_description(
    State(state): State<AppState>,
    Json(payload): Json<ImageDescriptionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let key = fingerprint(&[&payload.image_url]);

    if let Some(description) = state.caches.image_descriptions.get(&key).await {
        return Ok(Json(ImageDescriptionResponse { description }));
    }

    let description = match state.llm.describe_image(&payload.image_url).await {
        Ok(description) => {
            state
                .caches
                .image_descriptions
                .put(key, description.clone())
                .await;
            description
        }
        Err(err) => {
            tracing::warn!(error = ?err, "image description failed, degrading to empty");
            String::new()
        }
    };

    Ok(Json(ImageDescriptionResponse { description }))
}

#[debug_handler]
async fn social_mentions(
    State(state): State<AppState>,
    Json(payload): Json<SocialMentionsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let key = fingerprint(&[&payload.cafe_name, &payload.city]);

    if let Some(posts) = state.caches.social_mentions.get(&key).await {
        return Ok(Json(SocialMentionsResponse { posts }));
    }

    let queries = vec![
        format!("\"{}\" {}", payload.cafe_name, payload.city),
        format!("{} {} cafe", payload.cafe_name, payload.city),
        format!("{} {} coffee", payload.cafe_name, payload.city),
    ];

    let posts = aggregate_mentions(state.social.as_ref(), &queries).await;

    // An empty merge can mean every subquery failed, so only hits are cached.
    if !posts.is_empty() {
        state.caches.social_mentions.put(key, posts.clone()).await;
    }

    Ok(Json(SocialMentionsResponse { posts }))
}

#[debug_handler]
async fn match_reasons(
    State(state): State<AppState>,
    Json(payload): Json<MatchReasonsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut candidate_ids: Vec<&str> =
        payload.candidates.iter().map(|c| c.place_id.as_str()).collect();
    candidate_ids.sort_unstable();

    let mut parts: Vec<&str> = vec![payload.reference_cafe.as_str()];
    parts.extend(payload.vibes.iter().map(String::as_str));
    parts.extend(candidate_ids);
    let key = fingerprint(&parts);

    if let Some(reasons) = state.caches.match_reasons.get(&key).await {
        return Ok(Json(MatchReasonsResponse { reasons }));
    }

    let reasons = match state
        .llm
        .match_reasons(&payload.reference_cafe, &payload.vibes, &payload.candidates)
        .await
    {
        Ok(reasons) => {
            state.caches.match_reasons.put(key, reasons.clone()).await;
            reasons
        }
        Err(err) => {
            tracing::warn!(error = ?err, "match reasoning failed, degrading to empty");
            Vec::new()
        }
    };

    Ok(Json(MatchReasonsResponse { reasons }))
}
