//! Shared API request/response types used by both the web client and the API server.
//!
//! All wire types serialize as camelCase because the frontend is JavaScript.

use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Max free-text length accepted on search inputs.
const MAX_FREE_TEXT_LEN: usize = 500;
/// Max origin cafés a search can start from.
const MAX_ORIGIN_PLACES: usize = 5;
/// Max vibe toggles per search.
const MAX_VIBES: usize = 10;

/// Result of a rate-limit consultation. Returned with 200 when allowed and as
/// the 429 body when blocked, so the client can render the reset time either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitCheckResponse {
    pub allowed: bool,
    /// Slots left in the current window (0 when blocked).
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub current_count: i64,
    /// Which dimension tripped: "identity", "address", or "unavailable"
    /// when the counter store could not be reached (fail-closed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    pub is_authenticated: bool,
}

/// A café the user picked as a taste reference.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OriginPlacePayload {
    #[garde(length(min = 1, max = 256))]
    pub place_id: String,
    #[garde(skip)]
    #[serde(default)]
    pub name: Option<String>,
}

/// Start a search-lifecycle record.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitializeSearchPayload {
    #[garde(length(min = 1, max = 128))]
    pub search_id: String,
    #[garde(length(min = 1, max = MAX_ORIGIN_PLACES), dive)]
    pub origin_places: Vec<OriginPlacePayload>,
    #[garde(length(min = 1, max = 256))]
    pub destination: String,
    #[garde(length(max = MAX_VIBES))]
    #[serde(default)]
    pub vibes: Vec<String>,
    #[garde(inner(length(max = MAX_FREE_TEXT_LEN)))]
    #[serde(default)]
    pub free_text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeSearchResponse {
    pub success: bool,
    pub search_id: String,
}

/// Terminal-fail transition. `stage` must be one of the closed set the server
/// understands; anything else is a validation error.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FailSearchPayload {
    #[garde(length(min = 1, max = 128))]
    pub search_id: String,
    #[garde(length(min = 1, max = 64))]
    pub stage: String,
    #[garde(length(max = 1024))]
    pub message: String,
}

/// Terminal-success transition carrying the result payloads.
/// Results are opaque place cards assembled by the search pipeline.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SucceedSearchPayload {
    #[garde(length(min = 1, max = 128))]
    pub search_id: String,
    #[garde(skip)]
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[garde(skip)]
    #[serde(default)]
    pub all_results: Vec<serde_json::Value>,
    #[garde(skip)]
    #[serde(default)]
    pub has_more_pages: bool,
    #[garde(skip)]
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Partial update for a record (pagination state after load-more).
/// Never changes status; absent fields are left untouched.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSearchPayload {
    #[garde(skip)]
    #[serde(default)]
    pub results: Option<Vec<serde_json::Value>>,
    #[garde(skip)]
    #[serde(default)]
    pub all_results: Option<Vec<serde_json::Value>>,
    #[garde(skip)]
    #[serde(default)]
    pub has_more_pages: Option<bool>,
    #[garde(skip)]
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// The search context an interaction happened in. Fingerprinted server-side so
/// later searches with the same context can deprioritize already-seen places.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchContextPayload {
    #[garde(length(min = 1, max = 256))]
    pub destination: String,
    #[garde(length(max = MAX_VIBES))]
    #[serde(default)]
    pub vibes: Vec<String>,
    #[garde(inner(length(max = MAX_FREE_TEXT_LEN)))]
    #[serde(default)]
    pub free_text: Option<String>,
    #[garde(length(max = MAX_ORIGIN_PLACES))]
    #[serde(default)]
    pub origin_place_ids: Vec<String>,
}

/// Record a view/save/unsave action on a place card.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPayload {
    /// One of "view", "save", "unsave".
    #[garde(pattern(r"^(view|save|unsave)$"))]
    pub action: String,
    #[garde(length(min = 1, max = 256))]
    pub place_id: String,
    #[garde(inner(length(max = 256)))]
    #[serde(default)]
    pub place_name: Option<String>,
    #[garde(dive)]
    pub search_context: SearchContextPayload,
}

/// Query string for the seen-but-unsaved filter. List fields arrive
/// comma-separated because this is a GET.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub destination: String,
    #[serde(default)]
    pub vibes: Option<String>,
    #[serde(default)]
    pub free_text: Option<String>,
    #[serde(default)]
    pub origin_place_ids: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    pub place_ids_to_penalize: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateResponse {
    pub migrated_count: usize,
    pub errors: Vec<String>,
}

/// Ask for an AI description of a café photo.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptionPayload {
    #[garde(length(min = 1, max = 2048))]
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageDescriptionResponse {
    /// Empty when the upstream call failed (the UI degrades silently).
    pub description: String,
}

/// Ask for community mentions of a café.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SocialMentionsPayload {
    #[garde(length(min = 1, max = 256))]
    pub cafe_name: String,
    #[garde(length(min = 1, max = 256))]
    pub city: String,
}

/// A community post mentioning a café.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    pub score: f64,
    pub author: String,
    /// Seconds since the Unix epoch, as the social platform reports it.
    pub created_utc: i64,
    pub permalink: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SocialMentionsResponse {
    pub posts: Vec<SocialPost>,
}

/// A candidate café to generate a match reason for.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    #[garde(length(min = 1, max = 256))]
    pub place_id: String,
    #[garde(length(min = 1, max = 256))]
    pub name: String,
}

/// Ask for one-line "why this matches" blurbs for a batch of candidates.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchReasonsPayload {
    #[garde(length(min = 1, max = 20), dive)]
    pub candidates: Vec<MatchCandidate>,
    #[garde(length(min = 1, max = 256))]
    pub reference_cafe: String,
    #[garde(length(max = MAX_VIBES))]
    #[serde(default)]
    pub vibes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReason {
    pub place_id: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchReasonsResponse {
    pub reasons: Vec<MatchReason>,
}
