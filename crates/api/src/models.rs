use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::api::{OriginPlacePayload, SearchContextPayload, UpdateSearchPayload};

use crate::cache::fingerprint;

/// Closed set of pipeline stages a search can fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    RateLimit,
    Geocoding,
    PlaceSearch,
    AiAnalysis,
    Unknown,
}

impl FailureStage {
    /// Parses the wire form; anything outside the closed set is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rate_limit" => Some(Self::RateLimit),
            "geocoding" => Some(Self::Geocoding),
            "place_search" => Some(Self::PlaceSearch),
            "ai_analysis" => Some(Self::AiAnalysis),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Pending,
    Success,
    Failed,
}

/// The inputs a search started with, kept on the record so a client can resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub origin_places: Vec<OriginPlacePayload>,
    pub destination: String,
    #[serde(default)]
    pub vibes: Vec<String>,
    #[serde(default)]
    pub free_text: Option<String>,
}

/// Attempted transition out of a terminal state.
#[derive(Debug)]
pub struct TransitionError {
    pub from: SearchStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let from = match self.from {
            SearchStatus::Pending => "pending",
            SearchStatus::Success => "success",
            SearchStatus::Failed => "failed",
        };
        write!(f, "search is already terminal (status: {})", from)
    }
}

impl std::error::Error for TransitionError {}

/// Lifecycle record for a user-initiated search.
///
/// Status moves exactly once, pending to success or pending to failed. A second
/// terminal transition is rejected; pagination updates never touch status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub search_id: String,
    pub params: SearchParams,
    pub status: SearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_stage: Option<FailureStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub all_results: Vec<serde_json::Value>,
    #[serde(default)]
    pub has_more_pages: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchState {
    pub fn new(search_id: String, params: SearchParams, now: DateTime<Utc>) -> Self {
        Self {
            search_id,
            params,
            status: SearchStatus::Pending,
            failure_stage: None,
            failure_message: None,
            results: Vec::new(),
            all_results: Vec::new(),
            has_more_pages: false,
            next_page_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SearchStatus::Success | SearchStatus::Failed)
    }

    pub fn mark_successful(
        &mut self,
        results: Vec<serde_json::Value>,
        all_results: Vec<serde_json::Value>,
        has_more_pages: bool,
        next_page_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError { from: self.status });
        }

        self.status = SearchStatus::Success;
        self.results = results;
        self.all_results = all_results;
        self.has_more_pages = has_more_pages;
        self.next_page_token = next_page_token;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        stage: FailureStage,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError { from: self.status });
        }

        self.status = SearchStatus::Failed;
        self.failure_stage = Some(stage);
        self.failure_message = Some(message);
        self.updated_at = now;
        Ok(())
    }

    /// Merges pagination/result fields. Allowed in any status since load-more
    /// continues after a successful first page.
    pub fn apply_update(&mut self, update: UpdateSearchPayload, now: DateTime<Utc>) {
        if let Some(results) = update.results {
            self.results = results;
        }
        if let Some(all_results) = update.all_results {
            self.all_results = all_results;
        }
        if let Some(has_more_pages) = update.has_more_pages {
            self.has_more_pages = has_more_pages;
        }
        if let Some(next_page_token) = update.next_page_token {
            self.next_page_token = Some(next_page_token);
        }
        self.updated_at = now;
    }
}

/// The search context a place interaction happened in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContext {
    pub destination: String,
    #[serde(default)]
    pub vibes: Vec<String>,
    #[serde(default)]
    pub free_text: Option<String>,
    #[serde(default)]
    pub origin_place_ids: Vec<String>,
}

impl SearchContext {
    /// Stable fingerprint; vibe and origin order do not matter.
    pub fn fingerprint(&self) -> String {
        let mut vibes = self.vibes.clone();
        vibes.sort();
        let mut origins = self.origin_place_ids.clone();
        origins.sort();

        fingerprint(&[
            &self.destination,
            &vibes.join(","),
            self.free_text.as_deref().unwrap_or(""),
            &origins.join(","),
        ])
    }
}

impl From<SearchContextPayload> for SearchContext {
    fn from(payload: SearchContextPayload) -> Self {
        Self {
            destination: payload.destination,
            vibes: payload.vibes,
            free_text: payload.free_text,
            origin_place_ids: payload.origin_place_ids,
        }
    }
}

/// View/save state of one place for one identity in one search context.
///
/// Saved implies viewed: a save on a place never seen before records the view too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceInteraction {
    pub place_id: String,
    #[serde(default)]
    pub place_name: Option<String>,
    pub context: SearchContext,
    pub context_fingerprint: String,
    pub viewed: bool,
    pub saved: bool,
    pub viewed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlaceInteraction {
    pub fn viewed(
        place_id: String,
        place_name: Option<String>,
        context: SearchContext,
        now: DateTime<Utc>,
    ) -> Self {
        let context_fingerprint = context.fingerprint();
        Self {
            place_id,
            place_name,
            context,
            context_fingerprint,
            viewed: true,
            saved: false,
            viewed_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SearchParams {
        SearchParams {
            origin_places: vec![OriginPlacePayload {
                place_id: "origin-1".to_string(),
                name: Some("Fábrica".to_string()),
            }],
            destination: "Lisbon".to_string(),
            vibes: vec!["cozy".to_string()],
            free_text: None,
        }
    }

    #[test]
    fn pending_to_success_then_fail_is_rejected() {
        let now = Utc::now();
        let mut state = SearchState::new("s1".to_string(), params(), now);

        state
            .mark_successful(vec![serde_json::json!({"id": "p1"})], vec![], false, None, now)
            .unwrap();
        assert_eq!(state.status, SearchStatus::Success);

        let err = state
            .mark_failed(FailureStage::Unknown, "late failure".to_string(), now)
            .unwrap_err();
        assert_eq!(err.from, SearchStatus::Success);

        // First terminal record stays intact.
        assert_eq!(state.status, SearchStatus::Success);
        assert_eq!(state.results.len(), 1);
        assert!(state.failure_stage.is_none());
    }

    #[test]
    fn pending_to_failed_then_success_is_rejected() {
        let now = Utc::now();
        let mut state = SearchState::new("s1".to_string(), params(), now);

        state
            .mark_failed(FailureStage::Geocoding, "no results".to_string(), now)
            .unwrap();

        assert!(state.mark_successful(vec![], vec![], false, None, now).is_err());
        assert_eq!(state.status, SearchStatus::Failed);
        assert_eq!(state.failure_stage, Some(FailureStage::Geocoding));
    }

    #[test]
    fn update_keeps_status_and_merges_pagination() {
        let now = Utc::now();
        let mut state = SearchState::new("s1".to_string(), params(), now);
        state
            .mark_successful(vec![], vec![], true, Some("page-1".to_string()), now)
            .unwrap();

        state.apply_update(
            UpdateSearchPayload {
                next_page_token: Some("page-2".to_string()),
                has_more_pages: Some(false),
                ..Default::default()
            },
            now,
        );

        assert_eq!(state.status, SearchStatus::Success);
        assert_eq!(state.next_page_token.as_deref(), Some("page-2"));
        assert!(!state.has_more_pages);
    }

    #[test]
    fn failure_stage_parse_is_closed() {
        assert_eq!(FailureStage::parse("rate_limit"), Some(FailureStage::RateLimit));
        assert_eq!(FailureStage::parse("place_search"), Some(FailureStage::PlaceSearch));
        assert_eq!(FailureStage::parse("timeout"), None);
        assert_eq!(FailureStage::parse("RATE_LIMIT"), None);
    }

    #[test]
    fn context_fingerprint_ignores_list_order() {
        let a = SearchContext {
            destination: "Lisbon".to_string(),
            vibes: vec!["cozy".to_string(), "minimal".to_string()],
            free_text: Some("good espresso".to_string()),
            origin_place_ids: vec!["p1".to_string(), "p2".to_string()],
        };
        let b = SearchContext {
            vibes: vec!["minimal".to_string(), "cozy".to_string()],
            origin_place_ids: vec!["p2".to_string(), "p1".to_string()],
            ..a.clone()
        };

        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = SearchContext {
            destination: "Porto".to_string(),
            ..a.clone()
        };
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
