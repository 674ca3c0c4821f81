//! Quota consultation endpoint.
//!
//! The client calls this before kicking off a search pipeline. Both the
//! identity and the raw-address dimension are consulted and incremented in one
//! operation; a blocked decision comes back as 429 with the same body shape so
//! the UI can render the reset time.
//!
//! The limiter fails closed: a counter-store outage produces a 429 with a
//! far-future reset, never a 500 and never unlimited requests.

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse,
    routing::post,
};
use shared::api::RateLimitCheckResponse;

use crate::{middleware::identity::Caller, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/check", post(check))
}

async fn check(caller: Caller, State(state): State<AppState>) -> impl IntoResponse {
    let identity = caller.identity.key();
    let decision = state
        .limiter
        .check_and_increment(&identity, &caller.address)
        .await;

    if !decision.allowed {
        tracing::info!(
            identity = %identity,
            blocked_by = ?decision.blocked_by,
            "rate limit exceeded"
        );
    }

    let status = if decision.allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };

    let body = RateLimitCheckResponse {
        allowed: decision.allowed,
        remaining: decision.remaining,
        reset_at: decision.reset_at,
        current_count: decision.current_count,
        blocked_by: decision.blocked_by.map(|b| b.as_str().to_string()),
        is_authenticated: caller.identity.is_authenticated(),
    };

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::identity::Identity;
    use crate::stores::{Counter, MockCounterStore};
    use crate::test_utils::TestStateBuilder;
    use chrono::Utc;

    fn caller() -> Caller {
        Caller {
            identity: Identity::Anonymous("abc123".to_string()),
            address: "1.2.3.4".to_string(),
        }
    }

    #[tokio::test]
    async fn allowed_returns_200_with_remaining() {
        let now = Utc::now().timestamp();

        let mut counters = MockCounterStore::new();
        counters.expect_get().returning(|_| Ok(None));
        counters.expect_incr_in_window().returning(move |_, _, _| {
            Ok(Counter {
                count: 1,
                window_start: now,
            })
        });

        let state = TestStateBuilder::new().with_counter_store(counters).build();

        let response = check(caller(), State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn blocked_returns_429() {
        let now = Utc::now().timestamp();
        let max = crate::test_utils::test_config().rate_limit_max;

        let mut counters = MockCounterStore::new();
        counters.expect_get().returning(move |_| {
            Ok(Some(Counter {
                count: max,
                window_start: now,
            }))
        });

        let state = TestStateBuilder::new().with_counter_store(counters).build();

        let response = check(caller(), State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn store_outage_returns_429_not_500() {
        let mut counters = MockCounterStore::new();
        counters
            .expect_get()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let state = TestStateBuilder::new().with_counter_store(counters).build();

        let response = check(caller(), State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
