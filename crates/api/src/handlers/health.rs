//! Health check endpoint for load balancers and monitoring.
//!
//! Returns 200 OK if the service is healthy (Redis reachable),
//! 503 Service Unavailable otherwise.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    redis: bool,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let redis_ok = state
        .stores
        .counters
        .health_check()
        .await
        .unwrap_or(false);

    let response = HealthResponse {
        status: if redis_ok { "ok" } else { "unhealthy" },
        redis: redis_ok,
    };

    let status = if redis_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MockCounterStore;
    use crate::test_utils::TestStateBuilder;

    #[tokio::test]
    async fn healthy_when_store_responds() {
        let mut counters = MockCounterStore::new();
        counters.expect_health_check().returning(|| Ok(true));

        let state = TestStateBuilder::new().with_counter_store(counters).build();

        let response = health_check(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unhealthy_when_store_errors() {
        let mut counters = MockCounterStore::new();
        counters
            .expect_health_check()
            .returning(|| Err(anyhow::anyhow!("down")));

        let state = TestStateBuilder::new().with_counter_store(counters).build();

        let response = health_check(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
