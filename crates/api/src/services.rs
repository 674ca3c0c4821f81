//! External service abstractions.
//!
//! This module contains traits and implementations for the third-party
//! collaborators the API depends on. Each service is abstracted behind a
//! trait to enable mocking in tests.
//!
//! ## Services
//!
//! - **auth** - bearer-token verification against the auth provider
//! - **llm** - chat-completions client (image descriptions, match reasons)
//! - **social** - community-post search plus the fan-out aggregation
//!
//! ## Usage in Handlers
//!
//! Services are accessed via `AppState`:
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let description = state.llm.describe_image(&image_url).await?;
//!     let posts = aggregate_mentions(state.social.as_ref(), &queries).await;
//! }
//! ```

mod auth;
mod llm;
mod social;

pub use auth::{HttpTokenVerifier, TokenVerifier, VerifiedUser};
pub use llm::{HttpLlmClient, LlmClient};
pub use social::{HttpSocialSearch, SocialSearchClient, aggregate_mentions};

#[cfg(test)]
pub use auth::MockTokenVerifier;
#[cfg(test)]
pub use llm::MockLlmClient;
#[cfg(test)]
pub use social::MockSocialSearchClient;
