//! LLM provider client (chat completions).
//!
//! Two operations: a visual description of a café photo, and one-line match
//! reasons for a batch of candidate cafés. Both are best-effort enrichment;
//! callers degrade to empty defaults on error and never cache failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::api::{MatchCandidate, MatchReason};

/// LLM operations used by the enrichment endpoints.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One-paragraph description of the café in the photo.
    async fn describe_image(&self, image_url: &str) -> Result<String>;

    /// One-line "why this matches" blurb per candidate.
    async fn match_reasons(
        &self,
        reference_cafe: &str,
        vibes: &[String],
        candidates: &[MatchCandidate],
    ) -> Result<Vec<MatchReason>>;
}

/// Chat-completions implementation.
#[derive(Clone)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpLlmClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("llm provider returned {}", response.status());
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .context("llm response had no choices")?
            .message
            .content;

        Ok(content)
    }
}

/// Strips markdown code fences the model sometimes wraps JSON in.
fn strip_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn describe_image(&self, image_url: &str) -> Result<String> {
        let prompt = format!(
            "Describe the café shown at {} in one short paragraph: interior style, \
             seating, lighting, atmosphere. Plain text only.",
            image_url
        );

        let description = self.complete(prompt).await?;
        Ok(description.trim().to_string())
    }

    async fn match_reasons(
        &self,
        reference_cafe: &str,
        vibes: &[String],
        candidates: &[MatchCandidate],
    ) -> Result<Vec<MatchReason>> {
        let listing: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} ({})", c.name, c.place_id))
            .collect();

        let prompt = format!(
            "A user likes the café \"{}\" and wants similar spots matching: {}. \
             For each candidate below, give a one-line reason it matches. \
             Respond with a JSON array of {{\"placeId\": ..., \"reason\": ...}} \
             objects, nothing else.\nCandidates:\n{}",
            reference_cafe,
            if vibes.is_empty() {
                "no specific vibe".to_string()
            } else {
                vibes.join(", ")
            },
            listing.join("\n"),
        );

        let content = self.complete(prompt).await?;
        let reasons: Vec<MatchReason> = serde_json::from_str(strip_fences(&content))
            .context("llm match-reason response was not the expected JSON array")?;

        Ok(reasons)
    }
}
