//! Social-content search and aggregation.
//!
//! Several query variants are issued concurrently against the social platform;
//! each subquery that fails degrades to an empty list so partial results still
//! reach the user. The merged list is ordered by a combined score that weighs
//! community score against recency and truncated to the top ten.

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use shared::api::SocialPost;

/// Max posts requested per subquery.
const SEARCH_LIMIT: usize = 25;
/// Posts kept after the merge.
const TOP_POSTS: usize = 10;

/// Search client for the social platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialSearchClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SocialPost>>;
}

/// HTTP implementation against the platform's listing API.
#[derive(Clone)]
pub struct HttpSocialSearch {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: ListingPost,
}

#[derive(Deserialize)]
struct ListingPost {
    title: String,
    #[serde(default)]
    selftext: String,
    score: f64,
    author: String,
    created_utc: f64,
    permalink: String,
}

impl HttpSocialSearch {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(8))
            .user_agent("brewtrip/0.3")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SocialSearchClient for HttpSocialSearch {
    async fn search(&self, query: &str) -> Result<Vec<SocialPost>> {
        let url = format!("{}/search.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("limit", &SEARCH_LIMIT.to_string()),
                ("sort", "relevance"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("social search returned {}", response.status());
        }

        let listing: Listing = response.json().await?;

        let posts = listing
            .data
            .children
            .into_iter()
            .map(|child| {
                let post = child.data;
                SocialPost {
                    title: post.title,
                    snippet: (!post.selftext.is_empty()).then(|| {
                        post.selftext.chars().take(280).collect::<String>()
                    }),
                    score: post.score,
                    author: post.author,
                    created_utc: post.created_utc as i64,
                    permalink: post.permalink,
                }
            })
            .collect();

        Ok(posts)
    }
}

fn combined_score(post: &SocialPost) -> f64 {
    0.7 * post.score + 0.3 * (post.created_utc as f64) / 1e6
}

/// Fans the queries out as one concurrent batch and joins the results.
/// A failed subquery contributes an empty list, never an error.
pub async fn aggregate_mentions(
    client: &dyn SocialSearchClient,
    queries: &[String],
) -> Vec<SocialPost> {
    let searches = queries.iter().map(|query| client.search(query));
    let results = join_all(searches).await;

    let mut posts: Vec<SocialPost> = Vec::new();
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(found) => posts.extend(found),
            Err(err) => {
                tracing::warn!(query = %query, error = ?err, "social subquery failed, skipping");
            }
        }
    }

    // The same post surfaces under multiple query variants.
    posts.sort_by(|a, b| a.permalink.cmp(&b.permalink));
    posts.dedup_by(|a, b| a.permalink == b.permalink);

    posts.sort_by(|a, b| {
        combined_score(b)
            .partial_cmp(&combined_score(a))
            .unwrap_or(Ordering::Equal)
    });
    posts.truncate(TOP_POSTS);
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn post(permalink: &str, score: f64, created_utc: i64) -> SocialPost {
        SocialPost {
            title: format!("post {}", permalink),
            snippet: None,
            score,
            author: "someone".to_string(),
            created_utc,
            permalink: permalink.to_string(),
        }
    }

    #[tokio::test]
    async fn merge_orders_by_combined_score_descending() {
        let mut client = MockSocialSearchClient::new();
        client.expect_search().with(eq("q1")).returning(|_| {
            Ok(vec![
                post("/a", 10.0, 1_700_000_000),
                post("/b", 500.0, 1_500_000_000),
            ])
        });
        client
            .expect_search()
            .with(eq("q2"))
            .returning(|_| Ok(vec![post("/c", 10.0, 1_760_000_000)]));

        let merged =
            aggregate_mentions(&client, &["q1".to_string(), "q2".to_string()]).await;

        // 0.7*score + 0.3*created_utc/1e6:
        //   /b = 350 + 450 = 800, /c = 7 + 528 = 535, /a = 7 + 510 = 517
        let order: Vec<&str> = merged.iter().map(|p| p.permalink.as_str()).collect();
        assert_eq!(order, vec!["/b", "/c", "/a"]);
    }

    #[tokio::test]
    async fn failed_subquery_degrades_to_partial_results() {
        let mut client = MockSocialSearchClient::new();
        client
            .expect_search()
            .with(eq("ok"))
            .returning(|_| Ok(vec![post("/a", 1.0, 1_700_000_000)]));
        client
            .expect_search()
            .with(eq("down"))
            .returning(|_| Err(anyhow::anyhow!("timeout")));

        let merged =
            aggregate_mentions(&client, &["ok".to_string(), "down".to_string()]).await;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].permalink, "/a");
    }

    #[tokio::test]
    async fn duplicate_permalinks_are_merged() {
        let mut client = MockSocialSearchClient::new();
        client
            .expect_search()
            .returning(|_| Ok(vec![post("/same", 5.0, 1_700_000_000)]));

        let merged =
            aggregate_mentions(&client, &["q1".to_string(), "q2".to_string()]).await;

        assert_eq!(merged.len(), 1);
    }

    #[tokio::test]
    async fn merge_truncates_to_top_ten() {
        let mut client = MockSocialSearchClient::new();
        client.expect_search().returning(|_| {
            Ok((0..15)
                .map(|i| post(&format!("/p{}", i), i as f64, 1_700_000_000))
                .collect())
        });

        let merged = aggregate_mentions(&client, &["q".to_string()]).await;

        assert_eq!(merged.len(), 10);
        // Highest community score survives.
        assert!(merged.iter().any(|p| p.permalink == "/p14"));
    }
}
