// src/collab/http.rs — HTTP adapter for the search and hydration vendors
//
// Implements all four collaborator traits against two configured JSON
// endpoints: a search API (`POST {search_url}/search`) and a scraping API
// (`POST {scrape_url}/posts|/transcripts|/profiles`). Which vendor sits
// behind the URLs is deployment configuration; only the data shape is
// fixed here.

use async_trait::async_trait;

use super::{
    PostBatch, PostData, PostProvider, ProfileBatch, ProfileData, ProfileProvider, SearchProvider,
    TranscriptBatch, TranscriptData, TranscriptProvider,
};
use crate::infra::errors::ReelScoutError;

pub struct HttpSearchProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSearchProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

fn collaborator_error(provider: &str, e: reqwest::Error) -> ReelScoutError {
    ReelScoutError::Collaborator {
        provider: provider.into(),
        message: e.to_string(),
    }
}

async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value, ReelScoutError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ReelScoutError::Collaborator {
            provider: provider.into(),
            message: format!("HTTP {}: {}", status, body),
        });
    }
    response
        .json()
        .await
        .map_err(|e| collaborator_error(provider, e))
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<String>, ReelScoutError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| collaborator_error("search", e))?;

        let body = check_status("search", response).await?;
        let urls = body["urls"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(urls)
    }
}

/// One client for the scraping vendor's three hydration endpoints.
pub struct HttpScrapeProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpScrapeProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ReelScoutError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| collaborator_error("scrape", e))?;
        check_status("scrape", response).await
    }
}

fn credits_of(body: &serde_json::Value) -> Option<f64> {
    body["credits_remaining"].as_f64()
}

#[async_trait]
impl PostProvider for HttpScrapeProvider {
    async fn fetch_posts(&self, urls: &[String]) -> Result<PostBatch, ReelScoutError> {
        let body = self
            .post_json("posts", serde_json::json!({ "urls": urls }))
            .await?;
        let posts = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value::<PostData>(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(PostBatch {
            posts,
            credits_remaining: credits_of(&body),
        })
    }
}

#[async_trait]
impl TranscriptProvider for HttpScrapeProvider {
    async fn fetch_transcripts(&self, urls: &[String]) -> Result<TranscriptBatch, ReelScoutError> {
        let body = self
            .post_json("transcripts", serde_json::json!({ "urls": urls }))
            .await?;
        let transcripts = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value::<TranscriptData>(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(TranscriptBatch {
            transcripts,
            credits_remaining: credits_of(&body),
        })
    }
}

#[async_trait]
impl ProfileProvider for HttpScrapeProvider {
    async fn fetch_profiles(&self, handles: &[String]) -> Result<ProfileBatch, ReelScoutError> {
        let body = self
            .post_json("profiles", serde_json::json!({ "handles": handles }))
            .await?;
        let profiles = body["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value::<ProfileData>(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(ProfileBatch {
            profiles,
            credits_remaining: credits_of(&body),
        })
    }
}
