// src/collab/mod.rs — External collaborator contracts
//
// The orchestrator treats search and hydration vendors as black boxes behind
// these traits. Batches return parallel item arrays; fields the vendor does
// not know stay None, never fabricated. Vendors that report a remaining
// credit balance attach it to the batch.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::errors::ReelScoutError;

/// One hydrated post, keyed by its url.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostData {
    pub url: String,
    pub caption: Option<String>,
    pub owner_handle: Option<String>,
    pub owner_name: Option<String>,
    pub views: Option<u64>,
    pub thumbnail: Option<String>,
    pub taken_at: Option<String>,
    pub location_name: Option<String>,
}

/// One fetched transcript, keyed by its url.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptData {
    pub url: String,
    pub transcript: Option<String>,
}

/// One hydrated creator profile, keyed by handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileData {
    pub handle: String,
    pub full_name: Option<String>,
    pub location_name: Option<String>,
    pub follower_count: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct PostBatch {
    pub posts: Vec<PostData>,
    pub credits_remaining: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptBatch {
    pub transcripts: Vec<TranscriptData>,
    pub credits_remaining: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileBatch {
    pub profiles: Vec<ProfileData>,
    pub credits_remaining: Option<f64>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return candidate content URLs for one query string.
    async fn search(&self, query: &str) -> Result<Vec<String>, ReelScoutError>;
}

#[async_trait]
pub trait PostProvider: Send + Sync {
    async fn fetch_posts(&self, urls: &[String]) -> Result<PostBatch, ReelScoutError>;
}

#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch_transcripts(&self, urls: &[String]) -> Result<TranscriptBatch, ReelScoutError>;
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn fetch_profiles(&self, handles: &[String]) -> Result<ProfileBatch, ReelScoutError>;
}

/// The four collaborator handles the tool router needs, bundled.
#[derive(Clone)]
pub struct Collaborators {
    pub search: std::sync::Arc<dyn SearchProvider>,
    pub posts: std::sync::Arc<dyn PostProvider>,
    pub transcripts: std::sync::Arc<dyn TranscriptProvider>,
    pub profiles: std::sync::Arc<dyn ProfileProvider>,
}
