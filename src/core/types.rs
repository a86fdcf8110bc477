// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cost::CostReport;
use crate::session::merge::MergeReport;

/// Geographic classification of a content owner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UsDecision {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "NotUS")]
    NotUs,
    Unknown,
}

/// Keyword-relevance classification of a discovered item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceDecision {
    Match,
    Partial,
    No,
}

/// Coarse processing state. A row only ever moves to richer states.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    #[default]
    Pending,
    Hydrated,
    TranscriptFetched,
}

/// The unit of discovery: one candidate post, keyed by url within a session
/// and across the master dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelRow {
    pub url: String,
    pub keyword: String,
    pub owner_handle: Option<String>,
    pub owner_name: Option<String>,
    pub caption: Option<String>,
    pub transcript: Option<String>,
    pub views: Option<u64>,
    pub thumbnail: Option<String>,
    pub taken_at: Option<String>,
    pub location_name: Option<String>,
    pub us_decision: Option<UsDecision>,
    pub relevance_decision: Option<RelevanceDecision>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: RowStatus,
}

impl ReelRow {
    pub fn new(url: impl Into<String>, keyword: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            url: url.into(),
            keyword: keyword.into(),
            owner_handle: None,
            owner_name: None,
            caption: None,
            transcript: None,
            views: None,
            thumbnail: None,
            taken_at: None,
            location_name: None,
            us_decision: None,
            relevance_decision: None,
            discovered_at: now,
            updated_at: now,
            status: RowStatus::Pending,
        }
    }

    /// Stamp the mutation time. Every field change must call this: merge
    /// resolves url collisions by `updated_at` alone.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

/// Per-session bookkeeping, finalized exactly once at loop exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub keyword: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_urls: usize,
    pub total_processed: usize,
    pub total_relevant: usize,
    pub total_us: usize,
    pub status: SessionStatus,
    pub cost_summary: Option<CostReport>,
}

impl SessionMeta {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            started_at: Utc::now(),
            ended_at: None,
            total_urls: 0,
            total_processed: 0,
            total_relevant: 0,
            total_us: 0,
            status: SessionStatus::Running,
            cost_summary: None,
        }
    }
}

/// What a finished run hands back to the caller: the filtered result set,
/// the finalized session metadata, the cost report, and the merge counts.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: String,
    pub results: Vec<ReelRow>,
    pub meta: SessionMeta,
    pub cost: CostReport,
    pub merge: MergeReport,
}

/// Derive a session id from the keyword and start time.
pub fn session_id_for(keyword: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", slug::slugify(keyword), at.format("%Y%m%dT%H%M%S"))
}
