// src/core/cost.rs — Usage-event ledger and cost reporting
//
// Every paid side effect (LLM tokens, search queries, scraping calls) pushes
// a UsageEvent onto an mpsc channel while the run executes; the orchestrator
// drains the channel into a CostLedger exactly once at run end and resolves
// it against the versioned rate table. The channel's lifetime is the run's
// scope, so nothing leaks between runs.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::infra::config::RatesConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeKind {
    Post,
    Transcript,
    Profile,
}

#[derive(Debug, Clone)]
pub enum UsageEvent {
    Llm {
        model: String,
        input_tokens: u64,
        output_tokens: u64,
    },
    Search {
        queries: u64,
    },
    Scrape {
        kind: ScrapeKind,
        calls: u64,
    },
    /// Vendor-reported remaining balance. Latest observation wins.
    Credits {
        remaining: f64,
    },
}

pub type UsageSender = mpsc::UnboundedSender<UsageEvent>;

/// Open a usage channel for one run.
pub fn usage_channel() -> (UsageSender, mpsc::UnboundedReceiver<UsageEvent>) {
    mpsc::unbounded_channel()
}

/// Per-run accumulator of raw usage counters. Resolved once, at run end.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    pub llm_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: Option<String>,
    pub search_queries: u64,
    pub posts: u64,
    pub transcripts: u64,
    pub profiles: u64,
    pub credits_remaining: Option<f64>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: UsageEvent) {
        match event {
            UsageEvent::Llm {
                model,
                input_tokens,
                output_tokens,
            } => {
                self.llm_calls += 1;
                self.input_tokens += input_tokens;
                self.output_tokens += output_tokens;
                self.model = Some(model);
            }
            UsageEvent::Search { queries } => self.search_queries += queries,
            UsageEvent::Scrape { kind, calls } => match kind {
                ScrapeKind::Post => self.posts += calls,
                ScrapeKind::Transcript => self.transcripts += calls,
                ScrapeKind::Profile => self.profiles += calls,
            },
            UsageEvent::Credits { remaining } => self.credits_remaining = Some(remaining),
        }
    }

    /// Drain every event buffered on the channel. Callers must drop all
    /// senders first so this is the run's final word.
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<UsageEvent>) {
        while let Ok(event) = rx.try_recv() {
            self.record(event);
        }
    }

    pub fn total_scrape_calls(&self) -> u64 {
        self.posts + self.transcripts + self.profiles
    }

    /// Resolve the ledger into a USD report using the rate table.
    pub fn report(&self, rates: &RatesConfig) -> CostReport {
        let model = self.model.clone().unwrap_or_default();
        let rate = rates.model_rate(&model);
        let llm_cost = round6(
            (self.input_tokens as f64 / 1_000_000.0) * rate.input_per_mtok
                + (self.output_tokens as f64 / 1_000_000.0) * rate.output_per_mtok,
        );
        let search_cost = round6(self.search_queries as f64 * rates.search_per_query);
        let scrape_cost = round6(self.total_scrape_calls() as f64 * rates.scrape_per_call);

        CostReport {
            llm: LlmCost {
                calls: self.llm_calls,
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
                cost_usd: llm_cost,
                model,
            },
            search: SearchCost {
                queries: self.search_queries,
                cost_per_query_usd: rates.search_per_query,
                cost_usd: search_cost,
            },
            scraping: ScrapingCost {
                posts: self.posts,
                transcripts: self.transcripts,
                profiles: self.profiles,
                total_calls: self.total_scrape_calls(),
                cost_per_call_usd: rates.scrape_per_call,
                cost_usd: scrape_cost,
                credits_remaining: self.credits_remaining,
            },
            total_usd: round6(llm_cost + search_cost + scrape_cost),
        }
    }
}

/// Round to 6 decimal places for audit precision.
pub fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    pub llm: LlmCost,
    pub search: SearchCost,
    pub scraping: ScrapingCost,
    pub total_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LlmCost {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchCost {
    pub queries: u64,
    pub cost_per_query_usd: f64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingCost {
    pub posts: u64,
    pub transcripts: u64,
    pub profiles: u64,
    pub total_calls: u64,
    pub cost_per_call_usd: f64,
    pub cost_usd: f64,
    pub credits_remaining: Option<f64>,
}
