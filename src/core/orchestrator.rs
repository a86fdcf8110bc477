// src/core/orchestrator.rs — The bounded discovery loop
//
// Drives a conversation with the model: send context, execute every
// requested tool call concurrently, append the outputs by call id, repeat.
// The loop stops when the model stops requesting tools or the iteration cap
// hits; either way the session finalizes, merges into the master dataset,
// and yields a result set plus a cost report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;

use super::answer::{self, FinalAnswer};
use super::cost::{self, CostLedger, UsageEvent};
use super::filter::{self, FilterConfig};
use super::system_prompt;
use super::tools::ToolRouter;
use super::types::{
    session_id_for, ReelRow, RelevanceDecision, RowStatus, RunOutcome, UsDecision,
};
use crate::analysis::sandbox::{SandboxConfig, SandboxExecutor};
use crate::collab::Collaborators;
use crate::infra::config::{AgentConfig, RatesConfig};
use crate::infra::errors::ReelScoutError;
use crate::provider::{ChatRequest, Message, ModelProvider};
use crate::session::merge::MasterDataset;
use crate::session::store::SessionStore;

pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    model_id: String,
    store: Arc<Mutex<SessionStore>>,
    collaborators: Collaborators,
    master: MasterDataset,
    config: AgentConfig,
    rates: RatesConfig,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model_id: String,
        store: Arc<Mutex<SessionStore>>,
        collaborators: Collaborators,
        master: MasterDataset,
        config: AgentConfig,
        rates: RatesConfig,
    ) -> Self {
        Self {
            provider,
            model_id,
            store,
            collaborators,
            master,
            config,
            rates,
        }
    }

    fn store_lock(&self) -> Result<std::sync::MutexGuard<'_, SessionStore>, ReelScoutError> {
        self.store
            .lock()
            .map_err(|_| ReelScoutError::Other(anyhow::anyhow!("session store lock poisoned")))
    }

    /// Run one end-to-end discovery session for a keyword.
    pub async fn run(&self, keyword: &str) -> Result<RunOutcome, ReelScoutError> {
        let session_id = session_id_for(keyword, chrono::Utc::now());
        self.store_lock()?.initialize(&session_id, keyword)?;
        tracing::info!(session = %session_id, keyword, "Discovery session started");

        let (usage_tx, mut usage_rx) = cost::usage_channel();

        let router = ToolRouter::new(
            session_id.clone(),
            keyword.to_string(),
            self.store.clone(),
            self.collaborators.clone(),
            SandboxExecutor::new(SandboxConfig {
                interpreter: self.config.sandbox_interpreter.clone(),
                timeout: Duration::from_secs(self.config.sandbox_timeout_secs),
                output_cap: self.config.sandbox_output_cap,
            }),
            self.master.path().to_path_buf(),
            usage_tx.clone(),
        );

        let tools = ToolRouter::catalogue();
        let system = system_prompt::build(
            keyword,
            self.config.per_creator_cap,
            self.config.max_results,
        );
        let mut messages = vec![Message::user(format!(
            "Discover posts for the keyword: \"{keyword}\"."
        ))];

        let mut final_content = String::new();
        let mut provider_failed = false;

        for iteration in 0..self.config.max_iterations {
            let request = ChatRequest {
                model: self.model_id.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                max_tokens: Some(8192),
                temperature: Some(0.2),
                system: Some(system.clone()),
            };

            let response = match self.provider.chat(request).await {
                Ok(r) => r,
                Err(e) => {
                    // Degraded completion: finalize with whatever rows exist
                    // instead of abandoning a half-built session.
                    tracing::error!(iteration, error = %e, "Model request failed");
                    provider_failed = true;
                    break;
                }
            };

            let _ = usage_tx.send(UsageEvent::Llm {
                model: self.model_id.clone(),
                input_tokens: response.usage.input_tokens as u64,
                output_tokens: response.usage.output_tokens as u64,
            });

            if response.tool_calls.is_empty() {
                final_content = response.content;
                break;
            }

            tracing::debug!(
                iteration,
                tool_calls = response.tool_calls.len(),
                "Dispatching tool calls"
            );
            messages.push(Message::assistant_with_tool_calls(
                &response.content,
                response.tool_calls.clone(),
            ));

            // Fan out every requested call, fan in before continuing. The
            // outputs are appended in requested order; the model correlates
            // them by call id, not position.
            let results =
                join_all(response.tool_calls.iter().map(|tc| router.dispatch(tc))).await;
            for (tc, result) in response.tool_calls.iter().zip(results) {
                messages.push(Message::tool_result(&tc.id, &result?));
            }

            if iteration + 1 == self.config.max_iterations {
                tracing::warn!(
                    max_iterations = self.config.max_iterations,
                    "Iteration cap reached before the model finished; finalizing with current rows"
                );
            }
        }

        // Parse the final structured answer. Failure is recoverable: the
        // session still finalizes, just with nothing classified.
        let answer = match answer::parse_final_answer(&final_content) {
            Some(a) => a,
            None => {
                if !final_content.is_empty() {
                    tracing::warn!(
                        raw = %crate::util::truncate_str(&final_content, 500),
                        "Final model output did not parse as the result schema; using empty result set"
                    );
                }
                FinalAnswer::default()
            }
        };

        // Apply the model's decisions as updates, not a replace, then
        // re-read to pick them up.
        let mut store_guard = self.store_lock()?;
        apply_decisions(&mut store_guard, &session_id, &answer)?;
        drop(store_guard);
        let rows = self.store_lock()?.rows(&session_id)?;

        self.store_lock()?.patch_metadata(&session_id, |meta| {
            meta.total_urls = rows.len();
            meta.total_processed = rows
                .iter()
                .filter(|r| r.status != RowStatus::Pending)
                .count();
            meta.total_relevant = rows
                .iter()
                .filter(|r| {
                    matches!(
                        r.relevance_decision,
                        Some(RelevanceDecision::Match) | Some(RelevanceDecision::Partial)
                    )
                })
                .count();
            meta.total_us = rows
                .iter()
                .filter(|r| r.us_decision == Some(UsDecision::Us))
                .count();
        })?;

        // Candidates are the rows the model classified, in session order.
        let classified: std::collections::HashSet<&str> =
            answer.results.iter().map(|i| i.url.as_str()).collect();
        let candidates: Vec<ReelRow> = rows
            .iter()
            .filter(|r| classified.contains(r.url.as_str()))
            .cloned()
            .collect();

        let results = filter::apply(
            candidates,
            &rows,
            FilterConfig {
                per_creator_cap: self.config.per_creator_cap,
                max_results: self.config.max_results,
            },
        );

        // Close the usage channel and settle the ledger exactly once.
        drop(router);
        drop(usage_tx);
        let mut ledger = CostLedger::new();
        ledger.drain(&mut usage_rx);
        let report = ledger.report(&self.rates);

        let meta =
            self.store_lock()?
                .finalize(&session_id, !provider_failed, Some(report.clone()))?;
        let merge = self.master.merge(&rows)?;

        tracing::info!(
            session = %session_id,
            results = results.len(),
            total_usd = report.total_usd,
            "Discovery session finished"
        );

        Ok(RunOutcome {
            session_id,
            results,
            meta,
            cost: report,
            merge,
        })
    }
}

/// Fold the model's classifications into the session rows: relevance per
/// url, geography per url plus fan-out to every row of the same owner
/// (geography is a property of the creator, not the post).
fn apply_decisions(
    store: &mut SessionStore,
    session_id: &str,
    answer: &FinalAnswer,
) -> Result<(), ReelScoutError> {
    if answer.results.is_empty() {
        return Ok(());
    }
    let items = answer.results.clone();
    store.upsert(session_id, move |mut rows| {
        for item in &items {
            let owner_decision = item.us_decision;
            let mut item_owner: Option<String> = item.owner_handle.clone();

            if let Some(row) = rows.iter_mut().find(|r| r.url == item.url) {
                if item.us_decision.is_some() {
                    row.us_decision = item.us_decision;
                }
                if item.relevance_decision.is_some() {
                    row.relevance_decision = item.relevance_decision;
                }
                if item_owner.is_none() {
                    item_owner = row.owner_handle.clone();
                }
                row.touch();
            }

            if let (Some(owner), Some(decision)) = (item_owner, owner_decision) {
                for row in rows.iter_mut().filter(|r| {
                    r.owner_handle
                        .as_deref()
                        .map(|h| h.eq_ignore_ascii_case(&owner))
                        .unwrap_or(false)
                }) {
                    if row.us_decision.is_none() {
                        row.us_decision = Some(decision);
                        row.touch();
                    }
                }
            }
        }
        rows
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::answer::ClassifiedItem;

    fn store_with_rows(rows: Vec<ReelRow>) -> (SessionStore, String) {
        let mut store = SessionStore::in_memory();
        store.initialize("s", "fitness").unwrap();
        store.set_rows("s", rows).unwrap();
        (store, "s".to_string())
    }

    fn item(url: &str, us: Option<UsDecision>, rel: Option<RelevanceDecision>) -> ClassifiedItem {
        ClassifiedItem {
            url: url.into(),
            us_decision: us,
            relevance_decision: rel,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_decisions_by_url() {
        let mut r1 = ReelRow::new("u1", "fitness");
        r1.owner_handle = Some("alice".into());
        let (mut store, id) = store_with_rows(vec![r1]);

        let answer = FinalAnswer {
            keyword: "fitness".into(),
            results: vec![item(
                "u1",
                Some(UsDecision::Us),
                Some(RelevanceDecision::Match),
            )],
        };
        apply_decisions(&mut store, &id, &answer).unwrap();

        let rows = store.rows(&id).unwrap();
        assert_eq!(rows[0].us_decision, Some(UsDecision::Us));
        assert_eq!(rows[0].relevance_decision, Some(RelevanceDecision::Match));
    }

    #[test]
    fn test_geography_fans_out_per_owner() {
        let mut r1 = ReelRow::new("u1", "fitness");
        r1.owner_handle = Some("alice".into());
        let mut r2 = ReelRow::new("u2", "fitness");
        r2.owner_handle = Some("Alice".into());
        let mut r3 = ReelRow::new("u3", "fitness");
        r3.owner_handle = Some("bob".into());
        let (mut store, id) = store_with_rows(vec![r1, r2, r3]);

        let answer = FinalAnswer {
            keyword: "fitness".into(),
            results: vec![item("u1", Some(UsDecision::NotUs), None)],
        };
        apply_decisions(&mut store, &id, &answer).unwrap();

        let rows = store.rows(&id).unwrap();
        assert_eq!(rows[0].us_decision, Some(UsDecision::NotUs));
        // Fan-out reaches the other alice row, case-insensitively
        assert_eq!(rows[1].us_decision, Some(UsDecision::NotUs));
        assert!(rows[2].us_decision.is_none());
    }

    #[test]
    fn test_fan_out_does_not_override_explicit_decisions() {
        let mut r1 = ReelRow::new("u1", "fitness");
        r1.owner_handle = Some("alice".into());
        let mut r2 = ReelRow::new("u2", "fitness");
        r2.owner_handle = Some("alice".into());
        let (mut store, id) = store_with_rows(vec![r1, r2]);

        let answer = FinalAnswer {
            keyword: "fitness".into(),
            results: vec![
                item("u2", Some(UsDecision::Unknown), None),
                item("u1", Some(UsDecision::Us), None),
            ],
        };
        apply_decisions(&mut store, &id, &answer).unwrap();

        let rows = store.rows(&id).unwrap();
        // u1's explicit decision survives u2's fan-out
        assert_eq!(rows[0].us_decision, Some(UsDecision::Us));
        assert_eq!(rows[1].us_decision, Some(UsDecision::Unknown));
    }

    #[test]
    fn test_apply_decisions_unknown_url_is_ignored() {
        let (mut store, id) = store_with_rows(vec![ReelRow::new("u1", "fitness")]);
        let answer = FinalAnswer {
            keyword: "fitness".into(),
            results: vec![item("nope", Some(UsDecision::Us), None)],
        };
        apply_decisions(&mut store, &id, &answer).unwrap();
        assert!(store.rows(&id).unwrap()[0].us_decision.is_none());
    }
}
