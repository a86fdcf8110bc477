// src/core/tools.rs — Tool catalogue and router
//
// Maps a named tool call plus JSON arguments onto a collaborator, the
// session store, or an analysis executor, and normalizes the outcome into a
// JSON payload for the model. Collaborator failures become `{"error": ...}`
// payloads so the model can react to them; store failures are caller bugs
// and propagate.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde_json::json;

use super::cost::{ScrapeKind, UsageEvent, UsageSender};
use super::optimizer;
use super::types::{ReelRow, RowStatus};
use crate::analysis::command as analysis;
use crate::analysis::sandbox::SandboxExecutor;
use crate::collab::Collaborators;
use crate::infra::errors::ReelScoutError;
use crate::provider::{ToolCall, ToolDef};
use crate::session::store::SessionStore;

pub struct ToolRouter {
    session_id: String,
    keyword: String,
    store: Arc<Mutex<SessionStore>>,
    collaborators: Collaborators,
    sandbox: SandboxExecutor,
    master_path: PathBuf,
    usage: UsageSender,
}

impl ToolRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        keyword: String,
        store: Arc<Mutex<SessionStore>>,
        collaborators: Collaborators,
        sandbox: SandboxExecutor,
        master_path: PathBuf,
        usage: UsageSender,
    ) -> Self {
        Self {
            session_id,
            keyword,
            store,
            collaborators,
            sandbox,
            master_path,
            usage,
        }
    }

    /// The fixed tool catalogue offered to the model.
    pub fn catalogue() -> Vec<ToolDef> {
        vec![
            ToolDef {
                name: "search_reels".into(),
                description: "Search for candidate post URLs. Takes a list of query strings; \
                              returns how many URLs were found and added to the session."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "queries": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["queries"]
                }),
            },
            ToolDef {
                name: "fetch_posts".into(),
                description: "Hydrate post URLs with caption, owner, views, and location. \
                              Returns a statistical summary with a few samples."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "urls": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["urls"]
                }),
            },
            ToolDef {
                name: "fetch_transcripts".into(),
                description: "Fetch audio transcripts for post URLs. Returns a summary."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "urls": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["urls"]
                }),
            },
            ToolDef {
                name: "fetch_profiles".into(),
                description: "Hydrate creator profiles (name, location, followers) by handle. \
                              Returns a summary with location coverage."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "handles": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["handles"]
                }),
            },
            ToolDef {
                name: "analyze_session".into(),
                description: "Run a restricted analysis operation over the session rows. \
                              Operations: `count`, `count where <field> contains <text>`, \
                              `filter <field> contains <text>`, `summary`, `sample [n]`. \
                              Fields: caption, transcript, owner, location, url, any."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "operation": {"type": "string"}
                    },
                    "required": ["operation"]
                }),
            },
            ToolDef {
                name: "run_analysis_code".into(),
                description: "Execute a short Python snippet against the session data. \
                              `SESSION_PATH` and `MASTER_PATH` point at read-only JSONL files; \
                              `load_rows(path)` parses them. Print your result; stdout is \
                              capped and returned."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "code": {"type": "string"}
                    },
                    "required": ["code"]
                }),
            },
        ]
    }

    /// Execute one tool call and return its JSON payload.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<String, ReelScoutError> {
        let payload = match call.name.as_str() {
            "search_reels" => self.search_reels(&call.arguments).await?,
            "fetch_posts" => self.fetch_posts(&call.arguments).await?,
            "fetch_transcripts" => self.fetch_transcripts(&call.arguments).await?,
            "fetch_profiles" => self.fetch_profiles(&call.arguments).await?,
            "analyze_session" => self.analyze_session(&call.arguments)?,
            "run_analysis_code" => self.run_analysis_code(&call.arguments).await,
            other => json!({"error": format!("Unknown tool '{other}'")}),
        };
        Ok(payload.to_string())
    }

    fn record(&self, event: UsageEvent) {
        // The receiver outlives every dispatch; a closed channel only means
        // the run is already tearing down.
        let _ = self.usage.send(event);
    }

    fn store_lock(&self) -> Result<std::sync::MutexGuard<'_, SessionStore>, ReelScoutError> {
        self.store
            .lock()
            .map_err(|_| ReelScoutError::Other(anyhow::anyhow!("session store lock poisoned")))
    }

    fn record_credits(&self, credits: Option<f64>) {
        if let Some(remaining) = credits {
            self.record(UsageEvent::Credits { remaining });
        }
    }

    async fn search_reels(
        &self,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ReelScoutError> {
        let queries = str_array(args, "queries");
        if queries.is_empty() {
            return Ok(json!({"error": "search_reels requires a non-empty 'queries' array"}));
        }

        self.record(UsageEvent::Search {
            queries: queries.len() as u64,
        });

        let results = join_all(queries.iter().map(|q| self.collaborators.search.search(q))).await;

        let mut urls = Vec::new();
        let mut errors = Vec::new();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(found) => urls.extend(found),
                Err(e) => errors.push(format!("{query}: {e}")),
            }
        }

        if urls.is_empty() && !errors.is_empty() {
            return Ok(json!({"error": format!("all queries failed: {}", errors.join("; "))}));
        }

        // Keep only well-formed URLs; vendors occasionally return fragments.
        let urls_found = urls.len();
        urls.retain(|u| url::Url::parse(u).is_ok());

        let (new_rows, total_rows) = {
            let mut store = self.store_lock()?;
            let mut added = 0usize;
            let keyword = self.keyword.clone();
            store.upsert(&self.session_id, |mut rows| {
                for u in &urls {
                    if !rows.iter().any(|r| r.url == *u) {
                        rows.push(ReelRow::new(u.clone(), keyword.clone()));
                        added += 1;
                    }
                }
                rows
            })?;
            (added, store.rows(&self.session_id)?.len())
        };

        let mut payload = json!({
            "queries": queries.len(),
            "urls_found": urls_found,
            "new_rows": new_rows,
            "total_rows": total_rows,
        });
        if !errors.is_empty() {
            payload["errors"] = json!(errors);
        }
        Ok(payload)
    }

    async fn fetch_posts(
        &self,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ReelScoutError> {
        let urls = str_array(args, "urls");
        if urls.is_empty() {
            return Ok(json!({"error": "fetch_posts requires a non-empty 'urls' array"}));
        }

        self.record(UsageEvent::Scrape {
            kind: ScrapeKind::Post,
            calls: urls.len() as u64,
        });

        let batch = match self.collaborators.posts.fetch_posts(&urls).await {
            Ok(batch) => batch,
            Err(e) => return Ok(json!({"error": e.to_string()})),
        };
        self.record_credits(batch.credits_remaining);

        {
            let mut store = self.store_lock()?;
            let posts = batch.posts.clone();
            store.upsert(&self.session_id, move |mut rows| {
                for post in &posts {
                    if let Some(row) = rows.iter_mut().find(|r| r.url == post.url) {
                        if post.caption.is_some() {
                            row.caption = post.caption.clone();
                        }
                        if post.owner_handle.is_some() {
                            row.owner_handle = post.owner_handle.clone();
                        }
                        if post.owner_name.is_some() {
                            row.owner_name = post.owner_name.clone();
                        }
                        if post.views.is_some() {
                            row.views = post.views;
                        }
                        if post.thumbnail.is_some() {
                            row.thumbnail = post.thumbnail.clone();
                        }
                        if post.taken_at.is_some() {
                            row.taken_at = post.taken_at.clone();
                        }
                        if post.location_name.is_some() {
                            row.location_name = post.location_name.clone();
                        }
                        if row.status == RowStatus::Pending {
                            row.status = RowStatus::Hydrated;
                        }
                        row.touch();
                    }
                }
                rows
            })?;
        }

        let summary = optimizer::summarize_posts(&batch.posts, &self.keyword);
        Ok(serde_json::to_value(summary).unwrap_or_else(|_| json!({})))
    }

    async fn fetch_transcripts(
        &self,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ReelScoutError> {
        let urls = str_array(args, "urls");
        if urls.is_empty() {
            return Ok(json!({"error": "fetch_transcripts requires a non-empty 'urls' array"}));
        }

        self.record(UsageEvent::Scrape {
            kind: ScrapeKind::Transcript,
            calls: urls.len() as u64,
        });

        let batch = match self.collaborators.transcripts.fetch_transcripts(&urls).await {
            Ok(batch) => batch,
            Err(e) => return Ok(json!({"error": e.to_string()})),
        };
        self.record_credits(batch.credits_remaining);

        {
            let mut store = self.store_lock()?;
            let transcripts = batch.transcripts.clone();
            store.upsert(&self.session_id, move |mut rows| {
                for t in &transcripts {
                    if let Some(row) = rows.iter_mut().find(|r| r.url == t.url) {
                        if t.transcript.is_some() {
                            row.transcript = t.transcript.clone();
                            row.status = RowStatus::TranscriptFetched;
                        }
                        row.touch();
                    }
                }
                rows
            })?;
        }

        let summary = optimizer::summarize_transcripts(&batch.transcripts, &self.keyword);
        Ok(serde_json::to_value(summary).unwrap_or_else(|_| json!({})))
    }

    async fn fetch_profiles(
        &self,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ReelScoutError> {
        let handles = str_array(args, "handles");
        if handles.is_empty() {
            return Ok(json!({"error": "fetch_profiles requires a non-empty 'handles' array"}));
        }

        self.record(UsageEvent::Scrape {
            kind: ScrapeKind::Profile,
            calls: handles.len() as u64,
        });

        let batch = match self.collaborators.profiles.fetch_profiles(&handles).await {
            Ok(batch) => batch,
            Err(e) => return Ok(json!({"error": e.to_string()})),
        };
        self.record_credits(batch.credits_remaining);

        {
            let mut store = self.store_lock()?;
            let profiles = batch.profiles.clone();
            store.upsert(&self.session_id, move |mut rows| {
                for profile in &profiles {
                    for row in rows.iter_mut().filter(|r| {
                        r.owner_handle
                            .as_deref()
                            .map(|h| h.eq_ignore_ascii_case(&profile.handle))
                            .unwrap_or(false)
                    }) {
                        if profile.full_name.is_some() {
                            row.owner_name = profile.full_name.clone();
                        }
                        if profile.location_name.is_some() {
                            row.location_name = profile.location_name.clone();
                        }
                        row.touch();
                    }
                }
                rows
            })?;
        }

        let summary = optimizer::summarize_profiles(&batch.profiles);
        Ok(serde_json::to_value(summary).unwrap_or_else(|_| json!({})))
    }

    fn analyze_session(
        &self,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ReelScoutError> {
        let operation = args
            .get("operation")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let command = match analysis::parse(operation) {
            Ok(c) => c,
            Err(e) => return Ok(json!({"error": e.to_string()})),
        };

        let rows = {
            let store = self.store_lock()?;
            store.rows(&self.session_id)?
        };
        Ok(json!({"result": analysis::run(&command, &rows)}))
    }

    async fn run_analysis_code(&self, args: &serde_json::Value) -> serde_json::Value {
        let code = args.get("code").and_then(|v| v.as_str()).unwrap_or_default();
        if code.trim().is_empty() {
            return json!({"error": "run_analysis_code requires a non-empty 'code' string"});
        }

        let session_file = match self.store_lock() {
            Ok(store) => store.rows_file(&self.session_id),
            Err(e) => return json!({"error": e.to_string()}),
        };

        match self
            .sandbox
            .execute(code, session_file.as_deref(), &self.master_path)
            .await
        {
            Ok(output) => json!({"stdout": output.stdout, "truncated": output.truncated}),
            // Distinct per-variant messages: the model can tell "write a
            // shorter analysis" apart from "environment is broken".
            Err(e) => json!({"error": e.to_string()}),
        }
    }
}

fn str_array(args: &serde_json::Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
