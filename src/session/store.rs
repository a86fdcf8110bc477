// src/session/store.rs — Session store with pluggable storage backends
//
// One store interface, two backends: an in-memory map and a file adapter
// (JSONL rows + a meta sidecar per session). Reads hand out defensive
// copies; every mutation replaces the whole row collection, so callers
// never observe a partially written table. Touching an uninitialized
// session id is a programming error and fails immediately.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::cost::CostReport;
use crate::core::types::{ReelRow, SessionMeta, SessionStatus};
use crate::infra::errors::ReelScoutError;

#[derive(Debug, Clone)]
pub struct SessionData {
    pub meta: SessionMeta,
    pub rows: Vec<ReelRow>,
}

pub trait StorageBackend: Send {
    fn create(&mut self, session_id: &str, meta: SessionMeta) -> Result<(), ReelScoutError>;
    fn read(&self, session_id: &str) -> Result<SessionData, ReelScoutError>;
    fn write(&mut self, session_id: &str, data: &SessionData) -> Result<(), ReelScoutError>;
    fn list(&self) -> Result<Vec<String>, ReelScoutError>;
    /// Path of the rows file, when the backend has one (for the sandbox's
    /// read-only context).
    fn rows_file(&self, session_id: &str) -> Option<PathBuf>;
}

// ─── Memory backend ─────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryBackend {
    sessions: HashMap<String, SessionData>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn create(&mut self, session_id: &str, meta: SessionMeta) -> Result<(), ReelScoutError> {
        self.sessions.insert(
            session_id.to_string(),
            SessionData {
                meta,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn read(&self, session_id: &str) -> Result<SessionData, ReelScoutError> {
        self.sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| ReelScoutError::SessionNotFound(session_id.to_string()))
    }

    fn write(&mut self, session_id: &str, data: &SessionData) -> Result<(), ReelScoutError> {
        let entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ReelScoutError::SessionNotFound(session_id.to_string()))?;
        *entry = data.clone();
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, ReelScoutError> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn rows_file(&self, _session_id: &str) -> Option<PathBuf> {
        None
    }
}

// ─── File backend ───────────────────────────────────────────────

/// Persists each session as `<id>.jsonl` (one row per line, the fixed
/// column set) plus `<id>.meta.json`.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ReelScoutError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn rows_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.jsonl"))
    }

    fn meta_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.meta.json"))
    }

    /// Atomic write: temp file in the same directory, then rename.
    fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ReelScoutError> {
        let tmp = path.with_extension("tmp");
        {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(contents)?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn persist(&self, session_id: &str, data: &SessionData) -> Result<(), ReelScoutError> {
        let mut rows_buf = Vec::new();
        for row in &data.rows {
            serde_json::to_writer(&mut rows_buf, row)
                .map_err(|e| anyhow::anyhow!("serialize row: {e}"))?;
            rows_buf.push(b'\n');
        }
        Self::write_atomic(&self.rows_path(session_id), &rows_buf)?;

        let meta_buf = serde_json::to_vec_pretty(&data.meta)
            .map_err(|e| anyhow::anyhow!("serialize meta: {e}"))?;
        Self::write_atomic(&self.meta_path(session_id), &meta_buf)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn create(&mut self, session_id: &str, meta: SessionMeta) -> Result<(), ReelScoutError> {
        self.persist(
            session_id,
            &SessionData {
                meta,
                rows: Vec::new(),
            },
        )
    }

    fn read(&self, session_id: &str) -> Result<SessionData, ReelScoutError> {
        let meta_path = self.meta_path(session_id);
        if !meta_path.exists() {
            return Err(ReelScoutError::SessionNotFound(session_id.to_string()));
        }
        let meta: SessionMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)
            .map_err(|e| anyhow::anyhow!("parse meta {}: {e}", meta_path.display()))?;

        let mut rows = Vec::new();
        let rows_path = self.rows_path(session_id);
        if rows_path.exists() {
            for (lineno, line) in std::fs::read_to_string(&rows_path)?.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let row: ReelRow = serde_json::from_str(line).map_err(|e| {
                    anyhow::anyhow!("parse {}:{}: {e}", rows_path.display(), lineno + 1)
                })?;
                rows.push(row);
            }
        }
        Ok(SessionData { meta, rows })
    }

    fn write(&mut self, session_id: &str, data: &SessionData) -> Result<(), ReelScoutError> {
        if !self.meta_path(session_id).exists() {
            return Err(ReelScoutError::SessionNotFound(session_id.to_string()));
        }
        self.persist(session_id, data)
    }

    fn list(&self) -> Result<Vec<String>, ReelScoutError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".meta.json") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn rows_file(&self, session_id: &str) -> Option<PathBuf> {
        let path = self.rows_path(session_id);
        path.exists().then_some(path)
    }
}

// ─── Store ──────────────────────────────────────────────────────

pub struct SessionStore {
    backend: Box<dyn StorageBackend>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
        }
    }

    pub fn on_disk(dir: impl Into<PathBuf>) -> Result<Self, ReelScoutError> {
        Ok(Self {
            backend: Box::new(FileBackend::new(dir)?),
        })
    }

    pub fn initialize(&mut self, session_id: &str, keyword: &str) -> Result<(), ReelScoutError> {
        self.backend.create(session_id, SessionMeta::new(keyword))
    }

    /// All rows of a session, as a defensive copy.
    pub fn rows(&self, session_id: &str) -> Result<Vec<ReelRow>, ReelScoutError> {
        Ok(self.backend.read(session_id)?.rows)
    }

    /// Replace the whole row collection atomically.
    pub fn set_rows(&mut self, session_id: &str, rows: Vec<ReelRow>) -> Result<(), ReelScoutError> {
        let mut data = self.backend.read(session_id)?;
        data.rows = rows;
        self.backend.write(session_id, &data)
    }

    /// Read-modify-write with a pure mutator: the uniform way to append new
    /// URLs, attach hydration data by url, or attach decisions by handle.
    pub fn upsert<F>(&mut self, session_id: &str, mutator: F) -> Result<(), ReelScoutError>
    where
        F: FnOnce(Vec<ReelRow>) -> Vec<ReelRow>,
    {
        let mut data = self.backend.read(session_id)?;
        data.rows = mutator(data.rows);
        self.backend.write(session_id, &data)
    }

    pub fn metadata(&self, session_id: &str) -> Result<SessionMeta, ReelScoutError> {
        Ok(self.backend.read(session_id)?.meta)
    }

    pub fn patch_metadata<F>(&mut self, session_id: &str, patch: F) -> Result<(), ReelScoutError>
    where
        F: FnOnce(&mut SessionMeta),
    {
        let mut data = self.backend.read(session_id)?;
        patch(&mut data.meta);
        self.backend.write(session_id, &data)
    }

    /// Close the session out: status, end time, and the cost summary.
    /// A session finalizes exactly once; a second call is a caller bug.
    pub fn finalize(
        &mut self,
        session_id: &str,
        success: bool,
        cost: Option<CostReport>,
    ) -> Result<SessionMeta, ReelScoutError> {
        let mut data = self.backend.read(session_id)?;
        if data.meta.status != SessionStatus::Running {
            return Err(ReelScoutError::SessionFinalized(session_id.to_string()));
        }
        data.meta.status = if success {
            SessionStatus::Completed
        } else {
            SessionStatus::Failed
        };
        data.meta.ended_at = Some(chrono::Utc::now());
        data.meta.cost_summary = cost;
        self.backend.write(session_id, &data)?;
        Ok(data.meta)
    }

    pub fn list_sessions(&self) -> Result<Vec<String>, ReelScoutError> {
        self.backend.list()
    }

    pub fn rows_file(&self, session_id: &str) -> Option<PathBuf> {
        self.backend.rows_file(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RowStatus;

    fn store_with_session() -> (SessionStore, &'static str) {
        let mut store = SessionStore::in_memory();
        store.initialize("s1", "fitness").unwrap();
        (store, "s1")
    }

    #[test]
    fn test_uninitialized_session_fails_fast() {
        let store = SessionStore::in_memory();
        assert!(matches!(
            store.rows("nope"),
            Err(ReelScoutError::SessionNotFound(_))
        ));

        let mut store = SessionStore::in_memory();
        assert!(store.set_rows("nope", vec![]).is_err());
        assert!(store.upsert("nope", |r| r).is_err());
        assert!(store.metadata("nope").is_err());
        assert!(store.finalize("nope", true, None).is_err());
    }

    #[test]
    fn test_initialize_creates_running_session() {
        let (store, id) = store_with_session();
        let meta = store.metadata(id).unwrap();
        assert_eq!(meta.keyword, "fitness");
        assert_eq!(meta.status, SessionStatus::Running);
        assert!(meta.ended_at.is_none());
        assert!(store.rows(id).unwrap().is_empty());
    }

    #[test]
    fn test_rows_returns_defensive_copy() {
        let (mut store, id) = store_with_session();
        store
            .set_rows(id, vec![ReelRow::new("u1", "fitness")])
            .unwrap();

        let mut copy = store.rows(id).unwrap();
        copy[0].caption = Some("mutated".into());
        copy.clear();

        let fresh = store.rows(id).unwrap();
        assert_eq!(fresh.len(), 1);
        assert!(fresh[0].caption.is_none());
    }

    #[test]
    fn test_upsert_appends_and_mutates() {
        let (mut store, id) = store_with_session();
        store
            .upsert(id, |mut rows| {
                rows.push(ReelRow::new("u1", "fitness"));
                rows.push(ReelRow::new("u2", "fitness"));
                rows
            })
            .unwrap();
        store
            .upsert(id, |mut rows| {
                for row in &mut rows {
                    if row.url == "u2" {
                        row.caption = Some("leg day".into());
                        row.status = RowStatus::Hydrated;
                        row.touch();
                    }
                }
                rows
            })
            .unwrap();

        let rows = store.rows(id).unwrap();
        assert_eq!(rows.len(), 2);
        let u2 = rows.iter().find(|r| r.url == "u2").unwrap();
        assert_eq!(u2.caption.as_deref(), Some("leg day"));
        assert_eq!(u2.status, RowStatus::Hydrated);
    }

    #[test]
    fn test_finalize_sets_status_and_end_time() {
        let (mut store, id) = store_with_session();
        let meta = store.finalize(id, true, None).unwrap();
        assert_eq!(meta.status, SessionStatus::Completed);
        assert!(meta.ended_at.is_some());
    }

    #[test]
    fn test_finalize_failed() {
        let (mut store, id) = store_with_session();
        let meta = store.finalize(id, false, None).unwrap();
        assert_eq!(meta.status, SessionStatus::Failed);
    }

    #[test]
    fn test_finalize_twice_is_an_error() {
        let (mut store, id) = store_with_session();
        store.finalize(id, true, None).unwrap();
        assert!(matches!(
            store.finalize(id, true, None),
            Err(ReelScoutError::SessionFinalized(_))
        ));
    }

    #[test]
    fn test_patch_metadata() {
        let (mut store, id) = store_with_session();
        store
            .patch_metadata(id, |m| {
                m.total_urls = 12;
                m.total_relevant = 7;
            })
            .unwrap();
        let meta = store.metadata(id).unwrap();
        assert_eq!(meta.total_urls, 12);
        assert_eq!(meta.total_relevant, 7);
    }

    #[test]
    fn test_sessions_are_isolated_by_key() {
        let mut store = SessionStore::in_memory();
        store.initialize("a", "yoga").unwrap();
        store.initialize("b", "cooking").unwrap();
        store
            .set_rows("a", vec![ReelRow::new("u1", "yoga")])
            .unwrap();

        assert_eq!(store.rows("a").unwrap().len(), 1);
        assert!(store.rows("b").unwrap().is_empty());
        assert_eq!(store.list_sessions().unwrap(), vec!["a", "b"]);
    }
}
