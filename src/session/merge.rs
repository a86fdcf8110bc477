// src/session/merge.rs — Master dataset reconciliation
//
// The master dataset is the cross-session table of everything ever
// discovered, deduplicated by url. Merging a session is last-write-wins per
// row: whole rows are replaced on newer `updated_at`, never field-merged,
// because a session only ever produces a more complete version of a row it
// owns. Merging the same session twice is a no-op the second time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::types::ReelRow;
use crate::infra::errors::ReelScoutError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.skipped
    }
}

pub struct MasterDataset {
    path: PathBuf,
}

impl MasterDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every master row. A missing file is an empty dataset.
    pub fn load(&self) -> Result<Vec<ReelRow>, ReelScoutError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::new();
        for (lineno, line) in std::fs::read_to_string(&self.path)?.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: ReelRow = serde_json::from_str(line).map_err(|e| {
                anyhow::anyhow!("parse {}:{}: {e}", self.path.display(), lineno + 1)
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Reconcile a finished session's rows into the master dataset.
    /// The report counts sum to the session's row count.
    pub fn merge(&self, session_rows: &[ReelRow]) -> Result<MergeReport, ReelScoutError> {
        let mut master = self.load()?;
        let mut index: HashMap<String, usize> = master
            .iter()
            .enumerate()
            .map(|(i, r)| (r.url.clone(), i))
            .collect();

        let mut report = MergeReport::default();
        for row in session_rows {
            match index.get(&row.url) {
                None => {
                    index.insert(row.url.clone(), master.len());
                    master.push(row.clone());
                    report.added += 1;
                }
                Some(&i) => {
                    if recency(row) > recency(&master[i]) {
                        master[i] = row.clone();
                        report.updated += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
            }
        }

        self.save(&master)?;
        tracing::info!(
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            "Merged session into master dataset"
        );
        Ok(report)
    }

    fn save(&self, rows: &[ReelRow]) -> Result<(), ReelScoutError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row)
                .map_err(|e| anyhow::anyhow!("serialize master row: {e}"))?;
            buf.push(b'\n');
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(&buf)?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Recency key for a row: `updated_at`, falling back to `discovered_at`
/// should a row somehow carry an older update stamp.
fn recency(row: &ReelRow) -> chrono::DateTime<chrono::Utc> {
    row.updated_at.max(row.discovered_at)
}
