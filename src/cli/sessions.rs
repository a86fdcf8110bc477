// src/cli/sessions.rs — Inspect persisted sessions and the master dataset

use std::collections::HashSet;

use crate::core::types::RowStatus;
use crate::infra::paths;
use crate::session::merge::MasterDataset;
use crate::session::store::SessionStore;

/// `reelscout sessions` — list persisted sessions and their outcomes.
pub fn show_sessions() -> anyhow::Result<()> {
    let store = SessionStore::on_disk(paths::sessions_dir())?;
    let ids = store.list_sessions()?;
    if ids.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    for id in ids {
        let meta = store.metadata(&id)?;
        let cost = meta
            .cost_summary
            .as_ref()
            .map(|c| format!("${:.6}", c.total_usd))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<40} {:<10} {:>4} urls {:>4} US  {}",
            id,
            format!("{:?}", meta.status).to_lowercase(),
            meta.total_urls,
            meta.total_us,
            cost,
        );
    }
    Ok(())
}

/// `reelscout master` — master dataset statistics.
pub fn show_master() -> anyhow::Result<()> {
    let master = MasterDataset::new(paths::master_path());
    let rows = master.load()?;
    if rows.is_empty() {
        println!("Master dataset is empty.");
        return Ok(());
    }

    let owners: HashSet<String> = rows
        .iter()
        .filter_map(|r| r.owner_handle.as_deref())
        .map(|h| h.to_lowercase())
        .collect();
    let hydrated = rows
        .iter()
        .filter(|r| r.status != RowStatus::Pending)
        .count();
    let with_transcript = rows.iter().filter(|r| r.transcript.is_some()).count();

    println!("{} rows ({} distinct owners)", rows.len(), owners.len());
    println!("{} hydrated, {} with transcript", hydrated, with_transcript);
    Ok(())
}
