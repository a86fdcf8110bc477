// src/cli/run.rs — Default command: run a discovery session

use std::sync::{Arc, Mutex};

use crate::collab::Collaborators;
use crate::core::orchestrator::Agent;
use crate::core::types::RunOutcome;
use crate::infra::config::Config;
use crate::infra::paths;
use crate::provider::ModelProvider;
use crate::session::merge::MasterDataset;
use crate::session::store::SessionStore;
use crate::util::truncate_str;

/// Execute one discovery run and print the result set + cost report.
pub async fn run_discovery(
    keyword: &str,
    provider: Arc<dyn ModelProvider>,
    model_id: String,
    config: &Config,
    collaborators: Collaborators,
    quiet: bool,
) -> anyhow::Result<()> {
    paths::ensure_dirs()?;

    let store = Arc::new(Mutex::new(SessionStore::on_disk(paths::sessions_dir())?));
    let master = MasterDataset::new(paths::master_path());

    if !quiet {
        eprintln!(
            "[discover] \"{}\" | model: {}",
            truncate_str(keyword, 60),
            model_id
        );
    }

    let agent = Agent::new(
        provider,
        model_id,
        store,
        collaborators,
        master,
        config.agent.clone(),
        config.rates.clone(),
    );

    let outcome = agent.run(keyword).await?;
    print_outcome(&outcome, quiet);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, quiet: bool) {
    if outcome.results.is_empty() {
        println!("No results for this run.");
    } else {
        for row in &outcome.results {
            println!(
                "{:<12} {:<10} {:<20} {}",
                row.us_decision
                    .map(|d| format!("{:?}", d))
                    .unwrap_or_else(|| "-".into()),
                row.relevance_decision
                    .map(|d| format!("{:?}", d).to_lowercase())
                    .unwrap_or_else(|| "-".into()),
                row.owner_handle.as_deref().unwrap_or("-"),
                row.url,
            );
        }
    }

    if !quiet {
        let cost = &outcome.cost;
        eprintln!();
        eprintln!(
            "  session {} | {} rows discovered, {} returned",
            outcome.session_id,
            outcome.meta.total_urls,
            outcome.results.len(),
        );
        eprintln!(
            "  master merge: {} added, {} updated, {} skipped",
            outcome.merge.added, outcome.merge.updated, outcome.merge.skipped,
        );
        eprintln!(
            "  cost: ${:.6} (llm ${:.6} / {} calls, search ${:.6} / {} queries, scraping ${:.6} / {} calls)",
            cost.total_usd,
            cost.llm.cost_usd,
            cost.llm.calls,
            cost.search.cost_usd,
            cost.search.queries,
            cost.scraping.cost_usd,
            cost.scraping.total_calls,
        );
        if let Some(credits) = cost.scraping.credits_remaining {
            eprintln!("  scraping credits remaining: {:.2}", credits);
        }
    }
}
