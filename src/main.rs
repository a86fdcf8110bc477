// src/main.rs — ReelScout entry point

use clap::Parser;
use std::sync::Arc;

use reelscout::cli::{Cli, Commands};
use reelscout::collab::http::{HttpScrapeProvider, HttpSearchProvider};
use reelscout::collab::Collaborators;
use reelscout::infra::config::Config;
use reelscout::infra::logger;
use reelscout::provider::resolver;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    if let Some(max) = cli.max_iterations {
        config.agent.max_iterations = max;
    }

    // Subcommands that only read local state
    match &cli.command {
        Some(Commands::Sessions) => return reelscout::cli::sessions::show_sessions(),
        Some(Commands::Master) => return reelscout::cli::sessions::show_master(),
        None => {}
    }

    let keyword = build_keyword(&cli)?;

    // Setup errors fail the run before anything is billed: provider
    // credentials first, then the collaborator endpoints and their keys.
    let model = cli.model.as_deref().or(config.models.agent.as_deref());
    let (provider, model_id) = resolver::resolve(model)?;
    let collaborators = build_collaborators(&config)?;

    reelscout::cli::run::run_discovery(
        &keyword,
        provider,
        model_id,
        &config,
        collaborators,
        cli.quiet,
    )
    .await
}

/// Assemble the keyword from CLI args, or prompt when run interactively.
fn build_keyword(cli: &Cli) -> anyhow::Result<String> {
    if !cli.keyword.is_empty() {
        return Ok(cli.keyword.join(" "));
    }

    use std::io::IsTerminal;
    if std::io::stdin().is_terminal() {
        let keyword = inquire::Text::new("What keyword should I discover?")
            .with_help_message("e.g. \"fitness trainer\", or press Esc to cancel")
            .prompt()
            .map_err(|_| anyhow::anyhow!("Keyword input cancelled"))?;
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            anyhow::bail!("No keyword provided");
        }
        return Ok(keyword);
    }

    eprintln!("Usage: reelscout <keyword>");
    eprintln!("Run reelscout --help for all options.");
    std::process::exit(1);
}

/// Wire up the search and scraping collaborators from config + env keys.
fn build_collaborators(config: &Config) -> anyhow::Result<Collaborators> {
    let search_url = config
        .collaborators
        .search_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No search endpoint configured. Set [collaborators].search_url in config.toml."))?;
    let scrape_url = config
        .collaborators
        .scrape_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No scrape endpoint configured. Set [collaborators].scrape_url in config.toml."))?;

    let search_key = require_env("REELSCOUT_SEARCH_API_KEY")?;
    let scrape_key = require_env("REELSCOUT_SCRAPE_API_KEY")?;

    let scrape = Arc::new(HttpScrapeProvider::new(scrape_url, scrape_key));
    Ok(Collaborators {
        search: Arc::new(HttpSearchProvider::new(search_url, search_key)),
        posts: scrape.clone(),
        transcripts: scrape.clone(),
        profiles: scrape,
    })
}

fn require_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing required credential: set {name}"))
}
