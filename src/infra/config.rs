// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub rates: RatesConfig,

    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model id driving the discovery loop (None = provider default).
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on model round-trips per run.
    pub max_iterations: u32,
    /// Maximum rows in the final result set.
    pub max_results: usize,
    /// Maximum rows per owner handle in the final result set.
    pub per_creator_cap: usize,
    /// Wall-clock limit for one sandboxed analysis call.
    pub sandbox_timeout_secs: u64,
    /// Stdout/stderr cap, in characters, for sandboxed analysis output.
    pub sandbox_output_cap: usize,
    /// Interpreter used for sandboxed analysis snippets.
    pub sandbox_interpreter: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_results: 30,
            per_creator_cap: 2,
            sandbox_timeout_secs: 5,
            sandbox_output_cap: 2000,
            sandbox_interpreter: "python3".into(),
        }
    }
}

/// The versioned rate table used to turn usage counters into USD.
/// This is configuration, not business logic: edit the TOML, bump `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    pub version: String,
    /// Flat cost per search query.
    pub search_per_query: f64,
    /// Flat cost per scraping call (posts, transcripts, profiles alike).
    pub scrape_per_call: f64,
    /// Per-model LLM token rates, keyed by model id (substring match allowed).
    #[serde(default)]
    pub models: HashMap<String, ModelRate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelRate {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "claude-opus".into(),
            ModelRate {
                input_per_mtok: 15.0,
                output_per_mtok: 75.0,
            },
        );
        models.insert(
            "claude-sonnet".into(),
            ModelRate {
                input_per_mtok: 3.0,
                output_per_mtok: 15.0,
            },
        );
        models.insert(
            "claude-haiku".into(),
            ModelRate {
                input_per_mtok: 0.8,
                output_per_mtok: 4.0,
            },
        );
        Self {
            version: "2026-08".into(),
            search_per_query: 0.001,
            scrape_per_call: 0.0006,
            models,
        }
    }
}

impl RatesConfig {
    /// Resolve the token rates for a model id: exact key first, then the
    /// longest key that is a substring of the id, then a moderate default.
    pub fn model_rate(&self, model: &str) -> ModelRate {
        if let Some(rate) = self.models.get(model) {
            return *rate;
        }
        let mut best: Option<(&String, &ModelRate)> = None;
        for (key, rate) in &self.models {
            if model.contains(key.as_str()) {
                match best {
                    Some((b, _)) if b.len() >= key.len() => {}
                    _ => best = Some((key, rate)),
                }
            }
        }
        match best {
            Some((_, rate)) => *rate,
            None => ModelRate {
                input_per_mtok: 1.0,
                output_per_mtok: 3.0,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    /// Base URL of the search provider. Required for discovery runs.
    pub search_url: Option<String>,
    /// Base URL of the post/transcript/profile hydration provider.
    pub scrape_url: Option<String>,
}

impl Config {
    /// Load from the default config path, falling back to defaults
    /// when no config.toml exists.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {}", path.display(), e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_defaults() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.per_creator_cap, 2);
        assert_eq!(cfg.max_results, 30);
        assert_eq!(cfg.sandbox_timeout_secs, 5);
        assert_eq!(cfg.sandbox_output_cap, 2000);
        assert_eq!(cfg.sandbox_interpreter, "python3");
    }

    #[test]
    fn test_rates_exact_lookup() {
        let rates = RatesConfig::default();
        let r = rates.model_rate("claude-sonnet");
        assert_eq!(r.input_per_mtok, 3.0);
        assert_eq!(r.output_per_mtok, 15.0);
    }

    #[test]
    fn test_rates_substring_lookup() {
        let rates = RatesConfig::default();
        let r = rates.model_rate("claude-sonnet-4-20250514");
        assert_eq!(r.input_per_mtok, 3.0);

        let r = rates.model_rate("claude-opus-4-20250514");
        assert_eq!(r.input_per_mtok, 15.0);
    }

    #[test]
    fn test_rates_unknown_defaults() {
        let rates = RatesConfig::default();
        let r = rates.model_rate("some-unknown-model");
        assert_eq!(r.input_per_mtok, 1.0);
        assert_eq!(r.output_per_mtok, 3.0);
    }

    #[test]
    fn test_config_parses_partial_toml() {
        let raw = r#"
[agent]
max_iterations = 4
max_results = 10
per_creator_cap = 1
sandbox_timeout_secs = 2
sandbox_output_cap = 500
sandbox_interpreter = "python3"

[rates]
version = "test-1"
search_per_query = 0.01
scrape_per_call = 0.002
"#;
        let cfg: Config = toml::from_str(raw).unwrap();
        assert_eq!(cfg.agent.max_iterations, 4);
        assert_eq!(cfg.rates.version, "test-1");
        assert_eq!(cfg.rates.search_per_query, 0.01);
        // Missing sections fall back to defaults
        assert!(cfg.models.agent.is_none());
        assert!(cfg.collaborators.search_url.is_none());
    }
}
