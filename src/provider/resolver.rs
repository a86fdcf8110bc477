// src/provider/resolver.rs — Provider discovery from environment credentials

use std::sync::Arc;

use super::anthropic::AnthropicProvider;
use super::ModelProvider;
use crate::infra::errors::ReelScoutError;

/// Default model when neither the CLI flag nor config names one.
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Resolve a provider and model id from the environment.
///
/// Missing credentials are an unrecoverable setup error: the run refuses to
/// start rather than failing halfway through with half a session on disk.
pub fn resolve(requested_model: Option<&str>) -> Result<(Arc<dyn ModelProvider>, String), ReelScoutError> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(ReelScoutError::NoProvider)?;

    let provider: Arc<dyn ModelProvider> = Arc::new(AnthropicProvider::new(api_key));
    let model = requested_model.unwrap_or(DEFAULT_MODEL).to_string();

    if !provider.models().iter().any(|m| m.id == model) {
        tracing::warn!(model = %model, "Model not in the provider catalog; using it anyway");
    }

    Ok((provider, model))
}
