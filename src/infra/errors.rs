// src/infra/errors.rs — Error types for ReelScout

use thiserror::Error;

use crate::analysis::sandbox::SandboxError;

#[derive(Error, Debug)]
pub enum ReelScoutError {
    // Model provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("No provider configured. Set ANTHROPIC_API_KEY.")]
    NoProvider,

    // External collaborator errors (search / hydration vendors).
    // Surfaced back to the model as tool output, never swallowed.
    #[error("Collaborator '{provider}' error: {message}")]
    Collaborator { provider: String, message: String },

    // Programming errors: using a session handle that was never initialized
    // must fail loudly rather than become a silent no-op.
    #[error("Session '{0}' is not initialized")]
    SessionNotFound(String),

    #[error("Session '{0}' is already finalized")]
    SessionFinalized(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelScoutError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, ReelScoutError::Provider { retriable: true, .. })
    }
}
