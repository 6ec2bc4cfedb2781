//! Error types for the agent core
//!
//! Every failure the orchestrator can see is represented by `AgentError`.
//! The classification methods (`is_retryable`, `is_quota`) drive the retry
//! executor and the model-fallback logic, so new variants must pick a side
//! explicitly.

use thiserror::Error;

/// Failures produced while running an exchange against the provider
/// or one of the local tools.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The Gemini API key is missing or rejected. Non-retryable.
    #[error("Gemini API key missing or invalid: {0}")]
    AuthConfiguration(String),

    /// The provider signalled quota/rate exhaustion (HTTP 429).
    /// Retryable, and additionally triggers model exclusion + fallback.
    #[error("provider rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider-side transient fault (HTTP 5xx). Retryable.
    #[error("provider server error: {0}")]
    ProviderServer(String),

    /// Connection reset, timeout or other network fault. Retryable.
    #[error("transient network error: {0}")]
    NetworkTransient(String),

    /// Malformed request, permission or not-found class (HTTP 4xx,
    /// blocked prompts). Non-retryable.
    #[error("provider rejected the request: {0}")]
    ProviderClient(String),

    /// Failure inside a tool's collaborator. Converted to response data at
    /// the registry boundary and never raised past it.
    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    /// The model kept requesting tools past the round bound.
    #[error("tool-calling loop exceeded {0} rounds")]
    MaxToolRounds(usize),

    /// Anything that did not match a known class. Treated as retryable so
    /// unknown transient conditions get a second chance.
    #[error("unclassified provider failure: {0}")]
    Unclassified(String),
}

impl AgentError {
    /// Whether the retry executor may run the failed unit of work again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::RateLimited(_)
                | AgentError::ProviderServer(_)
                | AgentError::NetworkTransient(_)
                | AgentError::Unclassified(_)
        )
    }

    /// Whether this failure should exclude the current model from
    /// selection and move the orchestrator to the next candidate.
    pub fn is_quota(&self) -> bool {
        matches!(self, AgentError::RateLimited(_))
    }

    /// Machine-readable code surfaced in the webhook payload.
    pub fn error_code(&self) -> String {
        match self {
            AgentError::AuthConfiguration(_) => "API_KEY_MISSING".to_string(),
            AgentError::MaxToolRounds(_) => "MAX_TOOL_ROUNDS_EXCEEDED".to_string(),
            other => other.to_string(),
        }
    }
}
