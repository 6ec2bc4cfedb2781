//! Conversational agent orchestration core
//!
//! The components that serialize per-conversation state, select among the
//! backing models under a quota circuit breaker, retry transient provider
//! failures with backoff, and drive the tool-calling protocol between the
//! model and the local capabilities.

pub mod gemini;
pub mod orchestrator;
pub mod provider;
pub mod quota;
pub mod retry;
pub mod session;
pub mod tools;

pub use orchestrator::{AgentOrchestrator, AgentStats, ProcessOutcome, SYSTEM_PROMPT};
pub use provider::{ChatProvider, GeminiProvider};
pub use retry::RetryOptions;
pub use tools::{ArticleSearchTool, StockLookupTool, ToolRegistry};
