//! Application state
//!
//! Explicit context object owning the orchestrator and the collaborator
//! services, injected into the handlers instead of living as ambient
//! globals. Lifecycle is tied to server construction and teardown.

use std::sync::Arc;

use crate::agent::{
    AgentOrchestrator, ArticleSearchTool, GeminiProvider, StockLookupTool, ToolRegistry,
    SYSTEM_PROMPT,
};
use crate::config::Config;
use crate::services::{ProductCatalog, PubmedClient};

/// Shared state handed to every request handler
pub struct AppState {
    pub orchestrator: Arc<AgentOrchestrator>,
    pub catalog: Arc<ProductCatalog>,
    pub pubmed: Arc<PubmedClient>,
}

impl AppState {
    /// Wire the catalog, the PubMed client, the tool registry and the
    /// orchestrator from configuration.
    pub fn from_config(config: &Config) -> Arc<Self> {
        let catalog = Arc::new(ProductCatalog::with_seed_data());
        let pubmed = Arc::new(PubmedClient::new(&config.pubmed));

        let mut tools = ToolRegistry::new();
        tools.register(StockLookupTool::new(catalog.clone()));
        tools.register(ArticleSearchTool::new(pubmed.clone()));
        let tools = Arc::new(tools);

        let provider = Arc::new(GeminiProvider::new(
            &config.agent,
            SYSTEM_PROMPT,
            tools.declarations(),
        ));

        let orchestrator = Arc::new(AgentOrchestrator::new(
            provider,
            tools,
            (&config.agent).into(),
        ));

        Arc::new(Self {
            orchestrator,
            catalog,
            pubmed,
        })
    }
}
