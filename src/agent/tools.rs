//! Tool invoker
//!
//! A registry mapping tool name to a typed handler behind a common
//! invocation trait, so new tools register without touching the dispatch
//! core. `ToolRegistry::invoke` never fails at the orchestration level:
//! unknown tools and collaborator failures are converted into an error
//! payload the model can read.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::gemini::{FunctionCall, FunctionDeclaration};
use crate::error::AgentError;
use crate::services::{ProductCatalog, PubmedClient};

/// Outcome of one tool invocation; errors are data, never raised
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub name: String,
    pub response: Value,
}

/// A named local capability the model may call
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Declaration advertised to the model
    fn declaration(&self) -> FunctionDeclaration;

    async fn execute(&self, args: &Value) -> Result<Value, AgentError>;
}

/// Name-keyed registry of tool handlers
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: impl ToolHandler + 'static) {
        self.handlers
            .insert(handler.name().to_string(), Arc::new(handler));
    }

    /// Declarations for every registered tool, sent with each provider call
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        let mut declarations: Vec<FunctionDeclaration> = self
            .handlers
            .values()
            .map(|handler| handler.declaration())
            .collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    /// Dispatch a model-requested call. Any failure becomes an error
    /// payload in the outcome so the tool loop can always respond.
    pub async fn invoke(&self, call: &FunctionCall) -> ToolOutcome {
        let response = match self.handlers.get(&call.name) {
            Some(handler) => match handler.execute(&call.args).await {
                Ok(value) => value,
                Err(error) => {
                    tracing::error!(
                        tool = %call.name,
                        error = %error,
                        "Tool execution failed"
                    );
                    json!({ "erro": format!("Erro ao executar {}: {}", call.name, error) })
                }
            },
            None => json!({ "erro": format!("Funcao desconhecida: {}", call.name) }),
        };

        ToolOutcome {
            name: call.name.clone(),
            response,
        }
    }
}

/// `buscar_estoque`: price and availability lookup in the local catalog
pub struct StockLookupTool {
    catalog: Arc<ProductCatalog>,
}

impl StockLookupTool {
    pub fn new(catalog: Arc<ProductCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl ToolHandler for StockLookupTool {
    fn name(&self) -> &str {
        "buscar_estoque"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "buscar_estoque".to_string(),
            description: "Busca informacoes de preco e disponibilidade de um produto no \
                          estoque local. Use quando o usuario quiser saber preco, \
                          disponibilidade ou estoque de um medicamento."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "termo": {
                        "type": "string",
                        "description": "Nome do medicamento ou produto para buscar"
                    }
                },
                "required": ["termo"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<Value, AgentError> {
        let termo = args
            .get("termo")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolExecution("parametro 'termo' ausente".to_string()))?;

        match self.catalog.find_first_by_term(termo) {
            Some(produto) => Ok(json!({
                "encontrado": true,
                "produto": {
                    "id": produto.id,
                    "descricao": produto.descricao,
                    "preco": produto.preco_formatado,
                    "estoque": produto.estoque,
                    "disponivel": produto.disponivel,
                    "status": produto.status_estoque
                }
            })),
            None => Ok(json!({
                "encontrado": false,
                "mensagem": format!("Produto \"{termo}\" nao encontrado no estoque")
            })),
        }
    }
}

/// `buscar_artigos`: scientific literature search via PubMed
pub struct ArticleSearchTool {
    pubmed: Arc<PubmedClient>,
}

impl ArticleSearchTool {
    pub fn new(pubmed: Arc<PubmedClient>) -> Self {
        Self { pubmed }
    }
}

/// Default number of articles when the model omits `limite`
const DEFAULT_ARTICLE_LIMIT: usize = 3;
/// Hard cap on requested articles
const MAX_ARTICLE_LIMIT: usize = 20;

#[async_trait]
impl ToolHandler for ArticleSearchTool {
    fn name(&self) -> &str {
        "buscar_artigos"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "buscar_artigos".to_string(),
            description: "Busca artigos cientificos no PubMed sobre um medicamento \
                          veterinario. Use quando o usuario perguntar sobre um medicamento \
                          ou quiser informacoes cientificas."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "medicamento": {
                        "type": "string",
                        "description": "Nome do medicamento para buscar artigos"
                    },
                    "limite": {
                        "type": "number",
                        "description": "Numero maximo de artigos (padrao: 3)"
                    }
                },
                "required": ["medicamento"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<Value, AgentError> {
        let medicamento = args.get("medicamento").and_then(Value::as_str).ok_or_else(|| {
            AgentError::ToolExecution("parametro 'medicamento' ausente".to_string())
        })?;
        let limite = args
            .get("limite")
            .and_then(Value::as_u64)
            .map(|l| (l as usize).clamp(1, MAX_ARTICLE_LIMIT))
            .unwrap_or(DEFAULT_ARTICLE_LIMIT);

        let resultado = self.pubmed.buscar_artigos(medicamento, limite).await;

        Ok(json!({
            "sucesso": resultado.sucesso,
            "totalEncontrado": resultado.total_encontrado,
            "artigos": resultado.artigos.iter().map(|a| json!({
                "titulo": a.titulo,
                "autores": a.autores,
                "revista": a.revista,
                "ano": a.ano,
                "link": a.link
            })).collect::<Vec<_>>()
        }))
    }
}
