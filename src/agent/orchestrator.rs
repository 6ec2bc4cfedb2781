//! Agent orchestrator
//!
//! Top-level control loop for one exchange: acquires the session lock,
//! walks the candidate models in preference order, wraps each full exchange
//! (including the tool-calling sub-loop) in the retry executor, updates the
//! conversation history on success and maps every failure to a structured
//! user-facing response. Provider errors never reach the caller raw.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::agent::gemini::{Content, FunctionCall, Part};
use crate::agent::provider::ChatProvider;
use crate::agent::quota::QuotaTracker;
use crate::agent::retry::{retry_with_backoff, RetryOptions};
use crate::agent::session::{ConversationStore, SessionHistory, SessionLocks};
use crate::agent::tools::ToolRegistry;
use crate::config::AgentConfig;
use crate::error::AgentError;

/// System prompt defining the Bolota persona and the mandated
/// conversation flow.
pub const SYSTEM_PROMPT: &str = "\
Voce e o Bolota, um assistente virtual especializado em medicamentos veterinarios.

PERSONALIDADE:
- Seja prestativo, amigavel e profissional
- Use linguagem clara e acessivel
- Demonstre conhecimento sobre medicamentos veterinarios
- Seja conciso nas respostas

REGRAS IMPORTANTES:
1. SEMPRE alerte sobre a necessidade de prescricao veterinaria quando falar de medicamentos
2. NUNCA recomende dosagens especificas - isso e responsabilidade do veterinario
3. Quando o usuario perguntar sobre um medicamento, use a funcao buscar_artigos para trazer informacoes cientificas
4. Quando o usuario quiser saber preco/estoque, use a funcao buscar_estoque
5. Se o usuario confirmar que quer ver estoque (responder \"sim\", \"quero\", etc), consulte o estoque do ultimo medicamento mencionado

IMPORTANTE PARA FUNCTION CALLS:
- Ao chamar buscar_artigos, passe APENAS o nome do medicamento (ex: \"amoxicilina\", \"apoquel\")
- NAO inclua \"para caes\", \"para gatos\", \"veterinario\" no parametro - apenas o nome do principio ativo
- Ao chamar buscar_estoque, passe apenas o nome do produto

FORMATO DE RESPOSTA:
- Use markdown para formatar (negrito, listas)
- Seja objetivo mas informativo

FLUXO DE CONVERSACAO OBRIGATORIO:
Quando o usuario perguntar sobre um medicamento, sua resposta DEVE conter TODAS estas partes na ordem:

1. PRIMEIRO: Explique brevemente o que e o medicamento (1-2 frases)
2. SEGUNDO: Mostre os artigos cientificos encontrados (se houver)
3. TERCEIRO: Alerte sobre prescricao veterinaria
4. QUARTO: Pergunte \"Gostaria de verificar o preco e disponibilidade deste medicamento em nosso estoque?\"

Se o usuario responder \"sim\", \"quero\", \"pode ser\", use buscar_estoque com o nome do medicamento.
Apos mostrar o estoque, pergunte se precisa de mais alguma ajuda.

NUNCA pule as etapas 1, 2 e 3 - elas sao obrigatorias antes de perguntar sobre estoque.";

/// Structured response for one processed message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    pub session_id: String,
    pub sucesso: bool,
    pub resposta: String,
    pub tools_usadas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modelo_usado: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erro: Option<String>,
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub sessoes_ativas: usize,
    pub modelo_primario: String,
    pub modelo_fallback: String,
    pub modelos_com_quota_excedida: Vec<String>,
    pub timestamp: String,
}

/// Tunables for the orchestrator, derived from [`AgentConfig`]
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub primary_model: String,
    pub fallback_model: String,
    pub quota_cooldown: std::time::Duration,
    pub retry: RetryOptions,
    pub max_tool_rounds: usize,
}

impl From<&AgentConfig> for OrchestratorOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            quota_cooldown: config.quota_cooldown,
            retry: RetryOptions {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay,
                max_delay: config.retry_max_delay,
            },
            max_tool_rounds: config.max_tool_rounds,
        }
    }
}

/// Result of one successful exchange, before response mapping
struct Exchange {
    resposta: String,
    tools_usadas: Vec<String>,
    modelo_usado: String,
}

/// The conversational agent orchestration core
pub struct AgentOrchestrator {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    quota: QuotaTracker,
    store: ConversationStore,
    locks: SessionLocks,
    retry: RetryOptions,
    max_tool_rounds: usize,
}

impl AgentOrchestrator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            provider,
            tools,
            quota: QuotaTracker::new(
                options.primary_model,
                options.fallback_model,
                options.quota_cooldown,
            ),
            store: ConversationStore::new(),
            locks: SessionLocks::new(),
            retry: options.retry,
            max_tool_rounds: options.max_tool_rounds,
        }
    }

    /// Process one user message for a session.
    ///
    /// Generates a session id when the caller supplies none. Exchanges for
    /// the same session are strictly serialized; the lock guard is dropped
    /// on every exit path.
    pub async fn process(&self, mensagem: &str, session_id: Option<String>) -> ProcessOutcome {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let _guard = self.locks.acquire(&session_id).await;
        self.process_locked(mensagem, &session_id).await
    }

    async fn process_locked(&self, mensagem: &str, session_id: &str) -> ProcessOutcome {
        for model in self.quota.candidate_order() {
            // A quota failure earlier in this same loop may have excluded
            // the model after the order was computed
            if self.quota.is_excluded(&model) {
                continue;
            }

            tracing::info!(session_id = %session_id, model = %model, "Trying candidate model");

            let attempt = retry_with_backoff(self.retry, || {
                self.exchange(mensagem, session_id, &model)
            })
            .await;

            match attempt {
                Ok(exchange) => {
                    return ProcessOutcome {
                        session_id: session_id.to_string(),
                        sucesso: true,
                        resposta: exchange.resposta,
                        tools_usadas: exchange.tools_usadas,
                        modelo_usado: Some(exchange.modelo_usado),
                        erro: None,
                    };
                }
                Err(error) if error.is_quota() => {
                    self.quota.mark_excluded(&model);
                    tracing::warn!(
                        session_id = %session_id,
                        model = %model,
                        "Quota exceeded, trying next candidate"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        session_id = %session_id,
                        model = %model,
                        error = %error,
                        "Exchange failed"
                    );
                    return self.failure_outcome(session_id, &error);
                }
            }
        }

        // Every candidate is excluded: degrade instead of calling the provider
        ProcessOutcome {
            session_id: session_id.to_string(),
            sucesso: false,
            resposta: "O servico esta temporariamente sobrecarregado. Por favor, aguarde \
                       alguns segundos e tente novamente."
                .to_string(),
            tools_usadas: Vec::new(),
            modelo_usado: None,
            erro: Some("ALL_MODELS_QUOTA_EXCEEDED".to_string()),
        }
    }

    /// One full exchange against a specific model, including the bounded
    /// tool-calling sub-loop. History is only committed on success.
    async fn exchange(
        &self,
        mensagem: &str,
        session_id: &str,
        model: &str,
    ) -> Result<Exchange, AgentError> {
        let mut history = match self.store.get(session_id) {
            Some(session) if session.model == model => session.contents,
            Some(_) => {
                // Context does not carry across model switches: transcripts
                // are model-specific, so start the conversation over
                tracing::info!(
                    session_id = %session_id,
                    model = %model,
                    "Model switch detected, resetting session history"
                );
                Vec::new()
            }
            None => Vec::new(),
        };

        history.push(Content::user_text(mensagem));
        let mut reply = self.provider.generate(model, &history).await?;

        let mut tools_usadas = Vec::new();
        let mut rounds = 0;

        loop {
            let calls: Vec<FunctionCall> =
                reply.function_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                break;
            }
            if rounds >= self.max_tool_rounds {
                return Err(AgentError::MaxToolRounds(self.max_tool_rounds));
            }
            rounds += 1;

            history.push(reply);

            let mut result_parts: Vec<Part> = Vec::with_capacity(calls.len());
            for call in &calls {
                let outcome = self.tools.invoke(call).await;
                tools_usadas.push(outcome.name.clone());
                result_parts.push(Part::function_response(outcome.name, outcome.response));
            }

            // Submit all results back to the model in one batch
            history.push(Content::function_results(result_parts));
            reply = self.provider.generate(model, &history).await?;
        }

        let resposta = reply.text();
        history.push(reply);

        self.store.put(
            session_id,
            SessionHistory {
                contents: history,
                model: model.to_string(),
            },
        );

        Ok(Exchange {
            resposta,
            tools_usadas,
            modelo_usado: model.to_string(),
        })
    }

    fn failure_outcome(&self, session_id: &str, error: &AgentError) -> ProcessOutcome {
        let resposta = match error {
            AgentError::AuthConfiguration(_) => {
                "O agente Bolota precisa de uma chave da API do Gemini configurada.".to_string()
            }
            _ => "Desculpe, ocorreu um erro ao processar sua mensagem. Tente novamente."
                .to_string(),
        };

        ProcessOutcome {
            session_id: session_id.to_string(),
            sucesso: false,
            resposta,
            tools_usadas: Vec::new(),
            modelo_usado: None,
            erro: Some(error.error_code()),
        }
    }

    /// Drop a session's transcript.
    pub fn clear_session(&self, session_id: &str) {
        self.store.clear(session_id);
        tracing::info!(session_id = %session_id, "Session cleared");
    }

    /// Snapshot for the status endpoint.
    pub fn stats(&self) -> AgentStats {
        AgentStats {
            sessoes_ativas: self.store.active_sessions(),
            modelo_primario: self.quota.primary_model().to_string(),
            modelo_fallback: self.quota.fallback_model().to_string(),
            modelos_com_quota_excedida: self.quota.excluded_models(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Access to the quota tracker (status endpoint and tests).
    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Stored history for a session, if any.
    pub fn session_history(&self, session_id: &str) -> Option<SessionHistory> {
        self.store.get(session_id)
    }
}
