//! Integration tests for the agent orchestration pipeline
//!
//! These tests drive the orchestrator through a scripted provider so the
//! full flow runs without network access:
//! 1. Plain exchange with session creation
//! 2. Tool-calling rounds against the registered tools
//! 3. Model fallback under quota exhaustion
//! 4. Degraded response when every model is excluded
//! 5. Per-session serialization of concurrent requests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use bolota_backend::agent::gemini::{Content, FunctionCall, FunctionDeclaration, Part};
use bolota_backend::agent::orchestrator::OrchestratorOptions;
use bolota_backend::agent::provider::ChatProvider;
use bolota_backend::agent::tools::ToolHandler;
use bolota_backend::agent::{AgentOrchestrator, RetryOptions, StockLookupTool, ToolRegistry};
use bolota_backend::error::AgentError;
use bolota_backend::services::ProductCatalog;

/// Provider that replays a queue of scripted replies and records every
/// request body it receives.
struct ScriptedProvider {
    replies: Mutex<Vec<Result<Content, AgentError>>>,
    calls: AtomicUsize,
    seen_models: Mutex<Vec<String>>,
    seen_requests: Mutex<Vec<Vec<Content>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<Content, AgentError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
            seen_models: Mutex::new(Vec::new()),
            seen_requests: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn models(&self) -> Vec<String> {
        self.seen_models.lock().unwrap().clone()
    }

    fn last_request(&self) -> Vec<Content> {
        self.seen_requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn generate(&self, model: &str, contents: &[Content]) -> Result<Content, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_models.lock().unwrap().push(model.to_string());
        self.seen_requests.lock().unwrap().push(contents.to_vec());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Ok(Content::model_text("fim"))
        } else {
            replies.remove(0)
        }
    }
}

/// Stubbed article search so tool flows run without PubMed access
struct StubArticleTool;

#[async_trait]
impl ToolHandler for StubArticleTool {
    fn name(&self) -> &str {
        "buscar_artigos"
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "buscar_artigos".to_string(),
            description: "stub".to_string(),
            parameters: json!({"type": "object"}),
        }
    }

    async fn execute(&self, args: &Value) -> Result<Value, AgentError> {
        let medicamento = args["medicamento"].as_str().unwrap_or("").to_string();
        Ok(json!({
            "sucesso": true,
            "totalEncontrado": 2,
            "artigos": [
                {"titulo": format!("{medicamento} in canine dermatology"), "ano": "2023"},
                {"titulo": format!("{medicamento} pharmacokinetics in cats"), "ano": "2021"}
            ]
        }))
    }
}

fn test_options() -> OrchestratorOptions {
    OrchestratorOptions {
        primary_model: "gemini-2.5-pro".to_string(),
        fallback_model: "gemini-2.5-flash".to_string(),
        quota_cooldown: Duration::from_secs(60),
        retry: RetryOptions {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        max_tool_rounds: 5,
    }
}

fn build_orchestrator(provider: Arc<ScriptedProvider>) -> AgentOrchestrator {
    let mut tools = ToolRegistry::new();
    tools.register(StockLookupTool::new(Arc::new(
        ProductCatalog::with_seed_data(),
    )));
    tools.register(StubArticleTool);
    AgentOrchestrator::new(provider, Arc::new(tools), test_options())
}

fn function_call_reply(name: &str, args: Value) -> Content {
    Content {
        role: "model".to_string(),
        parts: vec![Part {
            function_call: Some(FunctionCall {
                name: name.to_string(),
                args,
            }),
            ..Part::default()
        }],
    }
}

/// Greeting with no session id: a new session is created, the reply is
/// plain text and no tools run.
#[tokio::test]
async fn greeting_creates_session_and_answers_without_tools() {
    let provider = ScriptedProvider::new(vec![Ok(Content::model_text(
        "Ola! Sou o Bolota, como posso ajudar?",
    ))]);
    let orchestrator = build_orchestrator(provider.clone());

    let outcome = orchestrator.process("Ola", None).await;

    assert!(outcome.sucesso);
    assert!(Uuid::parse_str(&outcome.session_id).is_ok());
    assert!(!outcome.resposta.is_empty());
    assert!(outcome.tools_usadas.is_empty());
    assert_eq!(outcome.modelo_usado.as_deref(), Some("gemini-2.5-pro"));
    assert_eq!(provider.call_count(), 1);

    // The committed transcript holds the user turn and the model turn
    let session = orchestrator.session_history(&outcome.session_id).unwrap();
    assert_eq!(session.contents.len(), 2);
    assert_eq!(session.contents[0].role, "user");
    assert_eq!(session.contents[1].role, "model");
}

/// Medicine question: the model requests an article search, the tool
/// result is fed back and the final answer references the medicine.
#[tokio::test]
async fn medicine_question_runs_article_search_round() {
    let provider = ScriptedProvider::new(vec![
        Ok(function_call_reply(
            "buscar_artigos",
            json!({"medicamento": "Amoxicilina", "limite": 3}),
        )),
        Ok(Content::model_text(
            "A Amoxicilina e um antibiotico. Encontrei 2 artigos. Lembre-se da \
             prescricao veterinaria. Gostaria de verificar o preco?",
        )),
    ]);
    let orchestrator = build_orchestrator(provider.clone());

    let outcome = orchestrator
        .process("Me fale sobre Amoxicilina", Some("sessao-artigos".to_string()))
        .await;

    assert!(outcome.sucesso);
    assert!(outcome.resposta.contains("Amoxicilina"));
    assert_eq!(outcome.tools_usadas, vec!["buscar_artigos".to_string()]);
    assert_eq!(provider.call_count(), 2);

    // The second request must carry the tool result back to the model
    let second_request = provider.last_request();
    let function_turn = second_request
        .iter()
        .find(|c| c.role == "function")
        .expect("tool result turn present");
    let response = &function_turn.parts[0]
        .function_response
        .as_ref()
        .unwrap()
        .response;
    assert_eq!(response["sucesso"], true);
    assert_eq!(response["totalEncontrado"], 2);
}

/// Stock confirmation: the real catalog tool answers with the seeded
/// price and quantity, and both reach the model on the follow-up call.
#[tokio::test]
async fn stock_confirmation_surfaces_price_and_quantity() {
    let provider = ScriptedProvider::new(vec![
        Ok(function_call_reply(
            "buscar_estoque",
            json!({"termo": "apoquel"}),
        )),
        Ok(Content::model_text(
            "O Apoquel 16mg custa R$ 112,00 e temos 30 unidades em estoque. \
             Posso ajudar com mais alguma coisa?",
        )),
    ]);
    let orchestrator = build_orchestrator(provider.clone());

    let outcome = orchestrator
        .process("sim, quero ver o estoque", Some("sessao-estoque".to_string()))
        .await;

    assert!(outcome.sucesso);
    assert!(outcome.resposta.contains("R$ 112,00"));
    assert!(outcome.resposta.contains("30"));
    assert_eq!(outcome.tools_usadas, vec!["buscar_estoque".to_string()]);

    let second_request = provider.last_request();
    let function_turn = second_request
        .iter()
        .find(|c| c.role == "function")
        .expect("tool result turn present");
    let produto = &function_turn.parts[0]
        .function_response
        .as_ref()
        .unwrap()
        .response["produto"];
    assert_eq!(produto["preco"], "R$ 112,00");
    assert_eq!(produto["estoque"], 30);
    assert_eq!(produto["status"], "Estoque moderado");
}

/// Quota exhaustion on the primary: after the retries run out the model
/// is excluded and the same call completes on the fallback.
#[tokio::test(start_paused = true)]
async fn quota_exhaustion_falls_back_within_one_call() {
    let provider = ScriptedProvider::new(vec![
        Err(AgentError::RateLimited("429".to_string())),
        Err(AgentError::RateLimited("429".to_string())),
        Ok(Content::model_text("resposta pelo fallback")),
    ]);
    let orchestrator = build_orchestrator(provider.clone());

    let outcome = orchestrator.process("oi", Some("s-quota".to_string())).await;

    assert!(outcome.sucesso);
    assert_eq!(outcome.modelo_usado.as_deref(), Some("gemini-2.5-flash"));
    assert_eq!(
        provider.models(),
        vec!["gemini-2.5-pro", "gemini-2.5-pro", "gemini-2.5-flash"]
    );
    assert_eq!(
        orchestrator.quota().excluded_models(),
        vec!["gemini-2.5-pro".to_string()]
    );
}

/// Both models excluded: the degraded answer comes back without a single
/// provider call.
#[tokio::test]
async fn all_models_excluded_degrades_without_provider_calls() {
    let provider = ScriptedProvider::new(Vec::new());
    let orchestrator = build_orchestrator(provider.clone());
    orchestrator.quota().mark_excluded("gemini-2.5-pro");
    orchestrator.quota().mark_excluded("gemini-2.5-flash");

    let outcome = orchestrator.process("oi", Some("s-deg".to_string())).await;

    assert!(!outcome.sucesso);
    assert_eq!(
        outcome.erro.as_deref(),
        Some("ALL_MODELS_QUOTA_EXCEEDED")
    );
    assert!(outcome.resposta.contains("temporariamente sobrecarregado"));
    assert!(outcome.modelo_usado.is_none());
    assert_eq!(provider.call_count(), 0);
}

/// Concurrent requests on one session serialize: every exchange lands in
/// the transcript and no two exchanges interleave their turns.
#[tokio::test]
async fn concurrent_requests_on_one_session_serialize() {
    let provider = ScriptedProvider::new(Vec::new());
    let orchestrator = Arc::new(build_orchestrator(provider.clone()));

    let mut handles = Vec::new();
    for i in 0..5 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .process(&format!("mensagem {i}"), Some("compartilhada".to_string()))
                .await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.sucesso);
    }

    // Five serialized exchanges, each appending a user and a model turn
    let session = orchestrator.session_history("compartilhada").unwrap();
    assert_eq!(session.contents.len(), 10);
    for pair in session.contents.chunks(2) {
        assert_eq!(pair[0].role, "user");
        assert_eq!(pair[1].role, "model");
    }
}

/// Requests on distinct sessions do not block each other and keep
/// separate transcripts.
#[tokio::test]
async fn distinct_sessions_keep_independent_transcripts() {
    let provider = ScriptedProvider::new(Vec::new());
    let orchestrator = Arc::new(build_orchestrator(provider.clone()));

    let a = orchestrator.process("primeira", Some("sa".to_string()));
    let b = orchestrator.process("segunda", Some("sb".to_string()));
    let (a, b) = tokio::join!(a, b);

    assert!(a.sucesso && b.sucesso);
    let sa = orchestrator.session_history("sa").unwrap();
    let sb = orchestrator.session_history("sb").unwrap();
    assert_eq!(sa.contents.len(), 2);
    assert_eq!(sb.contents.len(), 2);
    assert_eq!(sa.contents[0].text(), "primeira");
    assert_eq!(sb.contents[0].text(), "segunda");
}
