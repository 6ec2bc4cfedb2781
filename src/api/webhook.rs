//! Agent webhook endpoints
//!
//! The thin HTTP boundary in front of the orchestration core: request
//! validation and payload shaping only, no orchestration logic.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// Maximum accepted message length in characters
const MAX_MESSAGE_LENGTH: usize = 1000;

/// Body for `POST /webhook/bolota`
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub mensagem: Option<String>,
    /// Accepts both `sessionId` and `session_id`
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
}

/// POST /webhook/bolota
///
/// Main interaction endpoint. Validates the message and delegates to the
/// orchestrator; every orchestration outcome maps to HTTP 200 with a
/// structured body, only validation failures produce 400.
pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessRequest>,
) -> (StatusCode, Json<Value>) {
    let mensagem = match request.mensagem {
        Some(m) => m,
        None => {
            return validation_error("Campo \"mensagem\" e obrigatorio e deve ser uma string");
        }
    };

    let mensagem = mensagem.trim().to_string();
    if mensagem.is_empty() {
        return validation_error("Mensagem nao pode estar vazia");
    }
    if mensagem.chars().count() > MAX_MESSAGE_LENGTH {
        return validation_error("Mensagem muito longa. Maximo: 1000 caracteres");
    }

    let outcome = state
        .orchestrator
        .process(&mensagem, request.session_id)
        .await;

    (
        StatusCode::OK,
        Json(serde_json::to_value(outcome).unwrap_or_else(|_| {
            json!({"sucesso": false, "erro": "Erro interno ao processar mensagem"})
        })),
    )
}

/// GET /webhook/bolota/status
pub async fn status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let stats = state.orchestrator.stats();
    let mut body = json!({
        "sucesso": true,
        "agente": "Bolota",
        "versao": env!("CARGO_PKG_VERSION"),
        "status": "online",
    });
    if let (Value::Object(map), Value::Object(stats_map)) =
        (&mut body, serde_json::to_value(&stats).unwrap_or_default())
    {
        map.extend(stats_map);
    }
    (StatusCode::OK, Json(body))
}

/// DELETE /webhook/bolota/sessao/:session_id
pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.orchestrator.clear_session(&session_id);
    (
        StatusCode::OK,
        Json(json!({
            "sucesso": true,
            "mensagem": format!("Sessao {session_id} removida"),
        })),
    )
}

fn validation_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"sucesso": false, "erro": message})),
    )
}
