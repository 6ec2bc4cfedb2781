//! PubMed literature endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// Default article count for direct API queries
const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    pub medicamento: Option<String>,
    pub limite: Option<usize>,
}

/// GET /api/pubmed/artigos?medicamento=...&limite=...
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticlesQuery>,
) -> (StatusCode, Json<Value>) {
    let medicamento = match query.medicamento.as_deref().map(str::trim) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "sucesso": false,
                    "erro": "Parametro \"medicamento\" e obrigatorio",
                })),
            );
        }
    };

    let limite = query.limite.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let resultado = state.pubmed.buscar_artigos(&medicamento, limite).await;

    (
        StatusCode::OK,
        Json(serde_json::to_value(resultado).unwrap_or_else(|_| {
            json!({"sucesso": false, "erro": "Erro interno ao buscar artigos"})
        })),
    )
}
