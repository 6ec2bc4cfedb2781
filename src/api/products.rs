//! Product catalog endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub termo: Option<String>,
}

/// GET /api/produtos
pub async fn list(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let produtos = state.catalog.find_all();
    (
        StatusCode::OK,
        Json(json!({
            "sucesso": true,
            "total": produtos.len(),
            "produtos": produtos,
        })),
    )
}

/// GET /api/produtos/busca?termo=...
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> (StatusCode, Json<Value>) {
    let termo = match query.termo.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "sucesso": false,
                    "erro": "Parametro \"termo\" e obrigatorio",
                })),
            );
        }
    };

    let produtos = state.catalog.find_by_term(&termo);
    (
        StatusCode::OK,
        Json(json!({
            "sucesso": true,
            "termo": termo,
            "total": produtos.len(),
            "produtos": produtos,
        })),
    )
}

/// GET /api/produtos/:id
pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> (StatusCode, Json<Value>) {
    match state.catalog.find_by_id(id) {
        Some(produto) => (
            StatusCode::OK,
            Json(json!({"sucesso": true, "produto": produto})),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "sucesso": false,
                "erro": format!("Produto {id} nao encontrado"),
            })),
        ),
    }
}
