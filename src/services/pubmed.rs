//! PubMed literature search
//!
//! Two-step client for the NCBI E-utilities: `esearch` to find article ids
//! for a medicine, then `esummary` to fetch and normalize their metadata.
//! Failures are returned as data (`sucesso: false` plus an error string) so
//! the agent's tool layer can always feed a well-formed payload back to the
//! model.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PubmedConfig;

/// A normalized article summary
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Article {
    pub id: String,
    pub titulo: String,
    /// First three authors, "et al." appended when there are more
    pub autores: String,
    pub revista: String,
    pub ano: String,
    pub resumo: String,
    pub link: String,
}

/// Result envelope for a literature search
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSearchResult {
    pub sucesso: bool,
    pub termo: String,
    pub total_encontrado: usize,
    pub artigos: Vec<Article>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mensagem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erro: Option<String>,
}

#[derive(Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// HTTP client for the E-utilities endpoints
pub struct PubmedClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    email: Option<String>,
}

impl PubmedClient {
    pub fn new(config: &PubmedConfig) -> Self {
        // Construction failure must not fall back to a client without the
        // per-call timeout
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to construct PubMed HTTP client");
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            email: config.email.clone(),
        }
    }

    /// Search articles about a veterinary medicine. Never fails: network
    /// and parse errors come back inside the result envelope.
    pub async fn buscar_artigos(&self, medicamento: &str, max_results: usize) -> ArticleSearchResult {
        let termo_busca = format!("{medicamento} veterinary OR {medicamento} animal");

        let outcome = async {
            let ids = self.search_article_ids(&termo_busca, max_results).await?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            self.fetch_article_details(&ids).await
        }
        .await;

        match outcome {
            Ok(artigos) if artigos.is_empty() => ArticleSearchResult {
                sucesso: true,
                termo: medicamento.to_string(),
                total_encontrado: 0,
                artigos: Vec::new(),
                mensagem: Some("Nenhum artigo encontrado para este medicamento.".to_string()),
                erro: None,
            },
            Ok(artigos) => ArticleSearchResult {
                sucesso: true,
                termo: medicamento.to_string(),
                total_encontrado: artigos.len(),
                artigos,
                mensagem: None,
                erro: None,
            },
            Err(error) => {
                tracing::error!(
                    medicamento = %medicamento,
                    error = %error,
                    "PubMed search failed"
                );
                ArticleSearchResult {
                    sucesso: false,
                    termo: medicamento.to_string(),
                    total_encontrado: 0,
                    artigos: Vec::new(),
                    mensagem: None,
                    erro: Some(error.to_string()),
                }
            }
        }
    }

    async fn search_article_ids(&self, termo: &str, max_results: usize) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let retmax = max_results.to_string();
        let mut params = vec![
            ("db", "pubmed"),
            ("term", termo),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
            ("sort", "relevance"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key));
        }
        if let Some(email) = &self.email {
            params.push(("email", email));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("esearch request failed")?
            .error_for_status()
            .context("esearch returned error status")?;

        let parsed: EsearchResponse = response
            .json()
            .await
            .context("failed to parse esearch response")?;
        Ok(parsed.esearchresult.idlist)
    }

    async fn fetch_article_details(&self, ids: &[String]) -> anyhow::Result<Vec<Article>> {
        let url = format!("{}/esummary.fcgi", self.base_url);
        let id_list = ids.join(",");
        let mut params = vec![
            ("db", "pubmed"),
            ("id", id_list.as_str()),
            ("retmode", "json"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key));
        }
        if let Some(email) = &self.email {
            params.push(("email", email));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("esummary request failed")?
            .error_for_status()
            .context("esummary returned error status")?;

        let body: Value = response
            .json()
            .await
            .context("failed to parse esummary response")?;
        let result = body
            .get("result")
            .ok_or_else(|| anyhow!("esummary response has no result object"))?;

        // esummary keys articles by uid; preserve the id order from esearch
        let artigos = ids
            .iter()
            .filter_map(|id| result.get(id.as_str()))
            .map(format_article)
            .collect();
        Ok(artigos)
    }
}

fn format_article(artigo: &Value) -> Article {
    let uid = artigo
        .get("uid")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let author_names: Vec<String> = artigo
        .get("authors")
        .and_then(Value::as_array)
        .map(|authors| {
            authors
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let autores = if author_names.is_empty() {
        "Autores nao disponiveis".to_string()
    } else if author_names.len() > 3 {
        format!("{} et al.", author_names[..3].join(", "))
    } else {
        author_names.join(", ")
    };

    Article {
        link: format!("https://pubmed.ncbi.nlm.nih.gov/{uid}/"),
        id: uid,
        titulo: artigo
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or("Titulo nao disponivel")
            .to_string(),
        autores,
        revista: artigo
            .get("source")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("N/A")
            .to_string(),
        ano: artigo
            .get("pubdate")
            .and_then(Value::as_str)
            .and_then(|d| d.split(' ').next())
            .filter(|y| !y.is_empty())
            .unwrap_or("N/A")
            .to_string(),
        resumo: artigo
            .get("sorttitle")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("Resumo nao disponivel via API sumaria")
            .to_string(),
    }
}
