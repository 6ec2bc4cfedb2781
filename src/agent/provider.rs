//! Chat provider
//!
//! The `ChatProvider` trait is the seam between the orchestrator and the
//! external language model; `GeminiProvider` implements it over the Gemini
//! `generateContent` REST endpoint. HTTP failures are classified into the
//! `AgentError` taxonomy here, so the retry executor and the quota tracker
//! never look at raw status codes.

use async_trait::async_trait;

use crate::agent::gemini::{
    Content, FunctionDeclaration, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, SystemInstruction, ToolDeclarations,
};
use crate::config::AgentConfig;
use crate::error::AgentError;

/// One request/response against a backing model: full ordered history in,
/// one model content (text or tool-call requests) out.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn generate(&self, model: &str, contents: &[Content]) -> Result<Content, AgentError>;
}

/// Direct HTTP client for the Gemini API
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    system_prompt: String,
    declarations: Vec<FunctionDeclaration>,
}

impl GeminiProvider {
    pub fn new(
        config: &AgentConfig,
        system_prompt: impl Into<String>,
        declarations: Vec<FunctionDeclaration>,
    ) -> Self {
        // Construction failure must not fall back to a client without the
        // per-call timeout
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to construct Gemini HTTP client");
        Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            system_prompt: system_prompt.into(),
            declarations,
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn generate(&self, model: &str, contents: &[Content]) -> Result<Content, AgentError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AgentError::AuthConfiguration("GEMINI_API_KEY is not configured".to_string())
        })?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, api_key
        );

        let request_body = GenerateContentRequest {
            contents: contents.to_vec(),
            tools: vec![ToolDeclarations {
                function_declarations: self.declarations.clone(),
            }],
            system_instruction: Some(SystemInstruction::from_text(self.system_prompt.clone())),
            generation_config: Some(GenerationConfig {
                temperature: Some(0.7),
                max_output_tokens: Some(1024),
            }),
        };

        tracing::debug!(
            model = %model,
            history_len = contents.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());

            tracing::error!(
                status_code = status_code,
                error_body = %error_body,
                "Gemini API returned error status"
            );

            return Err(classify_status(status_code, error_body));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            AgentError::Unclassified(format!("failed to parse Gemini API response: {e}"))
        })?;

        if let Some(feedback) = &parsed.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(AgentError::ProviderClient(format!(
                    "Gemini API blocked the prompt: {reason}"
                )));
            }
        }

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            AgentError::Unclassified("Gemini API response contains no candidates".to_string())
        })?;

        tracing::debug!(
            finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
            parts = candidate.content.parts.len(),
            "Received response from Gemini API"
        );

        Ok(candidate.content)
    }
}

fn classify_transport_error(error: reqwest::Error) -> AgentError {
    if error.is_timeout() || error.is_connect() {
        AgentError::NetworkTransient(error.to_string())
    } else {
        AgentError::Unclassified(error.to_string())
    }
}

fn classify_status(status_code: u16, body: String) -> AgentError {
    match status_code {
        429 => AgentError::RateLimited(format!("HTTP 429: {body}")),
        500..=599 => AgentError::ProviderServer(format!("HTTP {status_code}: {body}")),
        400 | 401 | 403 if mentions_api_key(&body) => {
            AgentError::AuthConfiguration(format!("HTTP {status_code}: {body}"))
        }
        400..=499 => AgentError::ProviderClient(format!("HTTP {status_code}: {body}")),
        other => AgentError::Unclassified(format!("HTTP {other}: {body}")),
    }
}

fn mentions_api_key(body: &str) -> bool {
    body.contains("API_KEY") || body.contains("API key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serial_test::serial;
    use std::time::Duration;

    fn test_config(base_url: &str, api_key: Option<&str>) -> AgentConfig {
        AgentConfig {
            gemini_api_key: api_key.map(str::to_string),
            gemini_base_url: base_url.to_string(),
            primary_model: "gemini-2.5-pro".to_string(),
            fallback_model: "gemini-2.5-flash".to_string(),
            request_timeout: Duration::from_secs(5),
            quota_cooldown: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(50),
            max_tool_rounds: 5,
        }
    }

    fn provider(base_url: &str, api_key: Option<&str>) -> GeminiProvider {
        GeminiProvider::new(&test_config(base_url, api_key), "persona", Vec::new())
    }

    #[tokio::test]
    async fn unreachable_host_is_transient_within_the_timeout() {
        // Non-routable address: the configured timeout bounds the call
        let mut config = test_config("http://10.255.255.1:9", Some("test-key"));
        config.request_timeout = Duration::from_millis(100);
        let provider = GeminiProvider::new(&config, "persona", Vec::new());

        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("oi")])
            .await;

        assert!(matches!(result, Err(AgentError::NetworkTransient(_))));
    }

    #[tokio::test]
    async fn missing_api_key_is_auth_configuration_error() {
        let provider = provider("http://localhost", None);
        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("oi")])
            .await;
        assert!(matches!(result, Err(AgentError::AuthConfiguration(_))));
    }

    #[tokio::test]
    #[serial]
    async fn success_returns_model_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(
                r#"{
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [{"text": "Ola! Como posso ajudar?"}]
                        },
                        "finishReason": "STOP"
                    }]
                }"#,
            )
            .create_async()
            .await;

        let provider = provider(&server.url(), Some("test-key"));
        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("Ola")])
            .await;

        mock.assert_async().await;
        let content = result.unwrap();
        assert_eq!(content.text(), "Ola! Como posso ajudar?");
        assert!(content.function_calls().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn rate_limit_status_maps_to_rate_limited() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error": "Resource has been exhausted"}"#)
            .create_async()
            .await;

        let provider = provider(&server.url(), Some("test-key"));
        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("oi")])
            .await;

        mock.assert_async().await;
        let error = result.unwrap_err();
        assert!(error.is_quota());
        assert!(error.is_retryable());
    }

    #[tokio::test]
    #[serial]
    async fn server_error_maps_to_provider_server() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let provider = provider(&server.url(), Some("test-key"));
        let result = provider
            .generate("gemini-2.5-flash", &[Content::user_text("oi")])
            .await;

        assert!(matches!(result, Err(AgentError::ProviderServer(_))));
    }

    #[tokio::test]
    #[serial]
    async fn invalid_key_body_maps_to_auth_configuration() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error": {"message": "API key not valid"}}"#)
            .create_async()
            .await;

        let provider = provider(&server.url(), Some("bad-key"));
        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("oi")])
            .await;

        assert!(matches!(result, Err(AgentError::AuthConfiguration(_))));
    }

    #[tokio::test]
    #[serial]
    async fn not_found_maps_to_provider_client() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("model not found")
            .create_async()
            .await;

        let provider = provider(&server.url(), Some("test-key"));
        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("oi")])
            .await;

        let error = result.unwrap_err();
        assert!(matches!(error, AgentError::ProviderClient(_)));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    #[serial]
    async fn blocked_prompt_maps_to_provider_client() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                    "candidates": [],
                    "promptFeedback": {"blockReason": "SAFETY"}
                }"#,
            )
            .create_async()
            .await;

        let provider = provider(&server.url(), Some("test-key"));
        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("oi")])
            .await;

        match result {
            Err(AgentError::ProviderClient(message)) => {
                assert!(message.contains("blocked the prompt"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    #[serial]
    async fn empty_candidates_is_unclassified() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/models/gemini-2.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let provider = provider(&server.url(), Some("test-key"));
        let result = provider
            .generate("gemini-2.5-pro", &[Content::user_text("oi")])
            .await;

        // Retryable by default: unknown conditions get a second chance
        let error = result.unwrap_err();
        assert!(matches!(error, AgentError::Unclassified(_)));
        assert!(error.is_retryable());
    }
}
