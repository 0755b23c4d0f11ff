//! OpenAI-compatible chat-completions provider
//!
//! Works against any service exposing the `/chat/completions` shape
//! (OpenAI, HuggingFace router, local inference gateways). One attempt per
//! call: a failed or timed-out request is reported to the caller, never
//! retried here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::llm::client::{CompletionRequest, CompletionResponse, LlmClient, Message};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for OpenAI-compatible chat-completion endpoints
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    max_chars: usize,
}

impl OpenAiCompatClient {
    /// Create a new client with the default endpoint and timeout
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_http_client(DEFAULT_TIMEOUT),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_chars: 0,
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound the whole request by a timeout; a slow service fails cleanly
    /// instead of stalling the caller
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = build_http_client(timeout);
        self
    }

    /// Cap reply length in characters (0 = unlimited)
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn clamp(&self, text: &str) -> String {
        let trimmed = text.trim();
        if self.max_chars == 0 {
            return trimmed.to_string();
        }
        match trimmed.char_indices().nth(self.max_chars) {
            Some((byte_idx, _)) => trimmed[..byte_idx].trim_end().to_string(),
            None => trimmed.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ApiRequest {
            model: self.model.clone(),
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiError::Llm(format!(
                "chat completion failed: HTTP {}",
                response.status()
            )));
        }

        let data: ApiResponse = response.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::InvalidFormat("response has no choices".to_string()))?;

        let content = choice
            .message
            .content
            .map(|text| self.clamp(&text))
            .filter(|text| !text.is_empty());

        Ok(CompletionResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::Role;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![
            Message::system("You are a helper."),
            Message::user("Steve: how do I tame a wolf?"),
        ])
        .with_temperature(0.5)
        .with_max_tokens(120)
    }

    fn client_for(server: &MockServer) -> OpenAiCompatClient {
        OpenAiCompatClient::new("test-token")
            .with_base_url(server.uri())
            .with_model("test-model")
            .with_timeout(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn complete_parses_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "temperature": 0.5,
                "max_tokens": 120,
                "messages": [
                    {"role": "system", "content": "You are a helper."},
                    {"role": "user", "content": "Steve: how do I tame a wolf?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  Bones!  "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).complete(request()).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("Bones!"));
    }

    #[tokio::test]
    async fn complete_fails_on_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client_for(&server).complete(request()).await;
        assert!(matches!(result, Err(AiError::Llm(_))));
    }

    #[tokio::test]
    async fn complete_fails_on_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).complete(request()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn complete_fails_on_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let result = client_for(&server).complete(request()).await;
        assert!(matches!(result, Err(AiError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn complete_times_out_cleanly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let result = client_for(&server).complete(request()).await;
        assert!(matches!(result, Err(AiError::Http(_))));
    }

    #[tokio::test]
    async fn reply_is_truncated_to_max_chars() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "аб вгдежз"}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).with_max_chars(3);
        let response = client.complete(request()).await.unwrap();
        // Cut at a character boundary, trailing whitespace dropped.
        assert_eq!(response.content.as_deref(), Some("аб"));
    }

    #[tokio::test]
    async fn whitespace_only_content_maps_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "   "}}]
            })))
            .mount(&server)
            .await;

        let response = client_for(&server).complete(request()).await.unwrap();
        assert!(response.content.is_none());
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message {
            role: Role::Assistant,
            content: "hi".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
