//! Local language model runtime client (Ollama HTTP API).

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::models::config::LlmConfig;

/// One single-message chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// The user message.
    pub prompt: String,
    /// Ask the runtime to constrain output to JSON.
    pub json_output: bool,
}

/// A chat-capable language model.
pub trait LanguageModel {
    /// Identifier of the model answering requests.
    fn model_id(&self) -> &str;

    /// Send one message and return the model's response text.
    fn chat(&self, request: &ChatRequest) -> impl Future<Output = Result<String, LlmError>>;
}

/// Client for an Ollama server on this host.
pub struct OllamaClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a client. Endpoints off this host are refused unless
    /// `allow_remote` is set.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| LlmError::Connection(format!("invalid endpoint {}: {}", config.endpoint, e)))?;

        if !config.allow_remote && !is_local(&endpoint) {
            return Err(LlmError::RemoteEndpoint(config.endpoint.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// Check if the runtime answers.
    pub async fn is_available(&self) -> bool {
        match self.client.get(self.url("/api/tags")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List models pulled into the runtime.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let resp = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LlmError::Api(format!("HTTP {}", resp.status())));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Response(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured model is pulled. Tags without a suffix match `:latest`.
    pub async fn has_model(&self) -> Result<bool, LlmError> {
        let wanted = &self.config.model;
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| {
            m == wanted || (!wanted.contains(':') && m.strip_suffix(":latest") == Some(wanted))
        }))
    }
}

impl LanguageModel for OllamaClient {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = ChatBody {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            format: request.json_output.then_some("json"),
            stream: false,
            options: self
                .config
                .temperature
                .map(|temperature| ChatOptions { temperature }),
        };

        debug!(
            "Sending {} prompt chars to {}",
            request.prompt.len(),
            self.config.model
        );

        let resp = self
            .client
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Response(e.to_string()))?;

        Ok(chat.message.content)
    }
}

fn is_local(endpoint: &Url) -> bool {
    let Some(host) = endpoint.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OllamaClient {
        OllamaClient::new(LlmConfig {
            endpoint: server.uri(),
            model: "llama3.2".to_string(),
            ..LlmConfig::default()
        })
        .unwrap()
    }

    fn json_request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.to_string(),
            json_output: true,
        }
    }

    #[test]
    fn test_localhost_guard() {
        for endpoint in ["http://localhost:11434", "http://127.0.0.1:11434", "http://[::1]:11434"] {
            let config = LlmConfig {
                endpoint: endpoint.to_string(),
                ..LlmConfig::default()
            };
            assert!(OllamaClient::new(config).is_ok(), "{} rejected", endpoint);
        }

        let remote = LlmConfig {
            endpoint: "https://llm.example.com".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            OllamaClient::new(remote.clone()).err(),
            Some(LlmError::RemoteEndpoint(_))
        ));

        let allowed = LlmConfig {
            allow_remote: true,
            ..remote
        };
        assert!(OllamaClient::new(allowed).is_ok());
    }

    #[tokio::test]
    async fn test_chat_sends_json_mode_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.2",
                "format": "json",
                "stream": false,
                "messages": [{"role": "user", "content": "extract"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": {"role": "assistant", "content": "{\"tax_code\": \"1257L\"}"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let content = client_for(&server).chat(&json_request("extract")).await.unwrap();
        assert_eq!(content, r#"{"tax_code": "1257L"}"#);
    }

    #[tokio::test]
    async fn test_chat_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = client_for(&server).chat(&json_request("x")).await.unwrap_err();
        assert!(matches!(&err, LlmError::Api(msg) if msg.contains("404") && msg.contains("model not found")));
    }

    #[tokio::test]
    async fn test_chat_bad_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).chat(&json_request("x")).await.unwrap_err();
        assert!(matches!(err, LlmError::Response(_)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let client = OllamaClient::new(LlmConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            ..LlmConfig::default()
        })
        .unwrap();

        let err = client.chat(&json_request("x")).await.unwrap_err();
        assert!(matches!(err, LlmError::Connection(_)));
        assert!(!client.is_available().await);
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "llama3.2:latest"}, {"name": "qwen2.5:7b"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.is_available().await);
        assert_eq!(
            client.list_models().await.unwrap(),
            vec!["llama3.2:latest", "qwen2.5:7b"]
        );
        assert!(client.has_model().await.unwrap());
    }
}
