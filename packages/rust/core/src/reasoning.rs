//! Client for the hosted reasoning collaborator.
//!
//! Speaks the OpenAI-compatible chat-completions protocol. The model is asked
//! to answer with a single JSON object:
//!
//! ```json
//! { "reordered_platforms": ["github", "..."], "pruned_candidates": ["..."], "narrative": "..." }
//! ```
//!
//! Every field is optional.

use std::time::Duration;

use dossier_shared::{AppConfig, BoxFuture, DossierError, ReasoningConfig, Result, reasoning_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const COLLABORATOR: &str = "reasoning";

/// Something that can answer a system + user prompt with text.
pub trait ReasoningClient: Send + Sync {
    fn complete<'a>(&'a self, system: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// What the model may answer with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReasoningResponse {
    #[serde(default)]
    pub reordered_platforms: Option<Vec<String>>,
    #[serde(default)]
    pub pruned_candidates: Option<Vec<String>>,
    #[serde(default)]
    pub narrative: Option<String>,
}

/// Parse model output, tolerating Markdown code fences and text around the
/// JSON object.
pub fn parse_response(content: &str) -> Result<ReasoningResponse> {
    let trimmed = strip_fences(content.trim());
    if let Ok(parsed) = serde_json::from_str(trimmed) {
        return Ok(parsed);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str(&trimmed[s..=e]).map_err(|err| {
            DossierError::unavailable(COLLABORATOR, format!("unparseable response: {err}"))
        }),
        _ => Err(DossierError::unavailable(
            COLLABORATOR,
            "response contained no JSON object",
        )),
    }
}

fn strip_fences(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // drop the language tag line
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// ---------------------------------------------------------------------------
// Chat-completions client
// ---------------------------------------------------------------------------

/// Reasoning client for OpenAI-compatible endpoints (DeepSeek by default).
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &ReasoningConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| DossierError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    /// Build from the app config, reading the key from the configured env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if !config.reasoning.enabled {
            return Err(DossierError::unavailable(COLLABORATOR, "disabled in config"));
        }
        let key = reasoning_api_key(config)?;
        Self::new(&config.reasoning, key)
    }

    async fn send(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DossierError::unavailable(COLLABORATOR, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(DossierError::unavailable(
                COLLABORATOR,
                format!("HTTP {}: {message}", status.as_u16()),
            ));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| DossierError::unavailable(COLLABORATOR, format!("invalid response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| DossierError::unavailable(COLLABORATOR, "no choices in response"))?;

        debug!(chars = content.len(), "reasoning response received");
        Ok(content)
    }
}

impl ReasoningClient for ChatCompletionsClient {
    fn complete<'a>(&'a self, system: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.send(system, prompt))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = parse_response(r#"{"narrative":"ok"}"#).unwrap();
        assert_eq!(plain.narrative.as_deref(), Some("ok"));

        let fenced = parse_response(
            "```json\n{\"reordered_platforms\":[\"github\"],\"pruned_candidates\":[]}\n```",
        )
        .unwrap();
        assert_eq!(fenced.reordered_platforms, Some(vec!["github".to_string()]));
        assert_eq!(fenced.pruned_candidates, Some(vec![]));

        let chatty = parse_response("Sure! Here you go: {\"narrative\": \"x\"} Hope it helps").unwrap();
        assert_eq!(chatty.narrative.as_deref(), Some("x"));

        assert!(parse_response("no json here").is_err());
    }

    fn config(endpoint: String) -> ReasoningConfig {
        ReasoningConfig {
            enabled: true,
            api_key_env: "DOSSIER_TEST_KEY".into(),
            endpoint,
            model: "test-model".into(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn sends_bearer_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"narrative\":\"done\"}" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ChatCompletionsClient::new(&config(format!("{}/v1/chat/completions", server.uri())), "sk-test")
                .unwrap();
        let content = client.complete("system", "prompt").await.unwrap();
        assert_eq!(parse_response(&content).unwrap().narrative.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn api_errors_are_collaborator_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "invalid api key" }
            })))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config(server.uri()), "bad").unwrap();
        let err = client.complete("s", "p").await.unwrap_err();
        match err {
            DossierError::CollaboratorUnavailable { message, .. } => {
                assert!(message.contains("401"));
                assert!(message.contains("invalid api key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn disabled_config_refuses() {
        let mut app = AppConfig::default();
        app.reasoning.enabled = false;
        assert!(matches!(
            ChatCompletionsClient::from_config(&app),
            Err(DossierError::CollaboratorUnavailable { .. })
        ));
    }
}
