//! HTTP client for the external LLM chat endpoint used by the
//! question-answering service. Treated as a single black-box
//! OpenAI-compatible completion endpoint, not a multi-provider
//! abstraction: one base URL, one API key, one retry policy.

use std::time::Duration;

use async_trait::async_trait;
use codegraph_core::{ChatBot, ChatResponse, CodeGraphError, LlmConfig, Result};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_TOP_P: f32 = 1.0;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Retrying HTTP client for an OpenAI-compatible chat completion
/// endpoint. Every call to `ask` goes through the same retry policy:
/// up to 3 attempts total, exponential backoff (1s, 2s, 4s) on HTTP
/// 429, a retry with identical settings on timeout, and an immediate
/// raise on any other non-2xx status.
pub struct HttpChatBot {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpChatBot {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CodeGraphError::Configuration(format!("building http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn request_body(&self, system_prompt: &str, context: &str, question: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: context.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: question.to_string(),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: DEFAULT_TOP_P,
        }
    }

    async fn send(&self, body: &ChatRequest) -> std::result::Result<reqwest::Response, AttemptError> {
        let mut request = self.client.post(&self.config.endpoint).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::Timeout
            } else {
                AttemptError::Transport(e.to_string())
            }
        })
    }
}

enum AttemptError {
    Timeout,
    TooManyRequests,
    Transport(String),
    Status(u16, String),
}

#[async_trait]
impl ChatBot for HttpChatBot {
    async fn ask(&self, system_prompt: &str, context: &str, question: &str) -> Result<ChatResponse> {
        let body = self.request_body(system_prompt, context, question);
        let max_attempts = self.config.max_retries.max(1);

        let mut last_error: Option<AttemptError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                if let Some(AttemptError::TooManyRequests) = last_error {
                    let delay = Duration::from_secs(2u64.pow(attempt - 1));
                    tokio::time::sleep(delay).await;
                }
            }

            let outcome: AttemptError = match self.send(&body).await {
                Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    AttemptError::TooManyRequests
                }
                Ok(response) if response.status().is_success() => {
                    let text = response
                        .text()
                        .await
                        .map_err(|e| CodeGraphError::ApiConnection(format!("reading body: {e}")))?;
                    let parsed: ChatCompletionResponse = serde_json::from_str(&text)
                        .map_err(|e| CodeGraphError::ApiModel(format!("decoding response: {e} ({text})")))?;
                    let content = parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| CodeGraphError::ApiModel("empty choices in response".into()))?;
                    let usage = parsed.usage.unwrap_or_default();
                    return Ok(ChatResponse {
                        content,
                        model: if parsed.model.is_empty() {
                            self.config.model.clone()
                        } else {
                            parsed.model
                        },
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                    });
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    AttemptError::Status(status, body)
                }
                Err(e) => e,
            };

            match outcome {
                AttemptError::Status(status, body) => {
                    // Any non-2xx other than 429 raises immediately.
                    return Err(CodeGraphError::ApiConnection(format!(
                        "LLM endpoint returned HTTP {status}: {body}"
                    )));
                }
                err => {
                    let is_last = attempt + 1 == max_attempts;
                    if is_last {
                        return Err(match err {
                            AttemptError::Timeout => {
                                CodeGraphError::ApiConnection("LLM request timed out".into())
                            }
                            AttemptError::TooManyRequests => {
                                CodeGraphError::ApiConnection("LLM endpoint rate-limited (429)".into())
                            }
                            AttemptError::Transport(msg) => CodeGraphError::ApiConnection(msg),
                            AttemptError::Status(status, body) => CodeGraphError::ApiConnection(
                                format!("LLM endpoint returned HTTP {status}: {body}"),
                            ),
                        });
                    }
                    warn!(
                        attempt = attempt + 1,
                        max_attempts, "LLM request failed, retrying"
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(CodeGraphError::ApiConnection(
            "LLM request failed after exhausting retries".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig {
            endpoint: "http://localhost:0/v1/chat/completions".to_string(),
            model: "test-model".to_string(),
            api_key: None,
            timeout_secs: 1,
            max_retries: 3,
            max_tokens: 256,
            temperature: 0.2,
        }
    }

    #[test]
    fn request_body_orders_system_context_question() {
        let bot = HttpChatBot::new(config()).unwrap();
        let body = bot.request_body("sys", "ctx", "q?");
        assert_eq!(body.messages.len(), 3);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[0].content, "sys");
        assert_eq!(body.messages[1].content, "ctx");
        assert_eq!(body.messages[2].content, "q?");
    }

    #[tokio::test]
    async fn connection_failure_surfaces_as_api_connection_error() {
        let bot = HttpChatBot::new(config()).unwrap();
        let result = bot.ask("sys", "ctx", "q?").await;
        assert!(matches!(result, Err(CodeGraphError::ApiConnection(_))));
    }
}
