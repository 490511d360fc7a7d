use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::LlmConfig;
use crate::error::{Result, TogError};

/// One prompt sent to a chat-completion provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-in, text-out completion service behind the LLM oracle.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are an AI assistant that helps people find information.";

/// Outcome of a single request attempt.
#[derive(Debug)]
enum Attempt {
    /// Rate limit, server error or network failure; worth another try.
    Retryable(String),
    Fatal(String),
}

/// OpenAI-compatible chat completions client
///
/// Retries rate limits, server errors and network failures with a fixed delay.
pub struct ChatClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: usize,
    retry_delay: Duration,
}

impl ChatClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_once(&self, request: &ChatRequest) -> std::result::Result<String, Attempt> {
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let message = format!("Chat API error {}: {}", status, text);
            return Err(if is_retryable_status(status) {
                Attempt::Retryable(message)
            } else {
                Attempt::Fatal(message)
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Fatal(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Attempt::Fatal("Empty response from chat API".to_string()))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Run `op` up to `max_attempts` times, sleeping `delay` between retryable failures.
async fn with_retries<T, F, Fut>(max_attempts: usize, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Attempt>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Attempt::Fatal(message)) => return Err(TogError::Oracle(message)),
            Err(Attempt::Retryable(message)) if attempt < max_attempts => {
                log::warn!(
                    "Retry {}/{} after {:?}: {}",
                    attempt,
                    max_attempts - 1,
                    delay,
                    message
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(Attempt::Retryable(message)) => {
                return Err(TogError::Oracle(format!(
                    "gave up after {} attempts: {}",
                    max_attempts, message
                )))
            }
        }
    }
}

#[async_trait]
impl ChatCompletion for ChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let start = Instant::now();
        let text = with_retries(self.max_retries, self.retry_delay, || {
            self.complete_once(request)
        })
        .await?;
        log::debug!("Chat completion took {:?}", start.elapsed());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retries(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Attempt::Retryable("503".to_string()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_retries(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Attempt::Retryable("429".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(TogError::Oracle(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_retries(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Attempt::Fatal("401".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let config = crate::Config::from_toml_str(
            "[tog]\ngraph_db = \"g.db\"\noutput_path = \"o.jsonl\"\n[llm]\nbase_url = \"http://localhost:8000/v1/\"\n",
        )
        .unwrap();
        let client = ChatClient::new(&config.llm, "key".to_string()).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8000/v1/chat/completions");
        assert_eq!(client.model(), "gpt-3.5-turbo");
    }
}
