use crate::errors::{RenobotError, RenobotResult};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum retries after the first attempt when the API reports throttling.
const MAX_RETRIES: u32 = 3;
/// Fixed delay between throttled attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Sent to the user when the completion API stays throttled past the retry
/// budget, and by the event handler for any other upstream failure.
pub const FALLBACK_APOLOGY: &str =
    "申し訳ありません。現在応答できません。しばらくして再度お試しください。";

/// One system-prompt + user-text exchange. `prior_text` is the sender's
/// previous message, folded in as an earlier user turn when present.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_text: String,
    pub prior_text: Option<String>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_text: user_text.into(),
            prior_text: None,
        }
    }

    pub fn with_prior_text(mut self, prior_text: Option<String>) -> Self {
        self.prior_text = prior_text;
        self
    }
}

/// A function-call output contract for structured completions: the model is
/// forced to call `name` with arguments matching `parameters`.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

pub struct CompletionClient {
    api_key: String,
    model: String,
    base_url: String,
    retry_delay: Duration,
    client: Client,
}

impl CompletionClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, API_URL.to_string())
    }

    /// Construct with an explicit endpoint URL. Used by tests to point the
    /// client at a mock server.
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            retry_delay: RETRY_DELAY,
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Override the throttle delay. Seam for tests — real 2-second waits
    /// would make the retry suite crawl.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn build_messages(req: &CompletionRequest) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "content": req.system_prompt})];
        if let Some(prior) = &req.prior_text {
            messages.push(json!({"role": "user", "content": prior}));
        }
        messages.push(json!({"role": "user", "content": req.user_text}));
        messages
    }

    async fn post(&self, payload: &Value) -> RenobotResult<Value> {
        let resp = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| RenobotError::Upstream {
                message: format!("failed to reach completion API: {}", e),
                retryable: true,
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            warn!("completion API rate limited (retry-after: {:?})", retry_after);
            return Err(RenobotError::RateLimit { retry_after });
        }

        if !status.is_success() {
            let retryable = matches!(status.as_u16(), 500 | 502 | 503);
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RenobotError::Upstream {
                message: format!("API error ({}): {}", status.as_u16(), error_text),
                retryable,
            });
        }

        resp.json().await.map_err(|e| RenobotError::Upstream {
            message: format!("failed to parse completion API response: {}", e),
            retryable: false,
        })
    }

    fn first_message(json: &Value) -> RenobotResult<&Value> {
        json["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .map(|choice| &choice["message"])
            .ok_or_else(|| RenobotError::Upstream {
                message: "no choices in completion response".to_string(),
                retryable: false,
            })
    }

    /// Issue a single completion call and return the assistant's text.
    pub async fn complete(&self, req: &CompletionRequest) -> RenobotResult<String> {
        let payload = json!({
            "model": self.model,
            "messages": Self::build_messages(req),
            "temperature": 0.7,
        });

        let json = self.post(&payload).await?;
        let content = Self::first_message(&json)?["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RenobotError::Upstream {
                message: "completion response has no content".to_string(),
                retryable: false,
            })?;

        debug!("completion returned {} chars", content.len());
        Ok(content)
    }

    /// Like [`complete`](Self::complete), but retries throttled calls with a
    /// fixed delay, up to [`MAX_RETRIES`] extra attempts. Once the budget is
    /// spent the apology text is returned instead of the error, so a
    /// persistently throttled upstream never takes down the whole reply.
    /// Non-throttling errors propagate immediately.
    pub async fn complete_with_retry(&self, req: &CompletionRequest) -> RenobotResult<String> {
        let mut attempt = 0;
        loop {
            match self.complete(req).await {
                Ok(text) => return Ok(text),
                Err(RenobotError::RateLimit { .. }) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(
                        "completion throttled, retrying (attempt {}/{})",
                        attempt, MAX_RETRIES
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(RenobotError::RateLimit { .. }) => {
                    warn!("completion throttled after {} retries, giving up", attempt);
                    return Ok(FALLBACK_APOLOGY.to_string());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issue a completion call that forces a function call and return the raw
    /// `function_call.arguments` string. The caller owns parsing.
    pub async fn complete_structured(
        &self,
        req: &CompletionRequest,
        function: &FunctionSpec,
    ) -> RenobotResult<String> {
        let payload = json!({
            "model": self.model,
            "messages": Self::build_messages(req),
            "temperature": 0.7,
            "functions": [{
                "name": function.name,
                "description": function.description,
                "parameters": function.parameters,
            }],
            "function_call": {"name": function.name},
        });

        let json = self.post(&payload).await?;
        Self::first_message(&json)?["function_call"]["arguments"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| RenobotError::Upstream {
                message: "completion response has no function_call arguments".to_string(),
                retryable: false,
            })
    }
}
