use crate::errors::{RenobotError, RenobotResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.line.me";
const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One webhook delivery: a batch of events.
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// Webhook event, discriminated on `type`. Only text messages and follows
/// are acted on; everything else (stickers, images, unfollows, ...) lands in
/// `Other` and is ignored silently.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookEvent {
    #[serde(rename_all = "camelCase")]
    Message {
        reply_token: String,
        #[serde(default)]
        source: EventSource,
        message: MessageContent,
        #[serde(default)]
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    Follow {
        reply_token: String,
        #[serde(default)]
        source: EventSource,
        #[serde(default)]
        timestamp: i64,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Single-use reply token. Deliberately not `Clone`: `LineClient::reply`
/// consumes it, so a second reply to the same event doesn't typecheck.
#[derive(Debug)]
pub struct ReplyHandle(String);

impl ReplyHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn into_token(self) -> String {
        self.0
    }
}

/// An inbound text message, extracted from a webhook event. Consumed exactly
/// once by the reply pipeline.
#[derive(Debug)]
pub struct IncomingMessage {
    pub sender_id: String,
    pub text: String,
    pub reply_handle: ReplyHandle,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// Returns `None` for anything but a text-message event.
    pub fn from_event(event: WebhookEvent) -> Option<Self> {
        match event {
            WebhookEvent::Message {
                reply_token,
                source,
                message: MessageContent::Text { text },
                timestamp,
            } => Some(Self {
                sender_id: source.user_id.unwrap_or_default(),
                text,
                reply_handle: ReplyHandle::new(reply_token),
                received_at: Utc
                    .timestamp_millis_opt(timestamp)
                    .single()
                    .unwrap_or_else(Utc::now),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
}

/// Validate the `x-line-signature` header: base64 of HMAC-SHA256 over the
/// raw request body, keyed by the channel secret.
pub fn validate_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = BASE64.encode(mac.finalize().into_bytes());
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Thin client for the LINE Messaging API reply and profile endpoints.
pub struct LineClient {
    access_token: String,
    base_url: String,
    client: Client,
}

impl LineClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, API_BASE.to_string())
    }

    /// Construct with an explicit API base URL. Used by tests to point the
    /// client at a mock server.
    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            base_url,
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Send the reply for one event. Consumes the handle; reply tokens are
    /// single-use and a failed reply is final, never retried.
    pub async fn reply(&self, handle: ReplyHandle, messages: Vec<Value>) -> RenobotResult<()> {
        let payload = json!({
            "replyToken": handle.into_token(),
            "messages": messages,
        });

        let resp = self
            .client
            .post(format!("{}/v2/bot/message/reply", self.base_url))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| RenobotError::Upstream {
                message: format!("failed to reach LINE reply API: {}", e),
                retryable: false,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RenobotError::Upstream {
                message: format!("LINE reply failed ({}): {}", status.as_u16(), error_text),
                retryable: false,
            });
        }

        debug!("reply delivered");
        Ok(())
    }

    /// Fetch a sender's display name. Callers treat failure as best-effort
    /// and fall back to a default name.
    pub async fn get_profile(&self, user_id: &str) -> RenobotResult<Profile> {
        let resp = self
            .client
            .get(format!("{}/v2/bot/profile/{}", self.base_url, user_id))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| RenobotError::Profile(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RenobotError::Profile(format!(
                "status {} for user {}",
                status.as_u16(),
                user_id
            )));
        }

        resp.json::<Profile>()
            .await
            .map_err(|e| RenobotError::Profile(format!("bad profile body: {}", e)))
    }
}
