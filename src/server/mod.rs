use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::card::{ReplyCard, plain_text_message, quick_reply_block};
use crate::completion::{CompletionClient, CompletionRequest, FALLBACK_APOLOGY};
use crate::config::Config;
use crate::errors::RenobotResult;
use crate::keyword::extract_keyword;
use crate::line::{
    IncomingMessage, LineClient, ReplyHandle, WebhookEvent, WebhookRequest, validate_signature,
};
use crate::links::build_links;
use crate::memory::ConversationMemory;
use crate::suggest::{SuggestionEngine, starter_suggestions};

/// Max webhook payload size: 1 MB.
const WEBHOOK_MAX_BODY: usize = 1_048_576;

/// Used when the sender's profile can't be fetched.
const DEFAULT_USER_NAME: &str = "お客様";

pub const SYSTEM_PROMPT: &str = "あなたはDIYと住宅リフォームの専門アシスタントです。\
会話は親切かつ冷静に。専門外の話題には対応せず、専門分野へ誘導してください。\
商品の種類を勧めるときは商品名を「」で囲んで示してください。";

const WELCOME_TEXT: &str =
    "友だち追加ありがとうございます！DIYや住宅リフォームのご質問をお気軽にどうぞ。";

/// Shared state behind the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    line: Arc<LineClient>,
    completion: Arc<CompletionClient>,
    suggestions: Arc<SuggestionEngine>,
    memory: Arc<ConversationMemory>,
    channel_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        line: Arc<LineClient>,
        completion: Arc<CompletionClient>,
        suggestions: Arc<SuggestionEngine>,
        memory: Arc<ConversationMemory>,
        channel_secret: &str,
    ) -> Self {
        Self {
            line,
            completion,
            suggestions,
            memory,
            channel_secret: channel_secret.into(),
        }
    }
}

/// Build the webhook router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// GET /health — health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// POST /webhook — receive a batch of LINE events.
///
/// The body is taken raw so the signature can be verified before parsing.
/// Once the signature checks out the delivery is always acknowledged with
/// 200, whatever happens to the individual events — the platform would
/// otherwise redeliver the whole batch.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > WEBHOOK_MAX_BODY {
        warn!("webhook payload too large ({} bytes)", body.len());
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok());
    let Some(signature) = signature else {
        warn!("webhook delivery missing signature header");
        return StatusCode::FORBIDDEN.into_response();
    };

    if !validate_signature(&state.channel_secret, signature, &body) {
        warn!("webhook delivery with invalid signature");
        return StatusCode::FORBIDDEN.into_response();
    }

    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            // Signed but unparseable — acknowledge anyway, redelivery won't help.
            warn!("ignoring unparseable webhook body: {}", e);
            return StatusCode::OK.into_response();
        }
    };

    debug!("webhook delivery with {} event(s)", request.events.len());

    // Events are independent; no ordering guarantee between senders.
    join_all(
        request
            .events
            .into_iter()
            .map(|event| handle_event(&state, event)),
    )
    .await;

    StatusCode::OK.into_response()
}

/// Dispatch one event. Never returns an error: every failure path ends in
/// either an apology reply or a log line.
async fn handle_event(state: &AppState, event: WebhookEvent) {
    match event {
        WebhookEvent::Follow { reply_token, .. } => {
            handle_follow(state, ReplyHandle::new(reply_token)).await;
        }
        other => match IncomingMessage::from_event(other) {
            Some(incoming) => handle_text_message(state, incoming).await,
            None => debug!("ignoring unhandled event type"),
        },
    }
}

/// Greet a new follower with a fixed welcome and starter quick replies.
async fn handle_follow(state: &AppState, handle: ReplyHandle) {
    let mut message = plain_text_message(WELCOME_TEXT);
    message["quickReply"] = quick_reply_block(&starter_suggestions());

    if let Err(e) = state.line.reply(handle, vec![message]).await {
        error!("failed to send welcome reply: {}", e);
    }
}

/// Run the reply pipeline for one text message and send exactly one reply:
/// the assembled card, or the fixed apology if anything went wrong.
async fn handle_text_message(state: &AppState, incoming: IncomingMessage) {
    let IncomingMessage {
        sender_id,
        text,
        reply_handle,
        received_at,
    } = incoming;

    debug!(
        "text message from {} received at {}",
        if sender_id.is_empty() { "<unknown>" } else { &sender_id },
        received_at
    );

    let messages = match run_pipeline(state, &sender_id, &text).await {
        Ok(messages) => messages,
        Err(e) => {
            error!("reply pipeline failed: {}", e);
            vec![plain_text_message(FALLBACK_APOLOGY)]
        }
    };

    // The handle moves here; this is the only send for this event.
    if let Err(e) = state.line.reply(reply_handle, messages).await {
        error!("failed to send reply: {}", e);
    }
}

async fn run_pipeline(
    state: &AppState,
    sender_id: &str,
    text: &str,
) -> RenobotResult<Vec<Value>> {
    let user_name = lookup_user_name(state, sender_id).await;

    let prior_text = state.memory.recall(sender_id);
    let request = CompletionRequest::new(SYSTEM_PROMPT, text).with_prior_text(prior_text);
    let answer = state.completion.complete_with_retry(&request).await?;

    // The retry loop already degraded to the apology; nothing to decorate.
    if answer == FALLBACK_APOLOGY {
        return Ok(vec![plain_text_message(FALLBACK_APOLOGY)]);
    }

    // Suggestions only need the user text, so they run while the keyword
    // and links are derived from the answer.
    let (quick_replies, links) = tokio::join!(state.suggestions.suggest(text), async {
        let keyword = extract_keyword(&answer, text);
        debug!("extracted keyword: {}", keyword);
        build_links(&keyword)
    });

    state.memory.remember(sender_id, text);

    let body_text = format!(
        "{}さん、ありがとうございます。以下の情報をご覧ください：\n\n{}",
        user_name, answer
    );
    let card = ReplyCard::assemble(body_text, links, quick_replies);
    Ok(vec![card.to_line_message()])
}

/// Best-effort display-name lookup; failures fall back to the default name.
async fn lookup_user_name(state: &AppState, sender_id: &str) -> String {
    if sender_id.is_empty() {
        return DEFAULT_USER_NAME.to_string();
    }
    match state.line.get_profile(sender_id).await {
        Ok(profile) if !profile.display_name.trim().is_empty() => profile.display_name,
        Ok(_) => DEFAULT_USER_NAME.to_string(),
        Err(e) => {
            debug!("profile lookup failed for {}: {}", sender_id, e);
            DEFAULT_USER_NAME.to_string()
        }
    }
}

/// Wire up clients from config and serve the webhook until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let line = Arc::new(LineClient::new(config.line_access_token.clone()));
    let completion = Arc::new(CompletionClient::new(
        config.openai_api_key.clone(),
        config.model.clone(),
    ));
    let suggestions = Arc::new(SuggestionEngine::new(completion.clone(), SYSTEM_PROMPT));
    let memory = Arc::new(ConversationMemory::new());

    let state = AppState::new(
        line,
        completion,
        suggestions,
        memory,
        &config.line_channel_secret,
    );

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("webhook listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests;
