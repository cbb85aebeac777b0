use crate::card::{MAX_QUICK_REPLIES, QuickReplyOption};
use crate::completion::{CompletionClient, CompletionRequest, FunctionSpec};
use crate::errors::{RenobotError, RenobotResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Arguments schema the model is asked to fill in.
#[derive(Debug, Deserialize)]
struct SuggestionPayload {
    suggestions: Vec<String>,
}

fn followup_spec() -> FunctionSpec {
    FunctionSpec {
        name: "propose_followups",
        description: "ユーザーの質問を深掘りする短い追加質問を提案する",
        parameters: json!({
            "type": "object",
            "properties": {
                "suggestions": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "日本語の短い追加質問、最大4件",
                }
            },
            "required": ["suggestions"],
        }),
    }
}

/// Parse a raw `function_call.arguments` string into suggestion texts.
/// Strict: any shape mismatch is a `Parse` error, no free-text salvage.
fn parse_suggestions(raw: &str) -> RenobotResult<Vec<String>> {
    let payload: SuggestionPayload = serde_json::from_str(raw)
        .map_err(|e| RenobotError::Parse(format!("bad suggestion payload: {}", e)))?;
    Ok(payload
        .suggestions
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Generates follow-up quick replies with a second, structured completion
/// call. Failures of any kind degrade to an empty list — the reply card must
/// stay sendable with zero suggestions.
pub struct SuggestionEngine {
    client: Arc<CompletionClient>,
    system_prompt: String,
}

impl SuggestionEngine {
    pub fn new(client: Arc<CompletionClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }

    pub async fn suggest(&self, user_text: &str) -> Vec<QuickReplyOption> {
        let prompt = format!(
            "「{}」という質問に答えた後、より深掘りできる質問を{}件、日本語で短く提案してください。",
            user_text, MAX_QUICK_REPLIES
        );
        let req = CompletionRequest::new(self.system_prompt.clone(), prompt);

        let raw = match self.client.complete_structured(&req, &followup_spec()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("suggestion call failed, sending card without quick replies: {}", e);
                return Vec::new();
            }
        };

        match parse_suggestions(&raw) {
            Ok(texts) => texts
                .into_iter()
                .take(MAX_QUICK_REPLIES)
                .map(QuickReplyOption::new)
                .collect(),
            Err(e) => {
                warn!("discarding malformed suggestions: {}", e);
                Vec::new()
            }
        }
    }
}

/// Curated starter prompts shown to new followers.
pub fn starter_suggestions() -> Vec<QuickReplyOption> {
    [
        "棚のDIYについて知りたい",
        "壁紙の張り替え方は？",
        "おすすめの塗料は？",
        "工具の選び方を教えて",
    ]
    .iter()
    .map(|s| QuickReplyOption::new(*s))
    .collect()
}

#[cfg(test)]
mod tests;
