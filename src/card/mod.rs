use crate::links::SearchLink;
use serde_json::{Value, json};

/// LINE allows at most 13 quick reply items; the product uses 4.
pub const MAX_QUICK_REPLIES: usize = 4;

/// LINE action labels are capped at 20 characters.
pub const LABEL_MAX_CHARS: usize = 20;

/// A tappable suggested next message. The label is what the user sees
/// (truncated to the platform cap); `text` is the full message echoed back
/// when tapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickReplyOption {
    pub label: String,
    pub text: String,
}

impl QuickReplyOption {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            label: truncate_label(&text),
            text,
        }
    }
}

fn truncate_label(text: &str) -> String {
    text.chars().take(LABEL_MAX_CHARS).collect()
}

/// The terminal artifact of the reply pipeline: answer text, marketplace
/// search buttons, and quick-reply suggestions.
#[derive(Debug, Clone)]
pub struct ReplyCard {
    pub body_text: String,
    pub links: Vec<SearchLink>,
    pub quick_replies: Vec<QuickReplyOption>,
}

impl ReplyCard {
    /// Compose a card from already-validated inputs. Pure; the only rule
    /// enforced here is the quick-reply cap.
    pub fn assemble(
        body_text: impl Into<String>,
        links: Vec<SearchLink>,
        mut quick_replies: Vec<QuickReplyOption>,
    ) -> Self {
        quick_replies.truncate(MAX_QUICK_REPLIES);
        Self {
            body_text: body_text.into(),
            links,
            quick_replies,
        }
    }

    /// Render as a LINE Flex message object, with the footer and quick-reply
    /// blocks omitted when empty.
    pub fn to_line_message(&self) -> Value {
        let mut bubble = json!({
            "type": "bubble",
            "body": {
                "type": "box",
                "layout": "vertical",
                "contents": [{
                    "type": "text",
                    "text": self.body_text,
                    "wrap": true,
                    "size": "sm",
                }],
            },
        });

        if !self.links.is_empty() {
            let buttons: Vec<Value> = self
                .links
                .iter()
                .map(|link| {
                    json!({
                        "type": "button",
                        "style": "primary",
                        "height": "sm",
                        "action": {
                            "type": "uri",
                            "label": link.marketplace.label(),
                            "uri": link.url,
                        },
                    })
                })
                .collect();
            bubble["footer"] = json!({
                "type": "box",
                "layout": "horizontal",
                "spacing": "sm",
                "contents": buttons,
                "flex": 0,
            });
        }

        let mut message = json!({
            "type": "flex",
            "altText": "回答メッセージ",
            "contents": bubble,
        });

        if !self.quick_replies.is_empty() {
            message["quickReply"] = quick_reply_block(&self.quick_replies);
        }

        message
    }
}

/// Render a `quickReply` block for up to [`MAX_QUICK_REPLIES`] options.
pub fn quick_reply_block(options: &[QuickReplyOption]) -> Value {
    let items: Vec<Value> = options
        .iter()
        .take(MAX_QUICK_REPLIES)
        .map(|option| {
            json!({
                "type": "action",
                "action": {
                    "type": "message",
                    "label": option.label,
                    "text": option.text,
                },
            })
        })
        .collect();
    json!({ "items": items })
}

/// A plain-text LINE message, used for the apology and welcome paths.
pub fn plain_text_message(text: &str) -> Value {
    json!({"type": "text", "text": text})
}

#[cfg(test)]
mod tests;
