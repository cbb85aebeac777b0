use super::*;
use crate::links::build_links;

fn options(labels: &[&str]) -> Vec<QuickReplyOption> {
    labels.iter().map(|s| QuickReplyOption::new(*s)).collect()
}

#[test]
fn test_quick_reply_cap_enforced() {
    let card = ReplyCard::assemble(
        "answer",
        vec![],
        options(&["a", "b", "c", "d", "e", "f"]),
    );
    assert_eq!(card.quick_replies.len(), MAX_QUICK_REPLIES);
    assert_eq!(card.quick_replies[0].text, "a");
    assert_eq!(card.quick_replies[3].text, "d");
}

#[test]
fn test_label_truncated_text_preserved() {
    let long = "壁紙の張り替えにかかる費用の目安を教えてください";
    let option = QuickReplyOption::new(long);
    assert_eq!(option.label.chars().count(), LABEL_MAX_CHARS);
    assert_eq!(option.text, long);
}

#[test]
fn test_short_label_untouched() {
    let option = QuickReplyOption::new("他の色は？");
    assert_eq!(option.label, "他の色は？");
    assert_eq!(option.text, "他の色は？");
}

#[test]
fn test_flex_message_shape() {
    let card = ReplyCard::assemble(
        "「水性塗料」がおすすめです。",
        build_links("水性塗料"),
        options(&["他の色は？"]),
    );
    let message = card.to_line_message();

    assert_eq!(message["type"], "flex");
    assert_eq!(
        message["contents"]["body"]["contents"][0]["text"],
        "「水性塗料」がおすすめです。"
    );

    let buttons = message["contents"]["footer"]["contents"].as_array().unwrap();
    assert_eq!(buttons.len(), 2);
    assert_eq!(buttons[0]["action"]["type"], "uri");
    assert_eq!(buttons[0]["action"]["label"], "Amazonで検索");
    assert!(
        buttons[0]["action"]["uri"]
            .as_str()
            .unwrap()
            .contains("k=%E6%B0%B4%E6%80%A7%E5%A1%97%E6%96%99")
    );

    let items = message["quickReply"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["action"]["text"], "他の色は？");
}

#[test]
fn test_empty_blocks_omitted() {
    let card = ReplyCard::assemble("answer", vec![], vec![]);
    let message = card.to_line_message();
    assert!(message["contents"].get("footer").is_none());
    assert!(message.get("quickReply").is_none());
}

#[test]
fn test_plain_text_message() {
    let message = plain_text_message("こんにちは");
    assert_eq!(message["type"], "text");
    assert_eq!(message["text"], "こんにちは");
}
