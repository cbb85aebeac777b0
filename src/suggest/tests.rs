use super::*;
use crate::card::LABEL_MAX_CHARS;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_for(server: &MockServer) -> SuggestionEngine {
    let client = Arc::new(CompletionClient::with_base_url(
        "test_key".to_string(),
        "gpt-4o-mini".to_string(),
        server.uri(),
    ));
    SuggestionEngine::new(client, "あなたはDIYの専門アシスタントです。")
}

fn function_call_body(arguments: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "function_call": {
                    "name": "propose_followups",
                    "arguments": arguments,
                }
            }
        }]
    })
}

#[test]
fn test_parse_valid_payload() {
    let raw = r#"{"suggestions": ["他の色は？", " 費用は？ ", ""]}"#;
    let texts = parse_suggestions(raw).unwrap();
    assert_eq!(texts, vec!["他の色は？", "費用は？"]);
}

#[test]
fn test_parse_invalid_json() {
    let err = parse_suggestions("not json at all").unwrap_err();
    assert!(matches!(err, RenobotError::Parse(_)));
}

#[test]
fn test_parse_wrong_shape() {
    let err = parse_suggestions(r#"{"suggestions": "just one string"}"#).unwrap_err();
    assert!(matches!(err, RenobotError::Parse(_)));
}

#[tokio::test]
async fn test_suggest_happy_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(function_call_body(
            r#"{"suggestions": ["他の色は？", "費用の目安は？"]}"#,
        )))
        .mount(&server)
        .await;

    let options = engine_for(&server).suggest("棚用の塗料を教えて").await;
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].text, "他の色は？");
    assert_eq!(options[0].label, "他の色は？");
}

#[tokio::test]
async fn test_suggest_caps_at_four() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(function_call_body(
            r#"{"suggestions": ["a", "b", "c", "d", "e", "f"]}"#,
        )))
        .mount(&server)
        .await;

    let options = engine_for(&server).suggest("question").await;
    assert_eq!(options.len(), MAX_QUICK_REPLIES);
}

#[tokio::test]
async fn test_suggest_truncates_labels() {
    let long = "壁紙の張り替えにかかる費用の目安を詳しく教えてください";
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(function_call_body(
            &format!(r#"{{"suggestions": ["{}"]}}"#, long),
        )))
        .mount(&server)
        .await;

    let options = engine_for(&server).suggest("question").await;
    assert_eq!(options[0].label.chars().count(), LABEL_MAX_CHARS);
    assert_eq!(options[0].text, long);
}

#[tokio::test]
async fn test_suggest_malformed_arguments_degrades_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(function_call_body("{invalid json")),
        )
        .mount(&server)
        .await;

    let options = engine_for(&server).suggest("question").await;
    assert!(options.is_empty());
}

#[tokio::test]
async fn test_suggest_api_error_degrades_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let options = engine_for(&server).suggest("question").await;
    assert!(options.is_empty());
}

#[test]
fn test_starter_suggestions_bounded() {
    let options = starter_suggestions();
    assert!(!options.is_empty());
    assert!(options.len() <= MAX_QUICK_REPLIES);
    for option in options {
        assert!(option.label.chars().count() <= LABEL_MAX_CHARS);
    }
}
