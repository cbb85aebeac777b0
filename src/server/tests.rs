use super::*;
use axum::body::Body;
use axum::http::Request;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tower::ServiceExt;

const TEST_SECRET: &str = "test-channel-secret";

fn make_state() -> AppState {
    // Clients pointed at unroutable bases; these tests never reach them.
    let completion = Arc::new(CompletionClient::with_base_url(
        "key".to_string(),
        "gpt-4o-mini".to_string(),
        "http://127.0.0.1:1".to_string(),
    ));
    AppState::new(
        Arc::new(LineClient::with_base_url(
            "token".to_string(),
            "http://127.0.0.1:1".to_string(),
        )),
        completion.clone(),
        Arc::new(SuggestionEngine::new(completion, SYSTEM_PROMPT)),
        Arc::new(ConversationMemory::new()),
        TEST_SECRET,
    )
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_SECRET.as_bytes()).unwrap();
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("Content-Type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-line-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_router(make_state());
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], crate::VERSION);
}

#[tokio::test]
async fn test_missing_signature_forbidden() {
    let app = build_router(make_state());
    let resp = app
        .oneshot(webhook_request(r#"{"events":[]}"#, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_signature_forbidden() {
    let app = build_router(make_state());
    let resp = app
        .oneshot(webhook_request(r#"{"events":[]}"#, Some("bm90LXZhbGlk")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_valid_empty_delivery_acknowledged() {
    let app = build_router(make_state());
    let body = r#"{"events":[]}"#;
    let resp = app
        .oneshot(webhook_request(body, Some(&sign(body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signed_garbage_still_acknowledged() {
    let app = build_router(make_state());
    let body = "this is not json";
    let resp = app
        .oneshot(webhook_request(body, Some(&sign(body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unhandled_event_types_acknowledged() {
    let app = build_router(make_state());
    let body = r#"{"events":[{"type":"unfollow","source":{"userId":"U1"}},{"type":"message","replyToken":"t","source":{"userId":"U1"},"message":{"type":"sticker","packageId":"1","stickerId":"2"}}]}"#;
    let resp = app
        .oneshot(webhook_request(body, Some(&sign(body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = build_router(make_state());
    let body = "x".repeat(WEBHOOK_MAX_BODY + 1);
    let resp = app
        .oneshot(webhook_request(&body, Some(&sign(body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
