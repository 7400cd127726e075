//! Integration test: Gemini client and WhatsApp sender against local axum stand-ins for the
//! remote APIs. Checks the wire shape of both outbound calls and how failures surface.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use lib::agent::{self, Reply, FAILED_REPLY_TEXT};
use lib::channels::WhatsAppChannel;
use lib::llm::{GeminiClient, LlmError, TextGenerator};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorded {
    calls: Arc<Mutex<Vec<(String, HeaderMap, Value)>>>,
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

async fn fake_gemini(
    State(rec): State<Recorded>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    rec.calls.lock().unwrap().push((model_action.clone(), headers, body));
    if model_action.starts_with("broken") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": { "code": 429, "status": "RESOURCE_EXHAUSTED" } })),
        );
    }
    if model_action.starts_with("silent") {
        return (
            StatusCode::OK,
            Json(json!({ "candidates": [{ "finishReason": "SAFETY" }] })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Happy to help!" }] },
                "finishReason": "STOP"
            }]
        })),
    )
}

fn gemini_router(rec: Recorded) -> Router {
    Router::new()
        .route("/v1beta/models/:model_action", post(fake_gemini))
        .with_state(rec)
}

#[tokio::test]
async fn gemini_client_sends_key_and_single_user_turn() {
    let rec = Recorded::default();
    let base = spawn(gemini_router(rec.clone())).await;
    let client = GeminiClient::new(Some(base), "test-key".to_string(), "gemini-1.5-flash".to_string());

    let text = client.generate("Say hi").await.expect("generate");
    assert_eq!(text.as_deref(), Some("Happy to help!"));

    let calls = rec.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (path, headers, body) = &calls[0];
    assert_eq!(path, "gemini-1.5-flash:generateContent");
    assert_eq!(
        headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()),
        Some("test-key")
    );
    assert_eq!(
        body,
        &json!({ "contents": [{ "role": "user", "parts": [{ "text": "Say hi" }] }] })
    );
}

#[tokio::test]
async fn gemini_client_reports_api_errors() {
    let base = spawn(gemini_router(Recorded::default())).await;
    let client = GeminiClient::new(Some(base), "k".to_string(), "broken".to_string());
    match client.generate("hi").await {
        Err(LlmError::Api(msg)) => assert!(msg.contains("429"), "{}", msg),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn gemini_client_without_text_yields_none() {
    let base = spawn(gemini_router(Recorded::default())).await;
    let client = GeminiClient::new(Some(base), "k".to_string(), "silent".to_string());
    assert_eq!(client.generate("hi").await.expect("generate"), None);
}

#[tokio::test]
async fn unreachable_service_becomes_fallback_reply() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    drop(listener);
    let client = GeminiClient::new(
        Some(format!("http://127.0.0.1:{}", port)),
        "k".to_string(),
        "gemini-1.5-flash".to_string(),
    );
    let reply = agent::generate_reply(&client, "Hello").await;
    assert!(matches!(reply, Reply::Fallback(_)));
    assert_eq!(reply.into_text(), FAILED_REPLY_TEXT);
}

async fn fake_graph(
    State(rec): State<Recorded>,
    Path((version, phone)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer good-token");
    rec.calls
        .lock()
        .unwrap()
        .push((format!("{}/{}", version, phone), headers, body));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "message": "Invalid OAuth access token", "code": 190 } })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "messaging_product": "whatsapp",
            "contacts": [{ "input": "16505551234", "wa_id": "16505551234" }],
            "messages": [{ "id": "wamid.sent" }]
        })),
    )
}

fn graph_router(rec: Recorded) -> Router {
    Router::new()
        .route("/:version/:phone/messages", post(fake_graph))
        .with_state(rec)
}

#[tokio::test]
async fn whatsapp_send_posts_text_message_with_bearer_token() {
    let rec = Recorded::default();
    let base = spawn(graph_router(rec.clone())).await;
    let channel = WhatsAppChannel::new(&base, "v18.0", "106540352242922", "good-token".to_string());

    channel
        .send_message("16505551234", "Happy to help!")
        .await
        .expect("send");

    let calls = rec.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (path, _, body) = &calls[0];
    assert_eq!(path, "v18.0/106540352242922");
    assert_eq!(
        body,
        &json!({
            "messaging_product": "whatsapp",
            "to": "16505551234",
            "type": "text",
            "text": { "body": "Happy to help!" }
        })
    );
}

#[tokio::test]
async fn whatsapp_send_surfaces_api_errors() {
    let base = spawn(graph_router(Recorded::default())).await;
    let channel = WhatsAppChannel::new(&base, "v18.0", "106540352242922", "expired".to_string());
    let err = channel
        .send_message("16505551234", "hi")
        .await
        .expect_err("unauthorized send");
    assert!(err.to_string().contains("401"), "{}", err);
}
