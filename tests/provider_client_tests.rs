// Provider client tests - OpenAIClient against an in-process HTTP mock
//
// The mock records every request so the wire shape, path and bearer header
// can be asserted for both protocol shapes.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::routing::post;
use axum::{Json, Router};
use mcp_order_agent::model::clients::{HttpClientBase, OpenAIClient, PROVIDER_ID};
use mcp_order_agent::model::{
    CompletionRequest, ModelError, ModelProvider, ModelTurn, ProtocolShape,
};
use mcp_order_agent::types::{ChatMessage, FunctionSpec, ToolCallRequest};
use serde_json::{Map, Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct MockState {
    reply: Arc<(StatusCode, Value)>,
    captured: Arc<Mutex<Vec<Captured>>>,
}

async fn record(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.captured.lock().await.push(Captured {
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    });
    let (status, reply) = state.reply.as_ref();
    (*status, Json(reply.clone()))
}

async fn spawn_mock(status: StatusCode, reply: Value) -> (SocketAddr, Arc<Mutex<Vec<Captured>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        reply: Arc::new((status, reply)),
        captured: Arc::clone(&captured),
    };
    let app = Router::new()
        .route("/v1/responses", post(record))
        .route("/v1/chat/completions", post(record))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, captured)
}

fn client(addr: SocketAddr, shape: ProtocolShape, api_key: Option<&str>) -> OpenAIClient {
    OpenAIClient::new(
        HttpClientBase::new(
            PROVIDER_ID.to_string(),
            format!("http://{addr}/v1"),
            api_key.map(str::to_string),
        ),
        "gpt-test",
        shape,
    )
}

fn order_request() -> CompletionRequest {
    let mut arguments = Map::new();
    arguments.insert("order_id".into(), json!("ORD-1001"));
    CompletionRequest::new(vec![
        ChatMessage::system("You are a helpful Logistics Assistant."),
        ChatMessage::user("Instruction: Ship ORD-1001"),
        ChatMessage::assistant(
            String::new(),
            vec![ToolCallRequest::new("call_1", "get_order", arguments)],
        ),
        ChatMessage::tool("call_1", "get_order", r#"{"status":"pending"}"#),
    ])
    .with_tools(vec![FunctionSpec {
        name: "get_order".into(),
        description: "Look up an order".into(),
        parameters: json!({ "type": "object", "properties": {} }),
    }])
}

#[tokio::test]
async fn responses_shape_round_trip() {
    let (addr, captured) = spawn_mock(
        StatusCode::OK,
        json!({
            "output": [
                { "type": "reasoning", "summary": [] },
                {
                    "type": "function_call",
                    "call_id": "call_2",
                    "name": "send_email",
                    "arguments": "{\"email\":\"a@example.com\",\"order_details\":\"ORD-1001\"}"
                }
            ]
        }),
    )
    .await;

    let turn = client(addr, ProtocolShape::Responses, Some("sk-test"))
        .complete(order_request())
        .await
        .expect("completion");

    let ModelTurn::ToolCalls(calls) = turn else {
        panic!("expected tool calls");
    };
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_2");
    assert_eq!(calls[0].name, "send_email");
    assert_eq!(calls[0].arguments["email"], json!("a@example.com"));

    let captured = captured.lock().await;
    assert_eq!(captured.len(), 1);
    let request = &captured[0];
    assert_eq!(request.path, "/v1/responses");
    assert_eq!(request.authorization.as_deref(), Some("Bearer sk-test"));
    assert_eq!(request.body["model"], json!("gpt-test"));

    let input = request.body["input"].as_array().expect("input array");
    assert_eq!(input[0]["role"], json!("system"));
    assert_eq!(input[1]["content"], json!("Instruction: Ship ORD-1001"));
    assert_eq!(input[2]["type"], json!("function_call"));
    assert_eq!(input[2]["call_id"], json!("call_1"));
    assert_eq!(input[3]["type"], json!("function_call_output"));
    assert_eq!(input[3]["call_id"], json!("call_1"));
    assert_eq!(request.body["tools"][0]["name"], json!("get_order"));
}

#[tokio::test]
async fn chat_completions_shape_round_trip() {
    let (addr, captured) = spawn_mock(
        StatusCode::OK,
        json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Order ORD-1001 is pending."
                }
            }]
        }),
    )
    .await;

    let turn = client(addr, ProtocolShape::ChatCompletions, Some("sk-local"))
        .complete(order_request())
        .await
        .expect("completion");
    assert_eq!(turn, ModelTurn::FinalText("Order ORD-1001 is pending.".into()));

    let captured = captured.lock().await;
    let request = &captured[0];
    assert_eq!(request.path, "/v1/chat/completions");
    assert_eq!(request.authorization.as_deref(), Some("Bearer sk-local"));

    let messages = request.body["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["tool_calls"][0]["id"], json!("call_1"));
    assert_eq!(
        messages[2]["tool_calls"][0]["function"]["name"],
        json!("get_order")
    );
    assert_eq!(messages[3]["role"], json!("tool"));
    assert_eq!(messages[3]["tool_call_id"], json!("call_1"));
    assert_eq!(
        request.body["tools"][0]["function"]["name"],
        json!("get_order")
    );
}

#[tokio::test]
async fn http_error_status_is_a_network_error() {
    let (addr, _) = spawn_mock(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "message": "boom" } }),
    )
    .await;

    let result = client(addr, ProtocolShape::ChatCompletions, Some("sk-test"))
        .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
        .await;
    assert!(matches!(result, Err(ModelError::Network { .. })));
}

#[tokio::test]
async fn malformed_body_is_a_protocol_error() {
    let (addr, _) = spawn_mock(StatusCode::OK, json!({ "unexpected": true })).await;

    let result = client(addr, ProtocolShape::Responses, Some("sk-test"))
        .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
        .await;
    assert!(matches!(result, Err(ModelError::Protocol { .. })));
}

#[tokio::test]
async fn non_json_success_body_is_a_protocol_error() {
    let app = Router::new().route(
        "/v1/responses",
        post(|| async {
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html")],
                "<html>gateway says hi</html>",
            )
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let result = client(addr, ProtocolShape::Responses, Some("sk-test"))
        .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
        .await;
    match result {
        Err(ModelError::Protocol { provider, .. }) => assert_eq!(provider, PROVIDER_ID),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_key_fails_before_any_request() {
    let (addr, captured) = spawn_mock(StatusCode::OK, json!({ "output_text": "hi" })).await;

    let result = client(addr, ProtocolShape::Responses, None)
        .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
        .await;
    assert!(matches!(result, Err(ModelError::MissingApiKey { .. })));
    assert!(captured.lock().await.is_empty());
}
