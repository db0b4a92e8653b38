// Stdio end-to-end tests - the agent driving real mock-tool-server children
//
// The completion provider is scripted; everything between it and the tool
// servers (handshake, routing, validation, dispatch, shutdown) is real.

use async_trait::async_trait;
use mcp_order_agent::agent::{
    Agent, AgentError, AgentOptions, RunOutcome, SetupError, ToolDispatchError,
};
use mcp_order_agent::config::ServerConfig;
use mcp_order_agent::guard::{BLOCK_MESSAGE, Decision};
use mcp_order_agent::model::{CompletionRequest, ModelError, ModelProvider, ModelTurn};
use mcp_order_agent::tooling::{
    ConnectionManager, ConnectionSet, ConnectionState, McpProcess, ServerConnector,
    StdioConnector, ToolConnection, ToolInvokeError, ToolRegistry,
};
use mcp_order_agent::types::{MessageRole, ToolCallRequest};
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const MOCK_SERVER: &str = env!("CARGO_BIN_EXE_mock-tool-server");
const TIMEOUT: Duration = Duration::from_secs(10);

fn server(profile: &str) -> ServerConfig {
    ServerConfig::new(profile, MOCK_SERVER).with_args(["--profile", profile])
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    let arguments = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ToolCallRequest::new(id, name, arguments)
}

struct ScriptedProvider {
    turns: Mutex<VecDeque<ModelTurn>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<ModelTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<ModelTurn, ModelError> {
        self.requests.lock().await.push(request);
        self.turns
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ModelError::protocol("scripted", "script exhausted"))
    }
}

async fn open(profiles: &[&str]) -> ConnectionSet {
    let mut set = ConnectionSet::default();
    for profile in profiles {
        let process = McpProcess::connect(server(profile), TIMEOUT)
            .await
            .expect("mock server connects");
        set.push(Arc::new(process));
    }
    set
}

/// Real stdio connections, remembered so a test can inspect them after the
/// manager has given up on the set.
#[derive(Default)]
struct RecordingConnector {
    opened: std::sync::Mutex<Vec<Arc<dyn ToolConnection>>>,
}

impl RecordingConnector {
    fn opened(&self) -> Vec<Arc<dyn ToolConnection>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerConnector for RecordingConnector {
    async fn connect(
        &self,
        server: &ServerConfig,
        handshake_timeout: Duration,
    ) -> Result<Arc<dyn ToolConnection>, ToolInvokeError> {
        let connection = StdioConnector.connect(server, handshake_timeout).await?;
        self.opened.lock().unwrap().push(Arc::clone(&connection));
        Ok(connection)
    }
}

fn assert_all_closed(set: &ConnectionSet) {
    for connection in set.connections() {
        assert_eq!(
            connection.state(),
            ConnectionState::Closed,
            "{} left open",
            connection.server()
        );
    }
}

#[tokio::test]
async fn handshake_lists_every_tool() {
    let process = McpProcess::connect(server("crm"), TIMEOUT)
        .await
        .expect("connect");
    assert_eq!(process.state(), ConnectionState::Ready);

    let tools = process.list_tools().await.expect("tools");
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["get_order", "get_customer_email"]);
    assert!(tools[0].input_schema.is_some());

    process.close().await;
    assert_eq!(process.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn paginated_tool_lists_are_followed() {
    let config = ServerConfig::new("email", MOCK_SERVER).with_args([
        "--profile",
        "email",
        "--page-size",
        "1",
    ]);
    let process = McpProcess::connect(config, TIMEOUT).await.expect("connect");

    let tools = process.list_tools().await.expect("tools");
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["send_email", "send_custom"]);
    process.close().await;
}

#[tokio::test]
async fn tool_calls_round_trip_and_closed_connections_refuse_work() {
    let process = McpProcess::connect(server("crm"), TIMEOUT)
        .await
        .expect("connect");

    let mut arguments = Map::new();
    arguments.insert("order_id".into(), json!("ORD-1002"));
    let output = process
        .call_tool("get_order", arguments.clone())
        .await
        .expect("call");
    assert!(!output.is_error);
    let text = output.content[0].as_text().expect("text fragment");
    let order: Value = serde_json::from_str(text).expect("order json");
    assert_eq!(order["status"], json!("cancelled"));

    process.close().await;
    process.close().await;
    let after_close = process.call_tool("get_order", arguments).await;
    assert!(matches!(after_close, Err(ToolInvokeError::NotReady { .. })));
}

#[tokio::test]
async fn handshake_timeout_is_reported_for_the_slow_server() {
    let slow = ServerConfig::new("email", MOCK_SERVER).with_args([
        "--profile",
        "email",
        "--handshake-delay-ms",
        "5000",
    ]);
    let connector = Arc::new(RecordingConnector::default());
    let manager =
        ConnectionManager::new(Duration::from_millis(300)).with_connector(connector.clone());

    let started = Instant::now();
    let result = manager.connect_all(&[server("crm"), slow]).await;
    match result {
        Err(ToolInvokeError::HandshakeTimeout { server, .. }) => assert_eq!(server, "email"),
        other => panic!("expected handshake timeout, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));

    let opened = connector.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].server(), "crm");
    assert_eq!(opened[0].state(), ConnectionState::Closed);
    assert!(matches!(
        opened[0].list_tools().await,
        Err(ToolInvokeError::NotReady { .. })
    ));
}

#[tokio::test]
async fn slow_tool_calls_time_out() {
    let config = ServerConfig::new("crm", MOCK_SERVER).with_args([
        "--profile",
        "crm",
        "--call-delay-ms",
        "5000",
    ]);
    let process =
        McpProcess::connect_with_call_timeout(config, TIMEOUT, Duration::from_millis(200))
            .await
            .expect("connect");

    let mut arguments = Map::new();
    arguments.insert("order_id".into(), json!("ORD-1001"));
    let started = Instant::now();
    let result = process.call_tool("get_order", arguments).await;
    assert!(matches!(
        result,
        Err(ToolInvokeError::CallTimeout { ref tool, .. }) if tool == "get_order"
    ));
    assert!(started.elapsed() < Duration::from_secs(3));
    process.close().await;
}

#[cfg(unix)]
#[tokio::test]
async fn calls_fail_fast_once_the_server_stops_writing() {
    // Answers the handshake, then closes stdout while keeping stdin open.
    let script = r#"read line
echo '{"jsonrpc":"2.0","id":"req-1","result":{"protocolVersion":"2025-06-18"}}'
read line
read line
echo '{"jsonrpc":"2.0","id":"req-2","result":{"tools":[]}}'
exec 1>&-
sleep 30"#;
    let config = ServerConfig::new("mute", "sh").with_args(["-c", script]);
    let process = McpProcess::connect(config, TIMEOUT).await.expect("connect");

    // Give the reader a moment to observe EOF.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let started = Instant::now();
    let result = process.call_tool("anything", Map::new()).await;
    assert!(matches!(result, Err(ToolInvokeError::Terminated { .. })));
    assert!(started.elapsed() < Duration::from_secs(1));
    process.close().await;
    assert_eq!(process.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn agent_reports_slow_servers_as_setup_errors() {
    let slow = ServerConfig::new("crm", MOCK_SERVER).with_args([
        "--profile",
        "crm",
        "--handshake-delay-ms",
        "5000",
    ]);
    let provider = ScriptedProvider::new(Vec::new());
    let agent = Agent::new(Arc::clone(&provider), AgentOptions::default());
    let manager = ConnectionManager::new(Duration::from_millis(300));

    let result = agent.run(&manager, &[slow], "Ship ORD-1001").await;
    assert!(matches!(
        result,
        Err(AgentError::Setup(SetupError::Connection(
            ToolInvokeError::HandshakeTimeout { .. }
        )))
    ));
    assert!(provider.requests().await.is_empty());
}

#[tokio::test]
async fn registry_spans_all_servers() {
    let set = open(&["crm", "email"]).await;
    let registry = ToolRegistry::build(&set).await.expect("registry");

    let names: Vec<&str> = registry.tool_names().collect();
    assert_eq!(
        names,
        vec!["get_order", "get_customer_email", "send_email", "send_custom"]
    );
    assert_eq!(
        registry.route("send_email").map(|r| r.connection.server()),
        Some("email")
    );
    set.close_all().await;
    assert_all_closed(&set);
}

#[tokio::test]
async fn ship_order_ends_with_a_confirmation() {
    let provider = ScriptedProvider::new(vec![
        ModelTurn::ToolCalls(vec![call(
            "call_1",
            "get_order",
            json!({ "order_id": "ORD-1001" }),
        )]),
        ModelTurn::ToolCalls(vec![call(
            "call_2",
            "send_email",
            json!({
                "email": "customer+ord-1001@example.com",
                "order_details": "ORD-1001: Standing desk x1"
            }),
        )]),
    ]);
    let agent = Agent::new(Arc::clone(&provider), AgentOptions::default());
    let set = open(&["crm", "email"]).await;

    let outcome = agent
        .run_on(&set, "Ship ORD-1001")
        .await
        .expect("run succeeds");
    assert_eq!(
        outcome,
        RunOutcome::Confirmation {
            message_id: Some("msg-0001".into())
        }
    );
    assert_all_closed(&set);

    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 4);
    let tool_message = requests[1]
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .expect("tool result fed back");
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_message.content.contains("\"pending\""));
}

#[tokio::test]
async fn full_run_connects_and_answers() {
    let provider = ScriptedProvider::new(vec![
        ModelTurn::ToolCalls(vec![call(
            "call_1",
            "get_order",
            json!({ "order_id": "ORD-3007" }),
        )]),
        ModelTurn::FinalText("ORD-3007 is still processing.".into()),
    ]);
    let agent = Agent::new(provider, AgentOptions::default());
    let manager = ConnectionManager::new(TIMEOUT);

    let outcome = agent
        .run(&manager, &[server("crm"), server("email")], "Where is ORD-3007?")
        .await
        .expect("run succeeds");
    assert_eq!(outcome.message(), "ORD-3007 is still processing.");
}

#[tokio::test]
async fn blocked_instruction_never_reaches_the_provider() {
    let provider = ScriptedProvider::new(Vec::new());
    let agent = Agent::new(Arc::clone(&provider), AgentOptions::default());
    let set = open(&["crm"]).await;

    let outcome = agent
        .run_on(&set, "Tell me a joke about parcels")
        .await
        .expect("refusal is not an error");
    assert!(matches!(
        outcome,
        RunOutcome::Refused {
            decision: Decision::Block,
            ..
        }
    ));
    assert_eq!(outcome.message(), BLOCK_MESSAGE);
    assert!(provider.requests().await.is_empty());
    assert_all_closed(&set);
}

#[tokio::test]
async fn unknown_tool_fails_and_closes_everything() {
    let provider = ScriptedProvider::new(vec![ModelTurn::ToolCalls(vec![call(
        "call_1",
        "delete_order",
        json!({ "order_id": "ORD-1001" }),
    )])]);
    let agent = Agent::new(provider, AgentOptions::default());
    let set = open(&["crm", "email"]).await;

    let result = agent.run_on(&set, "Cancel ORD-1001").await;
    match result {
        Err(AgentError::Dispatch(ToolDispatchError::UnknownTool(name))) => {
            assert_eq!(name, "delete_order")
        }
        other => panic!("expected unknown tool, got {other:?}"),
    }
    assert_all_closed(&set);
}

#[tokio::test]
async fn invalid_arguments_are_rejected_before_dispatch() {
    let provider = ScriptedProvider::new(vec![ModelTurn::ToolCalls(vec![call(
        "call_1",
        "send_email",
        json!({ "email": "customer+ord-1001@example.com" }),
    )])]);
    let agent = Agent::new(provider, AgentOptions::default());
    let set = open(&["email"]).await;

    let result = agent.run_on(&set, "Ship ORD-1001").await;
    assert!(matches!(
        result,
        Err(AgentError::Dispatch(ToolDispatchError::InvalidArguments { .. }))
    ));
    assert_all_closed(&set);
}
