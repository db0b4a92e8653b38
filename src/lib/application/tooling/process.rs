use super::error::ToolInvokeError;
use super::interface::{ToolConnection, ToolOutput};
use super::state::{ConnectionState, StateCell};
use crate::config::ServerConfig;
use crate::constants::{PROTOCOL_VERSION, SHUTDOWN_GRACE, TOOL_CALL_TIMEOUT};
use crate::types::ToolSpec;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A tool server child process spoken to over newline-delimited JSON-RPC.
pub struct McpProcess {
    inner: Arc<McpProcessInner>,
}

struct McpProcessInner {
    server: ServerConfig,
    state: StateCell,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<String, oneshot::Sender<Result<Value, ToolInvokeError>>>>,
    id_counter: AtomicU64,
    tools: OnceLock<Vec<ToolSpec>>,
    call_timeout: Duration,
    /// Set once the reader sees EOF; no response can arrive after that.
    output_closed: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<ToolSpec>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

impl McpProcess {
    /// Launch the server and run the handshake, bounded by `handshake_timeout`.
    ///
    /// On any failure the child is shut down before the error is returned.
    pub async fn connect(
        server: ServerConfig,
        handshake_timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        Self::connect_with_call_timeout(server, handshake_timeout, TOOL_CALL_TIMEOUT).await
    }

    /// Like [`McpProcess::connect`], with an explicit bound for each `tools/call`.
    pub async fn connect_with_call_timeout(
        server: ServerConfig,
        handshake_timeout: Duration,
        call_timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        let process = Self::spawn(server, call_timeout)?;
        let inner = Arc::clone(&process.inner);

        match timeout(handshake_timeout, inner.initialize_sequence()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                process.close().await;
                return Err(err);
            }
            Err(_) => {
                process.close().await;
                return Err(ToolInvokeError::HandshakeTimeout {
                    server: inner.server.name.clone(),
                    after: handshake_timeout,
                });
            }
        }

        inner
            .state
            .transition(ConnectionState::Ready)
            .map_err(|from| ToolInvokeError::InvalidTransition {
                server: inner.server.name.clone(),
                from,
                to: ConnectionState::Ready,
            })?;
        info!(
            server = %inner.server.name,
            tools = inner.tools.get().map(Vec::len).unwrap_or(0),
            "Tool server ready"
        );
        Ok(process)
    }

    fn spawn(server: ServerConfig, call_timeout: Duration) -> Result<Self, ToolInvokeError> {
        let mut command = Command::new(&server.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &server.workdir {
            command.current_dir(dir);
        }
        if !server.args.is_empty() {
            command.args(&server.args);
        }
        for (key, value) in &server.env {
            command.env(key, value);
        }

        debug!(
            server = %server.name,
            command = %server.command.display(),
            args = ?server.args,
            "Launching tool server"
        );
        let mut child = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: server.name.clone(),
            source,
        })?;

        let transport_error = |message: &str| ToolInvokeError::Transport {
            server: server.name.clone(),
            message: message.to_string(),
        };
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| transport_error("failed to capture server stdout"))?;

        let inner = Arc::new(McpProcessInner {
            server,
            state: StateCell::new(),
            child: AsyncMutex::new(Some(child)),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            tools: OnceLock::new(),
            call_timeout,
            output_closed: AtomicBool::new(false),
        });

        // The reader only holds a weak handle so dropping the process drops
        // the child, which is killed on drop and ends the read loop.
        let reader = Arc::downgrade(&inner);
        tokio::spawn(reader_loop(reader, stdout));

        Ok(Self { inner })
    }
}

#[async_trait]
impl ToolConnection for McpProcess {
    fn server(&self) -> &str {
        &self.inner.server.name
    }

    fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolInvokeError> {
        self.inner.ensure_ready()?;
        Ok(self.inner.tools.get().cloned().unwrap_or_default())
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolInvokeError> {
        self.inner.ensure_ready()?;
        let params = json!({
            "name": tool,
            "arguments": Value::Object(arguments),
        });
        let call = self.inner.send_request("tools/call", params);
        let result = match timeout(self.inner.call_timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(server = %self.inner.server.name, tool, "Tool call timed out");
                return Err(ToolInvokeError::CallTimeout {
                    server: self.inner.server.name.clone(),
                    tool: tool.to_string(),
                    after: self.inner.call_timeout,
                });
            }
        };
        Ok(ToolOutput::from_result(&result))
    }

    async fn close(&self) {
        self.inner.shutdown().await;
    }
}

impl McpProcessInner {
    fn ensure_ready(&self) -> Result<(), ToolInvokeError> {
        match self.state.get() {
            ConnectionState::Ready => Ok(()),
            state => Err(ToolInvokeError::NotReady {
                server: self.server.name.clone(),
                state,
            }),
        }
    }

    async fn initialize_sequence(&self) -> Result<(), ToolInvokeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        let init_result = self.send_request("initialize", params).await?;
        let remote = init_result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let protocol = init_result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!(
            server = %self.server.name,
            remote,
            protocol,
            "Tool server initialized"
        );
        self.send_notification("notifications/initialized", json!({}))
            .await?;

        let tools = self.fetch_tools().await?;
        // Only the handshake populates the catalogue, so a second set is
        // impossible; ignore it rather than fail the connection.
        let _ = self.tools.set(tools);
        Ok(())
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolSpec>, ToolInvokeError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.send_request("tools/list", params).await?;
            let page: ToolsPage =
                serde_json::from_value(result).map_err(|source| ToolInvokeError::InvalidJson {
                    server: self.server.name.clone(),
                    source,
                })?;
            tools.extend(page.tools);
            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tools)
    }

    async fn process_inbound_message(&self, value: Value) -> Result<(), ToolInvokeError> {
        if let Some(id) = value.get("id").cloned() {
            if value.get("method").is_some() {
                self.handle_server_request(id, value).await
            } else {
                self.handle_response(id, value).await;
                Ok(())
            }
        } else {
            if let Some(method) = value.get("method").and_then(Value::as_str) {
                self.handle_notification(method);
            }
            Ok(())
        }
    }

    async fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else {
            return;
        };

        let responder = {
            let mut pending = self.pending.lock().await;
            pending.remove(&key)
        };

        let Some(sender) = responder else {
            debug!(
                server = %self.server.name,
                response_id = key.as_str(),
                "received response for unknown request"
            );
            return;
        };

        let outcome = match value.get("error") {
            Some(error) => Err(ToolInvokeError::Rpc {
                server: self.server.name.clone(),
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            }),
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = sender.send(outcome);
    }

    async fn handle_server_request(&self, id: Value, value: Value) -> Result<(), ToolInvokeError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(
                    server = %self.server.name,
                    method = other,
                    "server sent unsupported request"
                );
                let error = json!({
                    "code": -32601,
                    "message": format!("client does not implement method '{other}'"),
                });
                self.send_error(id, error).await
            }
        }
    }

    fn handle_notification(&self, method: &str) {
        if method == "notifications/tools/list_changed" {
            debug!(
                server = %self.server.name,
                "ignoring tool list change; catalogue is fixed for the run"
            );
        } else {
            debug!(
                server = %self.server.name,
                method,
                "received notification from server"
            );
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if self.output_closed.load(Ordering::SeqCst) {
                return Err(ToolInvokeError::Terminated {
                    server: self.server.name.clone(),
                });
            }
            pending.insert(id.clone(), tx);
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolInvokeError::Cancelled {
                server: self.server.name.clone(),
            }),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        });
        self.write_message(&payload).await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let mut encoded =
            serde_json::to_string(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.name.clone(),
                source,
            })?;
        encoded.push('\n');

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| self.transport_error("writer closed"))?;
        stream
            .write_all(encoded.as_bytes())
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        Ok(())
    }

    async fn shutdown(&self) {
        if let Err(state) = self.state.transition(ConnectionState::Closing) {
            debug!(server = %self.server.name, %state, "close requested on shut-down connection");
            return;
        }

        // Dropping stdin is the polite stop signal for stdio servers.
        self.writer.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            match timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(server = %self.server.name, %status, "Tool server exited")
                }
                Ok(Err(err)) => {
                    warn!(server = %self.server.name, %err, "failed to wait for tool server")
                }
                Err(_) => {
                    debug!(server = %self.server.name, "Tool server ignored stdin close; killing");
                    if let Err(err) = child.kill().await {
                        debug!(
                            server = %self.server.name,
                            %err,
                            "failed to kill tool server process (may have already exited)"
                        );
                    }
                }
            }
        }

        self.fail_all_pending().await;
        if let Err(from) = self.state.transition(ConnectionState::Closed) {
            warn!(server = %self.server.name, %from, "unexpected state while closing");
        }
        info!(server = %self.server.name, "Tool server connection closed");
    }

    /// Called by the reader on EOF. Taking the pending lock first means no
    /// request can slip in between the flag and the drain.
    async fn mark_output_closed(&self) {
        let mut pending = self.pending.lock().await;
        self.output_closed.store(true, Ordering::SeqCst);
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ToolInvokeError::Terminated {
                server: self.server.name.clone(),
            }));
        }
    }

    async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ToolInvokeError::Terminated {
                server: self.server.name.clone(),
            }));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.name.clone(),
            message: message.into(),
        }
    }
}

async fn reader_loop(inner: Weak<McpProcessInner>, stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(raw)) = lines.next_line().await {
        let Some(process) = inner.upgrade() else {
            return;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('\u{1b}') {
            debug!(
                server = %process.server.name,
                line = trimmed,
                "skipping non-JSON ANSI log line from tool server"
            );
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                if let Err(err) = process.process_inbound_message(value).await {
                    warn!(
                        server = %process.server.name,
                        %err,
                        "failed to process message from tool server"
                    );
                }
            }
            Err(source) => {
                warn!(
                    server = %process.server.name,
                    line = trimmed,
                    %source,
                    "received invalid JSON from tool server"
                );
            }
        }
    }

    if let Some(process) = inner.upgrade() {
        debug!(server = %process.server.name, "Tool server stdout closed");
        process.mark_output_closed().await;
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}
