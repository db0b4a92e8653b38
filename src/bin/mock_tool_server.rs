//! Minimal newline-delimited JSON-RPC tool server used for demos and tests.
//!
//! `--profile crm` serves order lookups, `--profile email` serves the
//! notification tools. All logging goes to stderr; stdout carries protocol
//! frames only.

use clap::{Parser, ValueEnum};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Parser, Debug)]
#[command(name = "mock-tool-server", about = "Demo MCP tool server over stdio")]
struct Args {
    #[arg(long, value_enum)]
    profile: Profile,
    /// Delay before answering `initialize`
    #[arg(long, default_value_t = 0)]
    handshake_delay_ms: u64,
    /// Delay before answering each `tools/call`
    #[arg(long, default_value_t = 0)]
    call_delay_ms: u64,
    /// Tools per `tools/list` page; 0 lists everything at once
    #[arg(long, default_value_t = 0)]
    page_size: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum Profile {
    Crm,
    Email,
}

impl Profile {
    fn name(self) -> &'static str {
        match self {
            Profile::Crm => "crm",
            Profile::Email => "email",
        }
    }
}

struct Order {
    id: &'static str,
    status: &'static str,
    item: &'static str,
    quantity: u32,
}

const ORDERS: &[Order] = &[
    Order {
        id: "ORD-1001",
        status: "pending",
        item: "Standing desk",
        quantity: 1,
    },
    Order {
        id: "ORD-1002",
        status: "cancelled",
        item: "Monitor arm",
        quantity: 2,
    },
    Order {
        id: "ORD-3007",
        status: "processing",
        item: "Ergonomic chair",
        quantity: 1,
    },
];

struct ToolServer {
    profile: Profile,
    handshake_delay: Duration,
    call_delay: Duration,
    page_size: usize,
    sent: u32,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut server = ToolServer {
        profile: args.profile,
        handshake_delay: Duration::from_millis(args.handshake_delay_ms),
        call_delay: Duration::from_millis(args.call_delay_ms),
        page_size: args.page_size,
        sent: 0,
    };
    info!(profile = args.profile.name(), "Tool server started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let message: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Ignoring malformed frame");
                continue;
            }
        };
        if let Some(reply) = server.handle(&message).await {
            write_frame(&mut stdout, &reply).await?;
        }
    }

    info!(profile = args.profile.name(), "stdin closed, exiting");
    Ok(())
}

async fn write_frame(stdout: &mut Stdout, frame: &Value) -> std::io::Result<()> {
    let mut line = frame.to_string();
    line.push('\n');
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await
}

impl ToolServer {
    async fn handle(&mut self, message: &Value) -> Option<Value> {
        let method = message.get("method").and_then(Value::as_str)?;
        let Some(id) = message.get("id").cloned() else {
            debug!(method, "Notification received");
            return None;
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        let outcome = match method {
            "initialize" => {
                if !self.handshake_delay.is_zero() {
                    tokio::time::sleep(self.handshake_delay).await;
                }
                Ok(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": self.profile.name(), "version": "0.1.0" }
                }))
            }
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools(&params)),
            "tools/call" => {
                if !self.call_delay.is_zero() {
                    tokio::time::sleep(self.call_delay).await;
                }
                Ok(self.call_tool(&params))
            }
            other => Err(json!({
                "code": -32601,
                "message": format!("method '{other}' not found")
            })),
        };

        Some(match outcome {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
        })
    }

    fn list_tools(&self, params: &Value) -> Value {
        let tools = self.tools();
        if self.page_size == 0 {
            return json!({ "tools": tools });
        }

        let start = params
            .get("cursor")
            .and_then(Value::as_str)
            .and_then(|cursor| cursor.parse::<usize>().ok())
            .unwrap_or(0);
        let end = (start + self.page_size).min(tools.len());
        let page: Vec<Value> = tools.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
        if end < tools.len() {
            json!({ "tools": page, "nextCursor": end.to_string() })
        } else {
            json!({ "tools": page })
        }
    }

    fn tools(&self) -> Vec<Value> {
        match self.profile {
            Profile::Crm => vec![
                tool(
                    "get_order",
                    "Look up an order by id",
                    json!({
                        "type": "object",
                        "properties": { "order_id": { "type": "string" } },
                        "required": ["order_id"]
                    }),
                ),
                tool(
                    "get_customer_email",
                    "Return the customer email for an order",
                    json!({
                        "type": "object",
                        "properties": { "order_id": { "type": "string" } },
                        "required": ["order_id"]
                    }),
                ),
            ],
            Profile::Email => vec![
                tool(
                    "send_email",
                    "Send a shipping confirmation email",
                    json!({
                        "type": "object",
                        "properties": {
                            "email": { "type": "string" },
                            "order_details": { "type": "string" }
                        },
                        "required": ["email", "order_details"],
                        "additionalProperties": false
                    }),
                ),
                tool(
                    "send_custom",
                    "Send a free-form message to a customer",
                    json!({
                        "type": "object",
                        "properties": {
                            "email": { "type": "string" },
                            "subject": { "type": "string" },
                            "message": { "type": "string" }
                        },
                        "required": ["email", "subject", "message"]
                    }),
                ),
            ],
        }
    }

    fn call_tool(&mut self, params: &Value) -> Value {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let empty = Map::new();
        let arguments = params
            .get("arguments")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        info!(tool = name, "Tool called");

        match (self.profile, name) {
            (Profile::Crm, "get_order") => {
                let order_id = string_arg(arguments, "order_id");
                match ORDERS.iter().find(|order| order.id.eq_ignore_ascii_case(&order_id)) {
                    Some(order) => text_result(
                        json!({
                            "order_id": order.id,
                            "status": order.status,
                            "customer_email": customer_email(order.id),
                            "items": [{ "name": order.item, "quantity": order.quantity }]
                        })
                        .to_string(),
                        false,
                    ),
                    None => text_result(format!("order {order_id} not found"), true),
                }
            }
            (Profile::Crm, "get_customer_email") => {
                text_result(customer_email(&string_arg(arguments, "order_id")), false)
            }
            (Profile::Email, "send_email") => {
                self.sent += 1;
                let message_id = format!("msg-{:04}", self.sent);
                info!(
                    email = %string_arg(arguments, "email"),
                    message_id = %message_id,
                    "Shipping confirmation sent"
                );
                text_result(
                    json!({ "status": "sent", "message_id": message_id }).to_string(),
                    false,
                )
            }
            (Profile::Email, "send_custom") => {
                info!(
                    email = %string_arg(arguments, "email"),
                    subject = %string_arg(arguments, "subject"),
                    "Custom message sent"
                );
                text_result("ok".to_string(), false)
            }
            (_, other) => text_result(format!("unknown tool '{other}'"), true),
        }
    }
}

fn tool(name: &str, description: &str, schema: Value) -> Value {
    json!({ "name": name, "description": description, "inputSchema": schema })
}

fn text_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}

fn string_arg(arguments: &Map<String, Value>, key: &str) -> String {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn customer_email(order_id: &str) -> String {
    let slug: String = order_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "customer+unknown@example.com".to_string()
    } else {
        format!("customer+{slug}@example.com")
    }
}
