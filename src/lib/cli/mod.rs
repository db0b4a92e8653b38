use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "mcp-order-agent",
    version,
    about = "Policy-gated order agent that drives MCP tool servers over stdio"
)]
pub struct Cli {
    /// Agent configuration file (defaults to config/agent.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, short, value_enum, default_value_t = RunMode::Run)]
    pub mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub rest_addr: SocketAddr,
    /// Natural-language instruction, joined with spaces
    pub instruction: Vec<String>,
}

impl Cli {
    pub fn instruction(&self) -> String {
        self.instruction.join(" ").trim().to_string()
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RunMode {
    /// Answer a single instruction and exit
    Run,
    /// Serve the run manager over HTTP
    Rest,
}
