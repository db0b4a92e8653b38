pub mod application;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{agent, guard, runs, tooling};
pub use cli::{Cli, RunMode};
pub use config::{AppConfig, ProviderSettings};
pub use domain::types;
pub use infrastructure::{model, server};

use agent::{Agent, AgentOptions};
use constants::CONFIG_PATH;
use model::ProviderFactory;
use runs::{LaunchSpec, RunManager};
use std::path::PathBuf;
use std::process::ExitCode;
use tooling::ConnectionManager;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Exit status for a missing instruction.
const USAGE_EXIT: u8 = 2;

pub async fn run(cli: Cli) -> ExitCode {
    init_tracing();
    config::ensure_env_loaded();
    debug!(
        mode = ?cli.mode,
        config = ?cli.config,
        "CLI arguments parsed"
    );

    match cli.mode {
        RunMode::Run => run_once(&cli).await,
        RunMode::Rest => serve_runs(&cli).await,
    }
}

async fn run_once(cli: &Cli) -> ExitCode {
    let instruction = cli.instruction();
    if instruction.is_empty() {
        eprintln!("usage: mcp-order-agent [--config PATH] <instruction>...");
        return ExitCode::from(USAGE_EXIT);
    }

    let app_config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return fail(&agent::AgentError::from(err)),
    };
    info!(servers = app_config.servers.len(), "Loaded configuration");

    let settings = match ProviderSettings::from_env() {
        Ok(settings) => settings,
        Err(err) => return fail(&agent::AgentError::from(err)),
    };
    let provider = ProviderFactory::create(&settings);
    let options = AgentOptions::default().with_system_prompt(app_config.system_prompt.clone());
    let agent = Agent::new(provider, options);
    let manager = ConnectionManager::new(app_config.handshake_timeout);

    match agent.run(&manager, &app_config.servers, &instruction).await {
        Ok(outcome) => {
            info!(outcome = ?outcome, "Run finished");
            println!("{}", outcome.message());
            ExitCode::SUCCESS
        }
        Err(err) => fail(&err),
    }
}

async fn serve_runs(cli: &Cli) -> ExitCode {
    let exe = match std::env::current_exe() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Cannot locate the current executable");
            eprintln!("Cannot locate the current executable: {err}");
            return ExitCode::FAILURE;
        }
    };
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_PATH));
    let launcher = LaunchSpec::new(exe).with_args([
        "--config".to_string(),
        config_path.display().to_string(),
        "--mode".to_string(),
        "run".to_string(),
        "--".to_string(),
    ]);

    info!(addr = %cli.rest_addr, "Starting REST server");
    match server::serve(RunManager::new(launcher), cli.rest_addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "REST server stopped");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn fail(err: &agent::AgentError) -> ExitCode {
    error!(error = %err, "Run failed");
    eprintln!("{}", err.user_message());
    ExitCode::FAILURE
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
