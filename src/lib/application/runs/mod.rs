//! # Run Manager
//!
//! Owns runs started from the REST front-end. Each run is a child process
//! (`<launcher> <args…> <command>`) whose stdout and stderr lines are pushed
//! into a per-run event channel, followed by a final `Done` event.
//!
//! At most one run is active at a time. Finished runs stay addressable for a
//! short while so a late `/events` or `/stop` still resolves; the oldest are
//! evicted once more than [`FINISHED_RUN_HISTORY`] have piled up.

mod events;

pub use events::{RunEvent, StreamKind};

use crate::constants::{FINISHED_RUN_HISTORY, MAX_COMMAND_LEN, RUN_TIMEOUT, SHUTDOWN_GRACE};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("{0}")]
    InvalidCommand(&'static str),
    #[error("A run is already in progress")]
    Conflict,
    #[error("run_id not found")]
    NotFound(String),
    #[error("events for run '{0}' are already being streamed")]
    AlreadySubscribed(String),
}

/// Program and leading arguments used to launch a run; the command is
/// appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

struct RunRecord {
    command: String,
    stop: Arc<Notify>,
    events: Option<UnboundedReceiver<RunEvent>>,
}

#[derive(Default)]
struct Registry {
    active: Option<String>,
    runs: HashMap<String, RunRecord>,
    /// Finished run ids, oldest first.
    finished: VecDeque<String>,
}

impl Registry {
    fn retire(&mut self, run_id: &str, keep: usize) {
        if self.active.as_deref() == Some(run_id) {
            self.active = None;
        }
        self.finished.push_back(run_id.to_string());
        while self.finished.len() > keep {
            if let Some(evicted) = self.finished.pop_front() {
                debug!(run_id = evicted.as_str(), "Evicting finished run");
                self.runs.remove(&evicted);
            }
        }
    }
}

#[derive(Clone)]
pub struct RunManager {
    launcher: LaunchSpec,
    run_timeout: Duration,
    history: usize,
    registry: Arc<Mutex<Registry>>,
}

impl RunManager {
    pub fn new(launcher: LaunchSpec) -> Self {
        Self {
            launcher,
            run_timeout: RUN_TIMEOUT,
            history: FINISHED_RUN_HISTORY,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn with_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Number of finished runs kept addressable.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn launcher(&self) -> &LaunchSpec {
        &self.launcher
    }

    /// Starts a run for `command` and returns its id.
    pub async fn start(&self, command: &str) -> Result<String, RunError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(RunError::InvalidCommand("command is required"));
        }
        if command.chars().count() > MAX_COMMAND_LEN {
            return Err(RunError::InvalidCommand("command too long"));
        }

        let mut registry = self.registry.lock().await;
        if registry.active.is_some() {
            return Err(RunError::Conflict);
        }

        let run_id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let stop = Arc::new(Notify::new());
        registry.runs.insert(
            run_id.clone(),
            RunRecord {
                command: command.to_string(),
                stop: Arc::clone(&stop),
                events: Some(rx),
            },
        );
        registry.active = Some(run_id.clone());
        drop(registry);

        info!(run_id = run_id.as_str(), command, "Run started");
        tokio::spawn(supervise(
            self.clone(),
            run_id.clone(),
            command.to_string(),
            tx,
            stop,
        ));
        Ok(run_id)
    }

    /// Asks a run to stop. Stopping a finished run is accepted and does
    /// nothing.
    pub async fn stop(&self, run_id: &str) -> Result<(), RunError> {
        let registry = self.registry.lock().await;
        let record = registry
            .runs
            .get(run_id)
            .ok_or_else(|| RunError::NotFound(run_id.to_string()))?;
        info!(run_id, command = record.command.as_str(), "Stop requested");
        record.stop.notify_one();
        Ok(())
    }

    /// Hands out the event stream of a run. Each run has exactly one stream.
    pub async fn subscribe(&self, run_id: &str) -> Result<UnboundedReceiver<RunEvent>, RunError> {
        let mut registry = self.registry.lock().await;
        let record = registry
            .runs
            .get_mut(run_id)
            .ok_or_else(|| RunError::NotFound(run_id.to_string()))?;
        record
            .events
            .take()
            .ok_or_else(|| RunError::AlreadySubscribed(run_id.to_string()))
    }

    pub async fn active_run(&self) -> Option<String> {
        self.registry.lock().await.active.clone()
    }

    async fn finish(&self, run_id: &str) {
        self.registry.lock().await.retire(run_id, self.history);
    }
}

async fn supervise(
    manager: RunManager,
    run_id: String,
    command: String,
    tx: UnboundedSender<RunEvent>,
    stop: Arc<Notify>,
) {
    let exit_code = execute(&manager, &command, &tx, &stop).await;
    manager.finish(&run_id).await;
    info!(run_id = run_id.as_str(), exit_code, "Run finished");
    let _ = tx.send(RunEvent::Done { exit_code });
}

async fn execute(
    manager: &RunManager,
    command: &str,
    tx: &UnboundedSender<RunEvent>,
    stop: &Notify,
) -> i32 {
    let launcher = &manager.launcher;
    let spawned = Command::new(&launcher.program)
        .args(&launcher.args)
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            warn!(program = %launcher.program.display(), %err, "Failed to launch run");
            let _ = tx.send(RunEvent::stderr(format!("[ui] ERROR: {err}")));
            return 1;
        }
    };

    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(StreamKind::Stdout, stdout, tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(StreamKind::Stderr, stderr, tx.clone())));
    }

    let status = tokio::select! {
        waited = timeout(manager.run_timeout, child.wait()) => match waited {
            Ok(status) => status,
            Err(_) => {
                let _ = tx.send(RunEvent::stderr("[ui] TIMEOUT: killing process"));
                let _ = child.kill().await;
                child.wait().await
            }
        },
        _ = stop.notified() => {
            debug!("Killing run on request");
            let _ = child.kill().await;
            child.wait().await
        }
    };

    // Grandchildren may still hold the pipes; do not wait on them forever.
    for handle in pumps {
        if timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            debug!("Output pump did not drain in time");
        }
    }

    match status {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            warn!(%err, "Failed to wait for run process");
            let _ = tx.send(RunEvent::stderr(format!("[ui] ERROR: {err}")));
            1
        }
    }
}

async fn pump<R>(stream: StreamKind, reader: R, tx: UnboundedSender<RunEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buffer);
                let text = text.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(RunEvent::Line { stream, text }).is_err() {
                    break;
                }
            }
            Err(err) => {
                debug!(stream = stream.as_str(), %err, "Run output closed with error");
                break;
            }
        }
    }
}
